//! Decision points for conflict and ambiguity handling.
//!
//! Interactive prompts are control flow in attended runs, but batch runs must
//! never block. Both cases sit behind the [`Decide`] trait: the interactive
//! implementation blocks on a terminal prompt, the policy implementation is a
//! pure function of the configured overwrite policy.

use crate::Result;
use dialoguer::{Confirm, Input};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Behavior when a week's data already exists in a destination tab.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Ask interactively; in unattended runs this declines.
    #[default]
    Ask,
    /// Delete the existing rows for the week and append the new data.
    Overwrite,
    /// Leave the existing rows alone.
    Skip,
}

serde_plain::derive_display_from_serialize!(OverwritePolicy);
serde_plain::derive_fromstr_from_deserialize!(OverwritePolicy);

/// The answer to a multiple-choice prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// A valid selection, 0-based into the presented options.
    Picked(usize),
    /// The explicit "skip" token.
    Skip,
    /// The prompt was cancelled; callers treat this the same as skip.
    Cancelled,
    /// No usable answer was produced; callers may retry.
    Undecided,
}

/// A provider of yes/no confirmations and bounded multiple-choice selections.
pub trait Decide {
    /// Ask whether to proceed. A `false` or an error is always treated by
    /// callers as a decline, never as a silent overwrite.
    fn confirm(&self, title: &str, body: &str) -> Result<bool>;

    /// Ask the user to pick one of `options` (presented 1-indexed) or skip.
    fn choose(&self, title: &str, options: &[String]) -> Result<Choice>;
}

/// Non-interactive decisions driven entirely by the configured policy.
pub struct PolicyDecider {
    policy: OverwritePolicy,
}

impl PolicyDecider {
    pub fn new(policy: OverwritePolicy) -> Self {
        Self { policy }
    }
}

impl Decide for PolicyDecider {
    fn confirm(&self, title: &str, _body: &str) -> Result<bool> {
        match self.policy {
            OverwritePolicy::Overwrite => Ok(true),
            OverwritePolicy::Skip => Ok(false),
            OverwritePolicy::Ask => {
                warn!("{title}: policy is 'ask' but the run is unattended, declining");
                Ok(false)
            }
        }
    }

    fn choose(&self, _title: &str, _options: &[String]) -> Result<Choice> {
        // No terminal to ask; the caller's retry loop will fall back to its
        // deterministic default.
        Ok(Choice::Undecided)
    }
}

/// Terminal prompts for attended runs.
pub struct InteractiveDecider;

impl Decide for InteractiveDecider {
    fn confirm(&self, title: &str, body: &str) -> Result<bool> {
        let answer = Confirm::new()
            .with_prompt(format!("{title} - {body}"))
            .default(false)
            .interact()?;
        Ok(answer)
    }

    fn choose(&self, title: &str, options: &[String]) -> Result<Choice> {
        eprintln!("{title}");
        for (i, option) in options.iter().enumerate() {
            eprintln!("  {}. {option}", i + 1);
        }
        let raw: String = match Input::new()
            .with_prompt(format!("Select 1-{} or 'skip'", options.len()))
            .allow_empty(true)
            .interact_text()
        {
            Ok(s) => s,
            // Cancelling the prompt means skip.
            Err(_) => return Ok(Choice::Cancelled),
        };
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("skip") {
            return Ok(Choice::Skip);
        }
        match trimmed.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => Ok(Choice::Picked(n - 1)),
            _ => Ok(Choice::Undecided),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_overwrite_confirms() {
        let decider = PolicyDecider::new(OverwritePolicy::Overwrite);
        assert!(decider.confirm("t", "b").unwrap());
    }

    #[test]
    fn test_policy_skip_declines() {
        let decider = PolicyDecider::new(OverwritePolicy::Skip);
        assert!(!decider.confirm("t", "b").unwrap());
    }

    #[test]
    fn test_policy_ask_declines_unattended() {
        let decider = PolicyDecider::new(OverwritePolicy::Ask);
        assert!(!decider.confirm("t", "b").unwrap());
    }

    #[test]
    fn test_policy_choose_is_undecided() {
        let decider = PolicyDecider::new(OverwritePolicy::Ask);
        let choice = decider.choose("t", &["a".to_string()]).unwrap();
        assert_eq!(choice, Choice::Undecided);
    }

    #[test]
    fn test_policy_round_trip() {
        let policy: OverwritePolicy = "overwrite".parse().unwrap();
        assert_eq!(policy, OverwritePolicy::Overwrite);
        assert_eq!(OverwritePolicy::Skip.to_string(), "skip");
    }
}
