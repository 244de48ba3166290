//! Batch location: turning a directory of named export batches into a single
//! selected candidate for upload.
//!
//! Batch names encode a date range (for example
//! `SalesSummary_2026-01-01_2026-01-08`); the configured pattern captures the
//! week-ending date. Names that do not match, or whose captured date does not
//! parse, are excluded with a warning and never abort the run.

use crate::decide::{Choice, Decide};
use crate::week::WeekKey;
use chrono_tz::Tz;
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

/// Retry bound for the ambiguity prompt before falling back to the default.
const CHOICE_ATTEMPTS: usize = 3;

/// A named batch whose week-ending date parsed successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) name: String,
    pub(crate) week: WeekKey,
}

/// Applies the naming pattern to each batch name and derives its week key.
///
/// The last non-empty capture group is taken as the week-ending date, so a
/// range-encoded name selects its second date. Order of the input is preserved.
pub(crate) fn parse_candidates<I, S>(names: I, pattern: &Regex, tz: Tz) -> Vec<Candidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut candidates = Vec::new();
    for name in names {
        let name = name.as_ref();
        let Some(captures) = pattern.captures(name) else {
            warn!("Batch '{name}' does not match the naming pattern, excluding it");
            continue;
        };
        let raw_date = (1..captures.len())
            .rev()
            .find_map(|i| captures.get(i))
            .map(|m| m.as_str());
        let Some(raw_date) = raw_date else {
            warn!("Batch '{name}' matched but captured no date, excluding it");
            continue;
        };
        match WeekKey::normalize(raw_date, tz) {
            Some(week) => candidates.push(Candidate {
                name: name.to_string(),
                week,
            }),
            None => {
                warn!("Batch '{name}' has an unparsable date '{raw_date}', excluding it");
            }
        }
    }
    candidates
}

/// Returns all candidates carrying the maximum week key, in first-encountered
/// order. More than one element means the selection is ambiguous.
pub(crate) fn latest<'a>(candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
    let Some(max_week) = candidates.iter().map(|c| &c.week).max() else {
        return Vec::new();
    };
    let max_week = max_week.clone();
    candidates.iter().filter(|c| c.week == max_week).collect()
}

/// Returns the oldest candidate whose week is absent from `existing`, or `None`
/// if every candidate week is already present.
pub(crate) fn oldest_missing<'a>(
    candidates: &'a [Candidate],
    existing: &HashSet<WeekKey>,
) -> Option<&'a Candidate> {
    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.week.cmp(&b.week));
    sorted.into_iter().find(|c| !existing.contains(&c.week))
}

/// Resolves a set of same-week candidates down to one, or `None` to skip.
///
/// A single candidate is returned directly. Otherwise the decider is asked for
/// a selection, retried up to [`CHOICE_ATTEMPTS`] times on invalid input. If no
/// valid answer arrives, the first candidate in original order is chosen and a
/// warning is logged; the fallback is never silent.
pub(crate) fn resolve_tie<'a>(
    ties: &[&'a Candidate],
    decider: &dyn Decide,
) -> Option<&'a Candidate> {
    match ties {
        [] => None,
        [only] => Some(only),
        _ => {
            let week = &ties[0].week;
            let title = format!("Multiple batches found for week {week}");
            let options: Vec<String> = ties.iter().map(|c| c.name.clone()).collect();
            for _ in 0..CHOICE_ATTEMPTS {
                match decider.choose(&title, &options) {
                    Ok(Choice::Picked(i)) => return Some(ties[i]),
                    Ok(Choice::Skip) | Ok(Choice::Cancelled) => return None,
                    Ok(Choice::Undecided) => continue,
                    Err(e) => {
                        warn!("Choice prompt failed ({e}), skipping week {week}");
                        return None;
                    }
                }
            }
            warn!(
                "No valid selection after {CHOICE_ATTEMPTS} attempts, \
                 defaulting to '{}' for week {week}",
                ties[0].name
            );
            Some(ties[0])
        }
    }
}
