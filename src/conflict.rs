//! Conflict resolution for weeks that already exist in a destination tab.
//!
//! Deletion positions are computed in full before any row is touched, sorted
//! descending so that deleting one row never invalidates the remaining
//! positions. Interleaving position computation with deletion against a live
//! grid is how rows get lost.

use crate::decide::Decide;
use crate::week::WeekKey;
use chrono_tz::Tz;
use tracing::warn;

/// What the caller must do for a (tab, week) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// The week is absent; append directly.
    Append,
    /// The week exists and the decision was to overwrite: delete these 1-based
    /// absolute row positions (already sorted descending), then append.
    OverwriteThenAppend(Vec<u64>),
    /// Leave the tab untouched.
    Skip(String),
}

/// Finds every data row whose normalized column-1 value equals `week`.
/// `key_column` holds rows 2..N, so index `i` is absolute row `i + 2`.
/// Positions are returned highest-first, ready for deletion.
pub(crate) fn matching_rows(key_column: &[String], week: &WeekKey, tz: Tz) -> Vec<u64> {
    let mut positions: Vec<u64> = key_column
        .iter()
        .enumerate()
        .filter(|(_, value)| WeekKey::normalize(value, tz).as_ref() == Some(week))
        .map(|(i, _)| i as u64 + 2)
        .collect();
    positions.sort_unstable_by(|a, b| b.cmp(a));
    positions
}

/// Decides whether incoming data for `week` may be written to `tab_name`.
///
/// A confirmation failure is an implicit decline; it can never fall through to
/// a silent overwrite.
pub(crate) fn resolve(
    tab_name: &str,
    week: &WeekKey,
    key_column: &[String],
    tz: Tz,
    decider: &dyn Decide,
) -> Resolution {
    let positions = matching_rows(key_column, week, tz);
    if positions.is_empty() {
        return Resolution::Append;
    }
    let title = format!("'{tab_name}' already has data for week {week}");
    let body = format!("overwrite the existing {} row(s)?", positions.len());
    match decider.confirm(&title, &body) {
        Ok(true) => Resolution::OverwriteThenAppend(positions),
        Ok(false) => Resolution::Skip("user declined override".to_string()),
        Err(e) => {
            warn!("Confirmation failed for '{tab_name}' week {week}: {e}");
            Resolution::Skip("confirmation unavailable".to_string())
        }
    }
}
