//! The existing-week index: which week keys are already present in a
//! destination tab's first column.

use crate::api::Sheet;
use crate::week::WeekKey;
use crate::Result;
use chrono_tz::Tz;
use std::collections::HashSet;
use tracing::warn;

/// Normalizes every non-empty value of a key column (rows 2..N) into a week
/// set. Unparsable entries are discarded: they never block a future write, but
/// they also never count as "existing".
pub(crate) fn weeks_from_column(tab_name: &str, values: &[String], tz: Tz) -> HashSet<WeekKey> {
    let mut weeks = HashSet::new();
    for value in values {
        if value.trim().is_empty() {
            continue;
        }
        match WeekKey::normalize(value, tz) {
            Some(week) => {
                weeks.insert(week);
            }
            None => warn!("Ignoring unparsable date '{value}' in column 1 of '{tab_name}'"),
        }
    }
    weeks
}

/// The union of week keys present across `tabs`.
///
/// The union means a week present in only one of several sales tabs counts as
/// fully present for missing-week detection, even though its sibling tabs hold
/// no rows for it. This mirrors the source system's behavior; a stricter
/// per-tab check would change which batches OldestMissing selects.
pub(crate) async fn existing_weeks(
    sheet: &mut dyn Sheet,
    tabs: &[String],
    tz: Tz,
) -> Result<HashSet<WeekKey>> {
    let mut union = HashSet::new();
    for tab in tabs {
        let column = sheet.key_column(tab).await?;
        union.extend(weeks_from_column(tab, &column, tz));
    }
    Ok(union)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn col(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_weeks_from_column_normalizes_mixed_formats() {
        let weeks = weeks_from_column(
            "Weekly Sales",
            &col(&["2026-01-06", "1/13/2026", "20260120"]),
            New_York,
        );
        assert_eq!(weeks.len(), 3);
        assert!(weeks.contains(&WeekKey::normalize("2026-01-13", New_York).unwrap()));
    }

    #[test]
    fn test_weeks_from_column_membership_matches_normalization() {
        // A week is in the set iff some cell normalizes to it.
        let weeks = weeks_from_column("t", &col(&["1/6/2026"]), New_York);
        assert!(weeks.contains(&WeekKey::normalize("2026-01-06", New_York).unwrap()));
        assert!(!weeks.contains(&WeekKey::normalize("2026-01-07", New_York).unwrap()));
    }

    #[test]
    fn test_unparsable_and_empty_entries_discarded() {
        let weeks = weeks_from_column(
            "t",
            &col(&["", "  ", "garbage", "2026-01-06"]),
            New_York,
        );
        assert_eq!(weeks.len(), 1);
    }

    #[test]
    fn test_duplicate_weeks_collapse() {
        let weeks = weeks_from_column("t", &col(&["2026-01-06", "1/6/2026"]), New_York);
        assert_eq!(weeks.len(), 1);
    }
}
