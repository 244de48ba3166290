//! Week keys and date normalization.
//!
//! Every week in the system is identified by its ending date, held as a canonical
//! `YYYY-MM-DD` string. All comparisons and set-membership checks go through
//! [`WeekKey`]; raw source representations are never compared directly.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

/// The canonical date format for week keys.
const KEY_FORMAT: &str = "%Y-%m-%d";

/// Date-only formats accepted from source cells and batch names, tried in order
/// after the ISO fast path.
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y/%m/%d", "%Y%m%d"];

/// A canonical `YYYY-MM-DD` string identifying the end date of a reporting week.
///
/// Two date representations denote the same week iff their normalized `WeekKey`
/// strings are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WeekKey(String);

impl WeekKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(KEY_FORMAT).to_string())
    }

    /// Formats an instant as a week key in the target time zone.
    pub fn from_datetime(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self::from_date(instant.with_timezone(&tz).date_naive())
    }

    /// Normalizes a raw string into a week key, or `None` if no recognized date
    /// form matches.
    ///
    /// The rule order matters. A string that is already a strict `YYYY-MM-DD`
    /// date passes through unchanged, without any time-zone-aware re-parsing.
    /// Re-parsing an already-unambiguous date through a time zone can shift it
    /// by one day near midnight boundaries.
    pub fn normalize(raw: &str, tz: Tz) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        // Fast path: strict ISO date, passed through byte-for-byte.
        if is_strict_iso(s) {
            return Some(Self(s.to_string()));
        }

        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, format) {
                return Some(Self::from_date(date));
            }
        }

        // Timestamps carry their own offset and must be shifted into the
        // configured zone before the date is taken.
        if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
            return Some(Self::from_date(
                instant.with_timezone(&tz).date_naive(),
            ));
        }

        None
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true if `s` is exactly `YYYY-MM-DD` and denotes a real calendar date.
fn is_strict_iso(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit());
    digits_ok && NaiveDate::parse_from_str(s, KEY_FORMAT).is_ok()
}
