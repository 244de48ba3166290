//! Value types shared between the row builder and the spreadsheet backend.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A single destination cell value.
///
/// Source CSV cells are plain text; the row builder classifies them so that
/// numeric figures land in the sheet as numbers rather than strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Blank,
    Text(String),
    Number(Decimal),
}

impl Cell {
    /// Trims a raw source value and classifies purely-numeric text as a number.
    ///
    /// Currency formatting (`$` and thousands separators) is tolerated because
    /// POS exports emit amounts like `$1,234.56`.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Blank;
        }
        let numeric_chars = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '$' | ',' | '.' | '-' | '+'));
        if numeric_chars {
            let cleaned: String = trimmed.chars().filter(|c| *c != '$' && *c != ',').collect();
            if let Ok(number) = Decimal::from_str(&cleaned) {
                return Cell::Number(number);
            }
        }
        Cell::Text(trimmed.to_string())
    }

    /// The value as sent to the spreadsheet backend.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Blank => serde_json::Value::String(String::new()),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Number(n) => serde_json::Value::String(n.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Blank => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::normalize(value)
    }
}

/// The result of processing one destination tab during a run. Every tab that a
/// run touches produces exactly one outcome; outcomes are reported, never
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    Appended { rows: usize },
    Skipped { reason: String },
    Aborted { reason: String },
    NoMatchingBatch,
}

impl RunOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        RunOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        RunOutcome::Aborted {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Appended { rows } => write!(f, "appended {rows} row(s)"),
            RunOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            RunOutcome::Aborted { reason } => write!(f, "aborted: {reason}"),
            RunOutcome::NoMatchingBatch => f.write_str("no matching batch"),
        }
    }
}
