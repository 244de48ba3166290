//! Maps a source CSV table onto a destination tab's column layout.
//!
//! The builder is a pure function of (source table, destination header, week
//! key, reserved column names). It never inspects destination row content, so
//! its output can only ever be appended after the current last row.

use crate::model::Cell;
use crate::week::WeekKey;
use std::collections::{HashMap, HashSet};

/// A parsed CSV source table: one header row plus zero or more data rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct CsvTable {
    pub(crate) header: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lowercases and trims a column name for case-insensitive matching.
pub(crate) fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Builds output rows aligned to `dest_header`.
///
/// Column 0 always carries the week key. Every other destination column is
/// matched by folded name against the source header (first occurrence wins on
/// duplicates); reserved columns and columns with no source counterpart stay
/// blank. Output width always equals the destination header width.
pub(crate) fn build_rows(
    source: &CsvTable,
    dest_header: &[String],
    week: &WeekKey,
    reserved: &HashSet<String>,
) -> Vec<Vec<Cell>> {
    let mut source_index: HashMap<String, usize> = HashMap::new();
    for (i, name) in source.header.iter().enumerate() {
        source_index.entry(fold(name)).or_insert(i);
    }

    source
        .rows
        .iter()
        .map(|source_row| {
            dest_header
                .iter()
                .enumerate()
                .map(|(col, dest_name)| {
                    if col == 0 {
                        return Cell::Text(week.to_string());
                    }
                    let folded = fold(dest_name);
                    if reserved.contains(&folded) {
                        return Cell::Blank;
                    }
                    match source_index.get(&folded) {
                        Some(&i) => source_row
                            .get(i)
                            .map(|raw| Cell::normalize(raw))
                            .unwrap_or(Cell::Blank),
                        None => Cell::Blank,
                    }
                })
                .collect()
        })
        .collect()
}
