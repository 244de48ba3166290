//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" build so the whole app can
//! run top-to-bottom without touching Google Sheets (see `Mode::Test`).

use crate::api::Sheet;
use crate::model::Cell;
use crate::Result;
use anyhow::{ensure, Context};
use std::collections::HashMap;
use std::io::Cursor;

/// An in-memory spreadsheet. The map key is the tab name and the value is the
/// full grid including the header row.
pub(crate) struct MemorySheet {
    data: HashMap<String, Vec<Vec<String>>>,
}

impl MemorySheet {
    pub(crate) fn new(data: HashMap<String, Vec<Vec<String>>>) -> Self {
        Self { data }
    }

    /// All rows of a tab, header included. Test helper.
    #[cfg(test)]
    pub(crate) fn rows(&self, tab: &str) -> &[Vec<String>] {
        self.data.get(tab).map(|r| r.as_slice()).unwrap_or(&[])
    }

    fn tab_mut(&mut self, tab: &str) -> Result<&mut Vec<Vec<String>>> {
        self.data
            .get_mut(tab)
            .with_context(|| format!("Tab '{tab}' not found"))
    }

    fn tab(&self, tab: &str) -> Result<&Vec<Vec<String>>> {
        self.data
            .get(tab)
            .with_context(|| format!("Tab '{tab}' not found"))
    }
}

impl Default for MemorySheet {
    /// Loads the seed tabs defined in this module.
    fn default() -> Self {
        let mut data = HashMap::new();
        data.insert(
            "Weekly Sales".to_string(),
            load_csv(WEEKLY_SALES_SEED).unwrap(),
        );
        data.insert(
            "Labor_Input".to_string(),
            load_csv(LABOR_INPUT_SEED).unwrap(),
        );
        Self::new(data)
    }
}

#[async_trait::async_trait]
impl Sheet for MemorySheet {
    async fn header(&mut self, tab: &str) -> Result<Vec<String>> {
        Ok(self.tab(tab)?.first().cloned().unwrap_or_default())
    }

    async fn key_column(&mut self, tab: &str) -> Result<Vec<String>> {
        Ok(self
            .tab(tab)?
            .iter()
            .skip(1)
            .map(|row| row.first().cloned().unwrap_or_default())
            .collect())
    }

    async fn append_rows(&mut self, tab: &str, rows: &[Vec<Cell>]) -> Result<()> {
        let grid = self.tab_mut(tab)?;
        for row in rows {
            grid.push(row.iter().map(|cell| cell.to_string()).collect());
        }
        Ok(())
    }

    async fn delete_rows(&mut self, tab: &str, positions: &[u64]) -> Result<()> {
        let grid = self.tab_mut(tab)?;
        for &pos in positions {
            let index = pos as usize - 1;
            ensure!(
                index < grid.len(),
                "Row {pos} is out of range for tab '{tab}'"
            );
            grid.remove(index);
        }
        Ok(())
    }

    async fn write_formulas(
        &mut self,
        tab: &str,
        start_row: u64,
        column: usize,
        formulas: &[String],
    ) -> Result<()> {
        let grid = self.tab_mut(tab)?;
        for (i, formula) in formulas.iter().enumerate() {
            let row_index = start_row as usize - 1 + i;
            ensure!(
                row_index < grid.len(),
                "Formula row {} is out of range for tab '{tab}'",
                row_index + 1
            );
            let row = &mut grid[row_index];
            if row.len() < column {
                row.resize(column, String::new());
            }
            row[column - 1] = formula.clone();
        }
        Ok(())
    }
}

/// Loads a grid from a CSV-formatted string, headers treated as data.
fn load_csv(csv_data: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed sales data.
const WEEKLY_SALES_SEED: &str = r##"Week Ending,Net Sales,Gross Sales,Comps,Voids
2025-12-23,18250.75,19875.20,310.00,88.50
2025-12-30,21400.10,23120.45,295.25,102.00
"##;

/// Seed labor data.
const LABOR_INPUT_SEED: &str = r##"Week Ending,Employee,Job Classification,Hours,Total Pay
2025-12-30,Alice Moreno,,38.5,693.00
2025-12-30,Devon Clarke,,41.0,820.00
"##;
