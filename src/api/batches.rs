//! Enumerates exported report batches on the local filesystem and parses
//! their CSV files.
//!
//! Sales exports arrive as one directory per batch with a CSV file per
//! report inside; labor exports arrive as loose CSV files. Either way a batch
//! has a name (the directory or file stem) that encodes its week-ending date.

use crate::mapper::CsvTable;
use crate::Result;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// A candidate batch on disk: the name carries the week-ending date, the path
/// is either a directory of CSVs or a single CSV file.
#[derive(Debug, Clone)]
pub(crate) struct SourceBatch {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
}

/// Lists the subdirectories of `dir` as batches, sorted by name.
pub(crate) async fn list_folders(dir: &Path) -> Result<Vec<SourceBatch>> {
    let mut batches = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Unable to read directory {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                batches.push(SourceBatch {
                    name: name.to_string(),
                    path,
                });
            }
        }
    }
    batches.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(batches)
}

/// Lists the `*.csv` files in `dir` as batches, sorted by name. The batch
/// name is the file stem without the extension.
pub(crate) async fn list_csv_files(dir: &Path) -> Result<Vec<SourceBatch>> {
    let mut batches = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Unable to read directory {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && is_csv(&path) {
            if let Some(stem) = path.file_stem().and_then(|n| n.to_str()) {
                batches.push(SourceBatch {
                    name: stem.to_string(),
                    path,
                });
            }
        }
    }
    batches.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(batches)
}

/// The CSV files inside a batch directory, sorted by file stem. Returns
/// `(stem, path)` pairs; the stem names the report and selects the
/// destination tab.
pub(crate) async fn csv_files_in(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let files = list_csv_files(dir).await?;
    Ok(files.into_iter().map(|b| (b.name, b.path)).collect())
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Parses a CSV file into a table. The first record is the header; an empty
/// file yields an empty table.
pub(crate) async fn read_table(path: &Path) -> Result<CsvTable> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Unable to read {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut table = CsvTable::default();
    for (i, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Malformed CSV in {}", path.display()))?;
        let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
        if i == 0 {
            table.header = fields;
        } else {
            table.rows.push(fields);
        }
    }
    Ok(table)
}
