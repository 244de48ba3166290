//! End-to-end tests: a real config directory on disk, real CSV batches, and
//! the in-memory spreadsheet backend.

use crate::api::{MemorySheet, Sheet};
use crate::args::{SelectMode, SourceKind, UploadArgs};
use crate::commands::upload_with_sheet;
use crate::decide::OverwritePolicy;
use crate::model::{Cell, RunOutcome};
use crate::{Config, Result};
use std::path::Path;
use tempfile::TempDir;

const SEED_ROWS: usize = 3; // header + two seeded weeks

/// Builds an opsync home with a config pointing at sales/ and labor/
/// directories inside `dir`. The single sales report Sales_Revenue.csv maps
/// to the seeded "Weekly Sales" tab.
async fn test_config(dir: &TempDir) -> Config {
    let home = dir.path().join("home");
    tokio::fs::create_dir_all(home.join(".secrets")).await.unwrap();
    let sales_dir = dir.path().join("sales");
    let labor_dir = dir.path().join("labor");
    tokio::fs::create_dir_all(&sales_dir).await.unwrap();
    tokio::fs::create_dir_all(&labor_dir).await.unwrap();

    let json = serde_json::json!({
        "app_name": "opsync",
        "config_version": 1,
        "sheet_url": "https://docs.google.com/spreadsheets/d/TESTSHEET",
        "sales_dir": sales_dir,
        "labor_dir": labor_dir,
        "sales_tabs": { "Sales_Revenue": "Weekly Sales" },
    });
    tokio::fs::write(
        home.join("config.json"),
        serde_json::to_string_pretty(&json).unwrap(),
    )
    .await
    .unwrap();
    Config::load(&home).await.unwrap()
}

async fn add_sales_batch(config: &Config, folder: &str, csv: &str) {
    let batch_dir = config.sales_dir().join(folder);
    tokio::fs::create_dir_all(&batch_dir).await.unwrap();
    tokio::fs::write(batch_dir.join("Sales_Revenue.csv"), csv)
        .await
        .unwrap();
}

async fn add_labor_file(config: &Config, name: &str, csv: &str) {
    tokio::fs::write(config.labor_dir().join(name), csv)
        .await
        .unwrap();
}

fn sales_args(select: SelectMode, dry_run: bool, policy: OverwritePolicy) -> UploadArgs {
    UploadArgs::new(SourceKind::Sales, select, dry_run, true, Some(policy))
}

fn grid_of(sheet: &MemorySheet, tab: &str) -> Vec<Vec<String>> {
    sheet.rows(tab).to_vec()
}

fn last_row(sheet: &MemorySheet, tab: &str) -> Vec<String> {
    sheet.rows(tab).last().unwrap().clone()
}

#[tokio::test]
async fn test_upload_appends_new_week() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    add_sales_batch(
        &config,
        "SalesSummary_2025-12-31_2026-01-06",
        "Net sales,Gross sales\n100.50,200\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let args = sales_args(SelectMode::Latest, false, OverwritePolicy::Ask);
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    let reports = out.structure().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome(), &RunOutcome::Appended { rows: 1 });

    let row = last_row(&sheet, "Weekly Sales");
    assert_eq!(row[0], "2026-01-06");
    assert_eq!(row[1], "100.50");
    assert_eq!(row[2], "200");
    // Columns with no source counterpart stay blank.
    assert_eq!(row[3], "");
    assert_eq!(sheet.rows("Weekly Sales").len(), SEED_ROWS + 1);
}

#[tokio::test]
async fn test_existing_week_skip_policy_leaves_tab_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    // 2025-12-30 is already in the seeded tab.
    add_sales_batch(
        &config,
        "SalesSummary_2025-12-24_2025-12-30",
        "Net sales,Gross sales\n999,999\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let before = grid_of(&sheet, "Weekly Sales");
    let args = sales_args(SelectMode::Latest, false, OverwritePolicy::Skip);
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    assert_eq!(
        out.structure().unwrap()[0].outcome(),
        &RunOutcome::skipped("user declined override")
    );
    assert_eq!(grid_of(&sheet, "Weekly Sales"), before);
}

#[tokio::test]
async fn test_existing_week_overwrite_replaces_rows() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    add_sales_batch(
        &config,
        "SalesSummary_2025-12-24_2025-12-30",
        "Net sales,Gross sales\n999.99,1000\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let args = sales_args(SelectMode::Latest, false, OverwritePolicy::Overwrite);
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    assert_eq!(
        out.structure().unwrap()[0].outcome(),
        &RunOutcome::Appended { rows: 1 }
    );
    // The stale 2025-12-30 row is gone and the new one is at the end.
    let grid = grid_of(&sheet, "Weekly Sales");
    assert_eq!(grid.len(), SEED_ROWS);
    assert_eq!(grid[1][0], "2025-12-23");
    assert_eq!(grid[2][0], "2025-12-30");
    assert_eq!(grid[2][1], "999.99");
}

#[tokio::test]
async fn test_empty_source_file_skips_without_mutation() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    add_sales_batch(
        &config,
        "SalesSummary_2025-12-31_2026-01-06",
        "Net sales,Gross sales\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let before = grid_of(&sheet, "Weekly Sales");
    let args = sales_args(SelectMode::Latest, false, OverwritePolicy::Overwrite);
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    assert_eq!(
        out.structure().unwrap()[0].outcome(),
        &RunOutcome::skipped("empty source")
    );
    assert_eq!(grid_of(&sheet, "Weekly Sales"), before);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    add_sales_batch(
        &config,
        "SalesSummary_2025-12-24_2025-12-30",
        "Net sales,Gross sales\n999,999\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let before = grid_of(&sheet, "Weekly Sales");
    // Overwrite policy, but dry-run must suppress both the delete and append.
    let args = sales_args(SelectMode::Latest, true, OverwritePolicy::Overwrite);
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    let outcome = out.structure().unwrap()[0].outcome().clone();
    match outcome {
        RunOutcome::Skipped { reason } => assert!(reason.starts_with("dry-run")),
        other => panic!("expected a dry-run skip, got {other}"),
    }
    assert_eq!(grid_of(&sheet, "Weekly Sales"), before);
}

#[tokio::test]
async fn test_oldest_missing_prefers_gap_over_latest() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    let csv = "Net sales,Gross sales\n1,2\n";
    // Both seeded weeks are present; two newer batches are not.
    add_sales_batch(&config, "SalesSummary_2025-12-24_2025-12-30", csv).await;
    add_sales_batch(&config, "SalesSummary_2025-12-31_2026-01-06", csv).await;
    add_sales_batch(&config, "SalesSummary_2026-01-07_2026-01-13", csv).await;

    let mut sheet = MemorySheet::default();
    let args = sales_args(SelectMode::OldestMissing, false, OverwritePolicy::Ask);
    upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    // 2026-01-06 is the oldest missing week even though 2026-01-13 is newer.
    assert_eq!(last_row(&sheet, "Weekly Sales")[0], "2026-01-06");
}

#[tokio::test]
async fn test_no_batch_on_disk_reports_no_match() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;

    let mut sheet = MemorySheet::default();
    let args = sales_args(SelectMode::Latest, false, OverwritePolicy::Ask);
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    assert_eq!(
        out.structure().unwrap()[0].outcome(),
        &RunOutcome::NoMatchingBatch
    );
}

#[tokio::test]
async fn test_labor_upload_writes_classification_formulas() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    add_labor_file(
        &config,
        "LaborSummary_2025-12-31_2026-01-06.csv",
        "Employee,Job Classification,Hours,Total Pay\n\
         Priya Shah,Server,32.0,512.00\n\
         Marcus Webb,Cook,40.0,760.00\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let args = UploadArgs::new(
        SourceKind::Labor,
        SelectMode::Latest,
        false,
        true,
        Some(OverwritePolicy::Ask),
    );
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();
    assert_eq!(
        out.structure().unwrap()[0].outcome(),
        &RunOutcome::Appended { rows: 2 }
    );

    // Seed tab has rows 1-3, so the appended rows are 4 and 5.
    let grid = grid_of(&sheet, "Labor_Input");
    assert_eq!(grid.len(), 5);
    assert_eq!(grid[3][0], "2026-01-06");
    assert_eq!(grid[3][1], "Priya Shah");
    // The reserved column got the formula, not the source value.
    assert!(grid[3][2].contains("B4"));
    assert!(grid[4][2].contains("B5"));
    assert_eq!(grid[4][3], "40.0");
}

#[tokio::test]
async fn test_all_source_touches_sales_and_labor() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    add_sales_batch(
        &config,
        "SalesSummary_2025-12-31_2026-01-06",
        "Net sales,Gross sales\n10,20\n",
    )
    .await;
    add_labor_file(
        &config,
        "LaborSummary_2025-12-31_2026-01-06.csv",
        "Employee,Hours,Total Pay\nPriya Shah,32.0,512.00\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let args = UploadArgs::new(
        SourceKind::All,
        SelectMode::Latest,
        false,
        true,
        Some(OverwritePolicy::Ask),
    );
    let out = upload_with_sheet(&config, &mut sheet, &args).await.unwrap();

    let reports = out.structure().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(last_row(&sheet, "Weekly Sales")[0], "2026-01-06");
    assert_eq!(last_row(&sheet, "Labor_Input")[0], "2026-01-06");
}

#[tokio::test]
async fn test_missing_tab_aborts_and_raises() {
    let dir = TempDir::new().unwrap();
    let home = dir.path().join("home");
    tokio::fs::create_dir_all(home.join(".secrets")).await.unwrap();
    let sales_dir = dir.path().join("sales");
    tokio::fs::create_dir_all(&sales_dir).await.unwrap();
    let json = serde_json::json!({
        "app_name": "opsync",
        "config_version": 1,
        "sheet_url": "https://docs.google.com/spreadsheets/d/TESTSHEET",
        "sales_dir": sales_dir,
        "labor_dir": dir.path().join("labor-missing"),
        "sales_tabs": { "Sales_Revenue": "No Such Tab" },
    });
    tokio::fs::write(
        home.join("config.json"),
        serde_json::to_string_pretty(&json).unwrap(),
    )
    .await
    .unwrap();
    let config = Config::load(&home).await.unwrap();
    add_batch(&sales_dir, "SalesSummary_2025-12-31_2026-01-06").await;

    let mut sheet = MemorySheet::default();
    let args = sales_args(SelectMode::Latest, false, OverwritePolicy::Ask);
    // The per-tab failure is isolated into a report, then re-raised.
    let result = upload_with_sheet(&config, &mut sheet, &args).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_sales_failure_does_not_stop_labor() {
    let dir = TempDir::new().unwrap();
    let home = dir.path().join("home");
    tokio::fs::create_dir_all(home.join(".secrets")).await.unwrap();
    let labor_dir = dir.path().join("labor");
    tokio::fs::create_dir_all(&labor_dir).await.unwrap();
    // sales_dir points at a directory that does not exist.
    let json = serde_json::json!({
        "app_name": "opsync",
        "config_version": 1,
        "sheet_url": "https://docs.google.com/spreadsheets/d/TESTSHEET",
        "sales_dir": dir.path().join("sales-missing"),
        "labor_dir": labor_dir,
        "sales_tabs": { "Sales_Revenue": "Weekly Sales" },
    });
    tokio::fs::write(
        home.join("config.json"),
        serde_json::to_string_pretty(&json).unwrap(),
    )
    .await
    .unwrap();
    let config = Config::load(&home).await.unwrap();
    add_labor_file(
        &config,
        "LaborSummary_2025-12-31_2026-01-06.csv",
        "Employee,Hours,Total Pay\nPriya Shah,32.0,512.00\n",
    )
    .await;

    let mut sheet = MemorySheet::default();
    let args = UploadArgs::new(
        SourceKind::All,
        SelectMode::Latest,
        false,
        true,
        Some(OverwritePolicy::Ask),
    );
    let result = upload_with_sheet(&config, &mut sheet, &args).await;

    // The sales failure is re-raised, but only after labor ran to completion.
    assert!(result.is_err());
    assert_eq!(last_row(&sheet, "Labor_Input")[0], "2026-01-06");
}

/// Delegates to the in-memory backend except that every append is rejected,
/// standing in for a write that dies after an overwrite delete went through.
struct RejectingAppends {
    inner: MemorySheet,
}

#[async_trait::async_trait]
impl Sheet for RejectingAppends {
    async fn header(&mut self, tab: &str) -> Result<Vec<String>> {
        self.inner.header(tab).await
    }

    async fn key_column(&mut self, tab: &str) -> Result<Vec<String>> {
        self.inner.key_column(tab).await
    }

    async fn append_rows(&mut self, _tab: &str, _rows: &[Vec<Cell>]) -> Result<()> {
        anyhow::bail!("the backend rejected the write")
    }

    async fn delete_rows(&mut self, tab: &str, positions: &[u64]) -> Result<()> {
        self.inner.delete_rows(tab, positions).await
    }

    async fn write_formulas(
        &mut self,
        tab: &str,
        start_row: u64,
        column: usize,
        formulas: &[String],
    ) -> Result<()> {
        self.inner.write_formulas(tab, start_row, column, formulas).await
    }
}

#[tokio::test]
async fn test_append_failure_after_delete_names_the_damage() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir).await;
    // 2025-12-30 is already in the seeded tab, so overwrite deletes it first.
    add_sales_batch(
        &config,
        "SalesSummary_2025-12-24_2025-12-30",
        "Net sales,Gross sales\n999,999\n",
    )
    .await;

    let mut sheet = RejectingAppends {
        inner: MemorySheet::default(),
    };
    let args = sales_args(SelectMode::Latest, false, OverwritePolicy::Overwrite);
    let err = upload_with_sheet(&config, &mut sheet, &args)
        .await
        .unwrap_err();

    // The error says which tab lost which week and how many rows are gone.
    let message = format!("{err:#}");
    assert!(message.contains("Weekly Sales"), "got: {message}");
    assert!(message.contains("2025-12-30"), "got: {message}");
    assert!(message.contains("1 existing row(s)"), "got: {message}");
    assert!(message.contains("manual inspection"), "got: {message}");
    // The delete went through before the append died.
    assert_eq!(sheet.inner.rows("Weekly Sales").len(), SEED_ROWS - 1);
}

async fn add_batch(sales_dir: &Path, folder: &str) {
    let batch_dir = sales_dir.join(folder);
    tokio::fs::create_dir_all(&batch_dir).await.unwrap();
    tokio::fs::write(
        batch_dir.join("Sales_Revenue.csv"),
        "Net sales,Gross sales\n1,2\n",
    )
    .await
    .unwrap();
}
