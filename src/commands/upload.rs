//! The `opsync upload` command: pick a batch, reconcile its week against the
//! sheet, and append its rows.
//!
//! Failures while writing one tab never stop the remaining tabs, and a
//! failure anywhere in one source never stops the other source; every tab
//! gets an outcome and the first error is re-raised after the summary so the
//! process still exits non-zero.

use crate::api::batches::{self, SourceBatch};
use crate::api::{self, Mode, Sheet};
use crate::args::{SelectMode, SourceKind, UploadArgs};
use crate::commands::Out;
use crate::conflict::{self, Resolution};
use crate::decide::{Decide, InteractiveDecider, OverwritePolicy, PolicyDecider};
use crate::locate::{self, Candidate};
use crate::model::RunOutcome;
use crate::week::WeekKey;
use crate::{index, mapper, Config, Error, Result};
use anyhow::bail;
use anyhow::Context;
use chrono_tz::Tz;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

/// The outcome for one destination tab.
#[derive(Debug, Clone, Serialize)]
pub struct TabReport {
    source: String,
    tab: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    week: Option<String>,
    #[serde(flatten)]
    outcome: RunOutcome,
}

impl TabReport {
    pub fn tab(&self) -> &str {
        &self.tab
    }

    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }
}

/// Handles the `opsync upload` command.
pub async fn upload(config: Config, mode: Mode, args: &UploadArgs) -> Result<Out<Vec<TabReport>>> {
    let mut sheet = api::sheet(&config, mode).await?;
    upload_with_sheet(&config, sheet.as_mut(), args).await
}

/// The command body, separated so tests can supply their own backend and
/// inspect it afterward.
pub(crate) async fn upload_with_sheet(
    config: &Config,
    sheet: &mut dyn Sheet,
    args: &UploadArgs,
) -> Result<Out<Vec<TabReport>>> {
    let decider = make_decider(args, config);
    let mut reports = Vec::new();
    let mut first_error: Option<Error> = None;

    if matches!(args.source(), SourceKind::Sales | SourceKind::All) {
        let result = run_sales(
            config,
            sheet,
            args,
            decider.as_ref(),
            &mut reports,
            &mut first_error,
        )
        .await;
        if let Err(e) = result {
            contain("sales", e, &mut reports, &mut first_error);
        }
    }
    if matches!(args.source(), SourceKind::Labor | SourceKind::All) {
        let result = run_labor(
            config,
            sheet,
            args,
            decider.as_ref(),
            &mut reports,
            &mut first_error,
        )
        .await;
        if let Err(e) = result {
            contain("labor", e, &mut reports, &mut first_error);
        }
    }

    for report in &reports {
        info!("{} '{}': {}", report.source, report.tab, report.outcome);
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let appended: usize = reports
        .iter()
        .map(|r| match r.outcome {
            RunOutcome::Appended { rows } => rows,
            _ => 0,
        })
        .sum();
    let skipped = reports
        .iter()
        .filter(|r| matches!(r.outcome, RunOutcome::Skipped { .. }))
        .count();
    let message = if args.dry_run() {
        format!("Dry run complete across {} tab(s), nothing written", reports.len())
    } else {
        format!("Upload complete: {appended} row(s) appended, {skipped} tab(s) skipped")
    };
    Ok(Out::new(message, reports))
}

/// Interactive prompts only happen in attended runs with the `ask` policy;
/// everything else resolves from policy without blocking.
fn make_decider(args: &UploadArgs, config: &Config) -> Box<dyn Decide> {
    let policy = args.policy().unwrap_or_else(|| config.overwrite_policy());
    if policy == OverwritePolicy::Ask && !args.batch() {
        Box::new(InteractiveDecider)
    } else {
        Box::new(PolicyDecider::new(policy))
    }
}

async fn run_sales(
    config: &Config,
    sheet: &mut dyn Sheet,
    args: &UploadArgs,
    decider: &dyn Decide,
    reports: &mut Vec<TabReport>,
    first_error: &mut Option<Error>,
) -> Result<()> {
    let on_disk = batches::list_folders(config.sales_dir()).await?;
    let names: Vec<&str> = on_disk.iter().map(|b| b.name.as_str()).collect();
    let candidates = locate::parse_candidates(names, config.sales_pattern(), config.tz());
    let tabs: Vec<String> = config.sales_tabs().values().cloned().collect();

    let Some(chosen) =
        select_batch(sheet, &candidates, args.select(), &tabs, config.tz(), decider).await?
    else {
        info!("No sales batch selected");
        reports.push(no_batch("sales"));
        return Ok(());
    };
    let week = chosen.week.clone();
    let batch = find_batch(&on_disk, &chosen.name)?;
    info!("Selected sales batch '{}' for week {week}", batch.name);

    let files = batches::csv_files_in(&batch.path).await?;
    for (stem, tab) in config.sales_tabs() {
        let Some((_, path)) = files.iter().find(|(s, _)| s == stem) else {
            warn!("Batch '{}' has no {stem}.csv, skipping tab '{tab}'", batch.name);
            reports.push(report(
                "sales",
                tab,
                &week,
                RunOutcome::skipped("report file missing from batch"),
            ));
            continue;
        };
        let outcome = isolate(
            upload_report(sheet, config, path, tab, &week, decider, args.dry_run(), None).await,
            tab,
            first_error,
        );
        reports.push(report("sales", tab, &week, outcome));
    }
    Ok(())
}

async fn run_labor(
    config: &Config,
    sheet: &mut dyn Sheet,
    args: &UploadArgs,
    decider: &dyn Decide,
    reports: &mut Vec<TabReport>,
    first_error: &mut Option<Error>,
) -> Result<()> {
    let on_disk = batches::list_csv_files(config.labor_dir()).await?;
    let names: Vec<&str> = on_disk.iter().map(|b| b.name.as_str()).collect();
    let candidates = locate::parse_candidates(names, config.labor_pattern(), config.tz());
    let tabs = vec![config.labor_tab().to_string()];

    let Some(chosen) =
        select_batch(sheet, &candidates, args.select(), &tabs, config.tz(), decider).await?
    else {
        info!("No labor batch selected");
        reports.push(no_batch("labor"));
        return Ok(());
    };
    let week = chosen.week.clone();
    let batch = find_batch(&on_disk, &chosen.name)?;
    info!("Selected labor file '{}' for week {week}", batch.name);

    let tab = config.labor_tab();
    let formula = Some((config.classification_column(), config.classification_formula()));
    let outcome = isolate(
        upload_report(
            sheet,
            config,
            &batch.path,
            tab,
            &week,
            decider,
            args.dry_run(),
            formula,
        )
        .await,
        tab,
        first_error,
    );
    reports.push(report("labor", tab, &week, outcome));
    Ok(())
}

/// Picks one candidate according to the selection mode, or `None` when there
/// is nothing to upload.
async fn select_batch<'a>(
    sheet: &mut dyn Sheet,
    candidates: &'a [Candidate],
    select: SelectMode,
    tabs: &[String],
    tz: Tz,
    decider: &dyn Decide,
) -> Result<Option<&'a Candidate>> {
    match select {
        SelectMode::Latest => {
            let ties = locate::latest(candidates);
            Ok(locate::resolve_tie(&ties, decider))
        }
        SelectMode::OldestMissing => {
            let existing = index::existing_weeks(sheet, tabs, tz).await?;
            Ok(locate::oldest_missing(candidates, &existing))
        }
    }
}

/// Uploads one CSV report to one destination tab.
///
/// The decision pipeline (conflict resolution included) always runs; a dry
/// run only suppresses the mutating calls.
#[allow(clippy::too_many_arguments)]
async fn upload_report(
    sheet: &mut dyn Sheet,
    config: &Config,
    path: &Path,
    tab: &str,
    week: &WeekKey,
    decider: &dyn Decide,
    dry_run: bool,
    formula: Option<(&str, &str)>,
) -> Result<RunOutcome> {
    let table = batches::read_table(path).await?;
    if table.is_empty() {
        return Ok(RunOutcome::skipped("empty source"));
    }

    let header = sheet.header(tab).await?;
    if header.is_empty() {
        bail!("Tab '{tab}' has no header row");
    }
    let key_column = sheet.key_column(tab).await?;

    let resolution = conflict::resolve(tab, week, &key_column, config.tz(), decider);
    let deleted = match &resolution {
        Resolution::Skip(reason) => return Ok(RunOutcome::skipped(reason.clone())),
        Resolution::Append => 0,
        Resolution::OverwriteThenAppend(positions) => positions.len(),
    };

    let rows = mapper::build_rows(&table, &header, week, &config.reserved_columns());
    if dry_run {
        let action = if deleted > 0 {
            format!("replace {deleted} existing row(s) with {}", rows.len())
        } else {
            format!("append {} row(s)", rows.len())
        };
        return Ok(RunOutcome::skipped(format!("dry-run: would {action}")));
    }

    if let Resolution::OverwriteThenAppend(positions) = &resolution {
        sheet.delete_rows(tab, positions).await?;
    }

    // First appended row's absolute position, computed before the append.
    let start_row = key_column.len() as u64 - deleted as u64 + 2;
    if let Err(e) = sheet.append_rows(tab, &rows).await {
        if deleted > 0 {
            return Err(e.context(format!(
                "Append to '{tab}' failed after {deleted} existing row(s) for week {week} \
                 were already deleted; the tab is now missing that week's data and needs \
                 manual inspection"
            )));
        }
        return Err(e);
    }

    if let Some((column_name, template)) = formula {
        write_classification_formulas(sheet, tab, &header, column_name, template, start_row, rows.len())
            .await?;
    }
    Ok(RunOutcome::Appended { rows: rows.len() })
}

/// Fills the classification column of freshly-appended rows with the
/// configured formula template, `{row}` replaced by the absolute row number.
async fn write_classification_formulas(
    sheet: &mut dyn Sheet,
    tab: &str,
    header: &[String],
    column_name: &str,
    template: &str,
    start_row: u64,
    count: usize,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let folded = mapper::fold(column_name);
    let Some(col) = header.iter().position(|h| mapper::fold(h) == folded) else {
        warn!("Tab '{tab}' has no '{column_name}' column, formulas not written");
        return Ok(());
    };
    let formulas: Vec<String> = (0..count)
        .map(|i| template.replace("{row}", &(start_row + i as u64).to_string()))
        .collect();
    sheet
        .write_formulas(tab, start_row, col + 1, &formulas)
        .await
        .with_context(|| format!("Failed to write classification formulas to '{tab}'"))
}

/// Converts a whole-source failure (missing directory, unreadable index tab)
/// into an aborted report so the other source still runs.
fn contain(source: &str, e: Error, reports: &mut Vec<TabReport>, first_error: &mut Option<Error>) {
    error!("The {source} source failed: {e:#}");
    reports.push(TabReport {
        source: source.to_string(),
        tab: String::new(),
        week: None,
        outcome: RunOutcome::aborted(format!("{e:#}")),
    });
    if first_error.is_none() {
        *first_error = Some(e);
    }
}

/// Converts a per-tab failure into an outcome, keeping the first error for
/// the top-level exit status.
fn isolate(result: Result<RunOutcome>, tab: &str, first_error: &mut Option<Error>) -> RunOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Upload to '{tab}' failed: {e:#}");
            let outcome = RunOutcome::aborted(format!("{e:#}"));
            if first_error.is_none() {
                *first_error = Some(e);
            }
            outcome
        }
    }
}

fn find_batch<'a>(on_disk: &'a [SourceBatch], name: &str) -> Result<&'a SourceBatch> {
    on_disk
        .iter()
        .find(|b| b.name == name)
        .with_context(|| format!("Batch '{name}' disappeared from disk"))
}

fn report(source: &str, tab: &str, week: &WeekKey, outcome: RunOutcome) -> TabReport {
    TabReport {
        source: source.to_string(),
        tab: tab.to_string(),
        week: Some(week.to_string()),
        outcome,
    }
}

fn no_batch(source: &str) -> TabReport {
    TabReport {
        source: source.to_string(),
        tab: String::new(),
        week: None,
        outcome: RunOutcome::NoMatchingBatch,
    }
}
