//! Artifact export: CSV tables, JSON summary, Parquet value series.
//!
//! One run writes into `{output_dir}/{run_id prefix}/`:
//! - `account_value.csv` / `benchmark_value.csv`: time-zero padded value series
//! - `info.csv`: per-session trading statistics
//! - `realized_volume.csv` / `realized_weights.csv`: wide date × instrument tables
//! - `advisories.json` / `delistings.json`
//! - `summary.json`
//! - `account_value.parquet` / `benchmark_value.parquet` when Parquet is requested

use anyhow::{Context, Result};
use polars::prelude::{Column, DataFrame, NamedFrom, ParquetWriter, Series};
use rebalance_core::engine::{InfoRecord, ValuePoint};
use rebalance_core::{BacktestOutcome, HoldingMatrix, IdealWorldSeries};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{OutputConfig, OutputFormat};
use crate::runner::RunSummary;
use crate::sweep::SweepEntry;

// ─── CSV ────────────────────────────────────────────────────────────

/// `date,{column}` value series.
pub fn export_value_csv(series: &[ValuePoint], column: &str) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", column])?;
    for p in series {
        wtr.write_record([p.date.to_string(), format!("{:.6}", p.value)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per session, columns as in [`InfoRecord`].
pub fn export_info_csv(info: &[InfoRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in info {
        wtr.serialize(record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Wide table: `date` followed by one column per instrument.
pub fn export_holding_csv(matrix: &HoldingMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["date".to_string()];
    header.extend(matrix.universe().ids().iter().cloned());
    wtr.write_record(&header)?;
    for (date, row) in matrix.dates().iter().zip(matrix.rows()) {
        let mut record = vec![date.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Sweep leaderboard, one row per grid point in the given order.
pub fn export_sweep_csv(entries: &[SweepEntry]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for entry in entries {
        wtr.serialize(entry)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// `date,return,value,log_return` of an ideal-world series.
pub fn export_ideal_csv(series: &IdealWorldSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "return", "value", "log_return"])?;
    for (t, date) in series.dates.iter().enumerate() {
        wtr.write_record([
            date.to_string(),
            format!("{:.10}", series.portfolio_return[t]),
            format!("{:.10}", series.cumulative_value[t]),
            format!("{:.10}", series.log_return[t]),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Parquet ────────────────────────────────────────────────────────

pub fn write_value_parquet(path: &Path, series: &[ValuePoint], column: &str) -> Result<()> {
    let dates: Vec<String> = series.iter().map(|p| p.date.to_string()).collect();
    let values: Vec<f64> = series.iter().map(|p| p.value).collect();

    let mut df = DataFrame::new(vec![
        Column::Series(Series::new("date".into(), dates).into()),
        Column::Series(Series::new(column.into(), values).into()),
    ])
    .with_context(|| format!("failed to build {column} dataframe"))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create parquet {}", path.display()))?;
    ParquetWriter::new(&mut file)
        .finish(&mut df)
        .with_context(|| format!("failed to write parquet {}", path.display()))?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_text(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Save the full artifact set for one run. Returns the run directory.
pub fn save_artifacts(
    outcome: &BacktestOutcome,
    summary: &RunSummary,
    output: &OutputConfig,
) -> Result<PathBuf> {
    let short_id = &summary.run_id[..summary.run_id.len().min(12)];
    let run_dir = output.dir.join(short_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_text(
        &run_dir.join("account_value.csv"),
        &export_value_csv(&outcome.account_value, "account_value")?,
    )?;
    if let Some(bench) = &outcome.benchmark_value {
        write_text(
            &run_dir.join("benchmark_value.csv"),
            &export_value_csv(bench, "benchmark_value")?,
        )?;
    }
    write_text(&run_dir.join("info.csv"), &export_info_csv(&outcome.info)?)?;
    write_text(
        &run_dir.join("realized_volume.csv"),
        &export_holding_csv(&outcome.realized_volume)?,
    )?;
    write_text(
        &run_dir.join("realized_weights.csv"),
        &export_holding_csv(&outcome.realized_weights)?,
    )?;
    write_json(&run_dir.join("advisories.json"), &outcome.advisories)?;
    write_json(&run_dir.join("delistings.json"), &outcome.delistings)?;
    write_json(&run_dir.join("summary.json"), summary)?;

    if output.format == OutputFormat::Parquet {
        write_value_parquet(
            &run_dir.join("account_value.parquet"),
            &outcome.account_value,
            "account_value",
        )?;
        if let Some(bench) = &outcome.benchmark_value {
            write_value_parquet(
                &run_dir.join("benchmark_value.parquet"),
                bench,
                "benchmark_value",
            )?;
        }
    }

    info!(dir = %run_dir.display(), "artifacts written");
    Ok(run_dir)
}
