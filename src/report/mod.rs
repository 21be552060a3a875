//! Static export of stored results: raw CSV, grouped statistics, charts and
//! an HTML page tying them together.

pub mod chart;
pub mod html;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::date_util::round_to;
use crate::error::Result;
use crate::metrics::{average_by_period, average_by_strategy, strategy_stats, StrategyStats};
use crate::storage::repository::{self, SummaryRow};
use crate::storage::Database;

pub const EXPORT_FILE: &str = "summaries_export.csv";
pub const STATISTICS_FILE: &str = "summary_statistics.csv";
pub const CHARTS_FILE: &str = "analysis_charts.svg";
pub const REPORT_FILE: &str = "analysis_report.html";

/// What an export wrote.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub rows: usize,
    pub report: PathBuf,
    pub export_csv: PathBuf,
    pub statistics_csv: PathBuf,
    pub charts: PathBuf,
}

impl ExportSummary {
    pub fn files(&self) -> [&Path; 4] {
        [
            &self.report,
            &self.export_csv,
            &self.statistics_csv,
            &self.charts,
        ]
    }
}

/// Export every stored summary into `out_dir`.
///
/// Returns `None`, writing nothing, when the store is empty.
pub async fn export_report(db: &Database, out_dir: impl AsRef<Path>) -> Result<Option<ExportSummary>> {
    let rows = db
        .reader()
        .call(|conn| repository::list_summaries(conn))
        .await?;
    if rows.is_empty() {
        log::info!("No stored summaries, nothing to export");
        return Ok(None);
    }

    let generated_on = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    write_report(&rows, out_dir.as_ref(), &generated_on).map(Some)
}

fn write_report(rows: &[SummaryRow], out_dir: &Path, generated_on: &str) -> Result<ExportSummary> {
    std::fs::create_dir_all(out_dir)?;

    let export_csv = out_dir.join(EXPORT_FILE);
    write_rows_csv(&export_csv, rows)?;
    log::info!("Exported raw data to {}", export_csv.display());

    let statistics_csv = out_dir.join(STATISTICS_FILE);
    write_statistics_csv(&statistics_csv, &strategy_stats(rows))?;
    log::info!("Exported summary statistics to {}", statistics_csv.display());

    let by_strategy = average_by_strategy(rows);
    let by_period = average_by_period(rows);

    let charts = out_dir.join(CHARTS_FILE);
    std::fs::write(
        &charts,
        chart::render_svg(&chart::report_charts(&by_strategy, &by_period)),
    )?;
    log::info!("Exported charts to {}", charts.display());

    let report = out_dir.join(REPORT_FILE);
    std::fs::write(&report, html::render_report(rows, &by_strategy, generated_on))?;
    log::info!("Exported complete report to {}", report.display());

    Ok(ExportSummary {
        rows: rows.len(),
        report,
        export_csv,
        statistics_csv,
        charts,
    })
}

fn write_rows_csv(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One line of `summary_statistics.csv`.
#[derive(Debug, Serialize)]
struct StatisticsLine<'a> {
    level: &'a str,
    strategy: &'a str,
    tokens_mean: f64,
    tokens_std: Option<f64>,
    tokens_min: f64,
    tokens_max: f64,
    time_taken_mean: f64,
    time_taken_std: Option<f64>,
    time_taken_min: f64,
    time_taken_max: f64,
}

impl<'a> From<&'a StrategyStats> for StatisticsLine<'a> {
    fn from(s: &'a StrategyStats) -> Self {
        let r = |v: f64| round_to(v, 2);
        Self {
            level: &s.level,
            strategy: &s.strategy,
            tokens_mean: r(s.tokens.mean),
            tokens_std: s.tokens.std.map(r),
            tokens_min: r(s.tokens.min),
            tokens_max: r(s.tokens.max),
            time_taken_mean: r(s.time.mean),
            time_taken_std: s.time.std.map(r),
            time_taken_min: r(s.time.min),
            time_taken_max: r(s.time.max),
        }
    }
}

fn write_statistics_csv(path: &Path, stats: &[StrategyStats]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for s in stats {
        writer.serialize(StatisticsLine::from(s))?;
    }
    writer.flush()?;
    Ok(())
}
