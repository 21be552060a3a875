pub mod batch;
pub mod config;
pub mod date_util;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod metrics;
pub mod query;
pub mod report;
pub mod storage;
pub mod summary;

use std::path::Path;

use serde::Serialize;

pub use batch::{BatchPlan, BatchProgress, BatchReport, NoopProgress};
pub use config::Settings;
pub use error::{Error, Result};
pub use ingest::{ActivityLog, ActivityRecord};
pub use llm::{Completion, OpenAiClient, Summarizer};
pub use metrics::{PeriodStats, StrategyStats};
pub use query::builder::{OrderBy, ResultsQuery};
pub use query::period::TrailingWindow;
pub use query::scope::{Level, Scope, ALL_TEAMS};
pub use report::ExportSummary;
pub use storage::Database;
pub use summary::{GeneratedSummary, Strategy, SummaryRequest, SummaryResult};

// Re-export repository types needed by the binary crate, but not the module itself
pub use storage::repository::{FilterColumn, SummaryRow};

use storage::repository;

/// Store overview for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub summaries: i64,
    pub last_generated_at: Option<String>,
    pub levels: Vec<String>,
    pub entities: Vec<String>,
    pub periods: Vec<String>,
    pub strategies: Vec<String>,
}

/// Main entry point for generating and browsing stand-up summaries.
pub struct StandupDigest {
    db: Database,
}

impl StandupDigest {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub async fn settings(&self) -> Result<Settings> {
        Settings::load(&self.db).await
    }

    // ── Generation ─────────────────────────────────────────────────

    /// Run the full (scope × period × strategy) grid.
    pub async fn run<S: Summarizer>(
        &self,
        log: &ActivityLog,
        plan: &BatchPlan,
        summarizer: &S,
        progress: &dyn BatchProgress,
    ) -> Result<BatchReport> {
        batch::run_batch(&self.db, log, plan, summarizer, progress).await
    }

    /// Generate one summary, optionally appending it to the store.
    /// Returns the stored row id when `store` is set.
    pub async fn generate<S: Summarizer>(
        &self,
        log: &ActivityLog,
        request: &SummaryRequest,
        summarizer: &S,
        store: bool,
    ) -> Result<(GeneratedSummary, Option<i64>)> {
        let summary = summary::generate_summary(log.records(), request, summarizer).await?;
        let id = if store {
            Some(summary::store_result(&self.db, &SummaryResult::new(request, &summary)).await?)
        } else {
            None
        };
        Ok((summary, id))
    }

    // ── Results ────────────────────────────────────────────────────

    pub async fn results(&self, query: ResultsQuery) -> Result<Vec<SummaryRow>> {
        query.rows(&self.db).await
    }

    pub async fn stats(&self, query: ResultsQuery) -> Result<Vec<PeriodStats>> {
        metrics::compute_period_stats(&self.db, query).await
    }

    pub async fn export(&self, out_dir: impl AsRef<Path>) -> Result<Option<ExportSummary>> {
        report::export_report(&self.db, out_dir).await
    }

    pub async fn status(&self) -> Result<StoreStatus> {
        self.db
            .reader()
            .call(|conn| {
                let conn: &rusqlite::Connection = conn;
                let distinct = |column| repository::distinct_values(conn, column);
                Ok::<StoreStatus, rusqlite::Error>(StoreStatus {
                    summaries: repository::count_summaries(conn)?,
                    last_generated_at: repository::last_generated_at(conn)?,
                    levels: distinct(FilterColumn::Level)?,
                    entities: distinct(FilterColumn::Entity)?,
                    periods: distinct(FilterColumn::PeriodDays)?,
                    strategies: distinct(FilterColumn::Strategy)?,
                })
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Validate and store a setting.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        config::validate(key, value)?;
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.trim().to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_unset(&self, key: &str) -> Result<bool> {
        self.db
            .writer()
            .call({
                let key = key.to_string();
                move |conn| repository::unset_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
