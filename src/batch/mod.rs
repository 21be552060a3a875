use serde::Serialize;

use crate::config::Settings;
use crate::error::Result;
use crate::ingest::ActivityLog;
use crate::llm::Summarizer;
use crate::query::scope::Scope;
use crate::storage::Database;
use crate::summary::{generate_summary, store_result, GeneratedSummary, Strategy, SummaryRequest, SummaryResult};

/// Progress callbacks for a batch run.
pub trait BatchProgress {
    fn on_request_start(&self, request: &SummaryRequest, index: usize, total: usize);
    fn on_request_complete(&self, request: &SummaryRequest, summary: &GeneratedSummary);
}

/// Progress sink that ignores every event.
pub struct NoopProgress;

impl BatchProgress for NoopProgress {
    fn on_request_start(&self, _request: &SummaryRequest, _index: usize, _total: usize) {}
    fn on_request_complete(&self, _request: &SummaryRequest, _summary: &GeneratedSummary) {}
}

/// The (scope × period × strategy) grid to run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub scopes: Vec<Scope>,
    pub periods: Vec<u32>,
    pub strategies: Vec<Strategy>,
}

impl BatchPlan {
    /// Users first (up to `max_users`, in first-appearance order), then
    /// teams, then the aggregate.
    pub fn from_log(log: &ActivityLog, settings: &Settings) -> Self {
        let mut scopes: Vec<Scope> = log
            .respondents()
            .into_iter()
            .take(settings.max_users)
            .map(Scope::User)
            .collect();
        scopes.extend(log.teams().into_iter().map(Scope::Team));
        scopes.push(Scope::All);

        Self {
            scopes,
            periods: settings.periods.clone(),
            strategies: Strategy::ALL.to_vec(),
        }
    }

    /// Every request in run order, without inapplicable strategies.
    pub fn requests(&self) -> Vec<SummaryRequest> {
        let mut out = Vec::new();
        for scope in &self.scopes {
            for &period in &self.periods {
                for &strategy in &self.strategies {
                    if strategy.applies_to(period) {
                        out.push(SummaryRequest::new(scope.clone(), period, strategy));
                    }
                }
            }
        }
        out
    }
}

/// Totals returned after a batch run completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub requests_run: u64,
    pub rows_stored: u64,
    pub no_data: u64,
    pub model_calls: u64,
    pub failed_calls: u64,
    pub total_tokens: u64,
    pub total_secs: f64,
}

impl BatchReport {
    fn record(&mut self, summary: &GeneratedSummary) {
        self.requests_run += 1;
        if summary.is_no_data() {
            self.no_data += 1;
        }
        self.model_calls += summary.calls as u64;
        self.failed_calls += summary.failed_calls as u64;
        self.total_tokens += summary.tokens;
        self.total_secs += summary.elapsed_secs;
    }
}

/// Run every request in `plan` sequentially, storing one row per request.
///
/// Model failures are folded into the stored rows; only storage errors stop
/// the run.
pub async fn run_batch<S: Summarizer>(
    db: &Database,
    log: &ActivityLog,
    plan: &BatchPlan,
    summarizer: &S,
    progress: &dyn BatchProgress,
) -> Result<BatchReport> {
    let requests = plan.requests();
    let total = requests.len();
    log::info!(
        "Running {total} requests over {} scopes and {} periods",
        plan.scopes.len(),
        plan.periods.len()
    );

    let mut report = BatchReport::default();
    for (i, request) in requests.iter().enumerate() {
        progress.on_request_start(request, i, total);

        let summary = generate_summary(log.records(), request, summarizer).await?;
        if summary.failed_calls > 0 {
            log::warn!(
                "{} of {} calls failed for {} ({} days, {})",
                summary.failed_calls,
                summary.calls,
                request.scope,
                request.period_days,
                request.strategy
            );
        }

        store_result(db, &SummaryResult::new(request, &summary)).await?;
        report.rows_stored += 1;
        report.record(&summary);

        progress.on_request_complete(request, &summary);
    }

    log::info!(
        "Batch complete: {} rows, {} tokens, {:.2}s",
        report.rows_stored,
        report.total_tokens,
        report.total_secs
    );
    Ok(report)
}
