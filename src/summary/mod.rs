pub mod strategy;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::date_util::week_start;
use crate::error::Result;
use crate::ingest::ActivityRecord;
use crate::llm::{Completion, Summarizer};
use crate::query::period::select_period;
use crate::query::scope::{Level, Scope};
use crate::storage::{repository, Database};

pub use strategy::Strategy;

/// Text stored when a scope has no records in the requested window.
pub const NO_DATA_TEXT: &str = "No data";

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryRequest {
    pub scope: Scope,
    pub period_days: u32,
    pub strategy: Strategy,
}

impl SummaryRequest {
    pub fn new(scope: Scope, period_days: u32, strategy: Strategy) -> Self {
        Self {
            scope,
            period_days,
            strategy,
        }
    }
}

/// The outcome of running one request through the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedSummary {
    pub text: String,
    /// Tokens summed over every call made for this summary.
    pub tokens: u64,
    /// Model latency summed over every call made for this summary.
    pub elapsed_secs: f64,
    pub calls: u32,
    pub failed_calls: u32,
}

impl GeneratedSummary {
    pub fn no_data() -> Self {
        Self {
            text: NO_DATA_TEXT.to_string(),
            tokens: 0,
            elapsed_secs: 0.0,
            calls: 0,
            failed_calls: 0,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.calls == 0 && self.text == NO_DATA_TEXT
    }
}

/// Running totals across the calls of one summary.
#[derive(Debug, Default)]
struct CallTotals {
    tokens: u64,
    elapsed_secs: f64,
    calls: u32,
    failed_calls: u32,
}

impl CallTotals {
    fn absorb(&mut self, completion: &Completion) {
        self.tokens += completion.total_tokens();
        self.elapsed_secs += completion.elapsed_secs();
        self.calls += 1;
        if completion.is_failed() {
            self.failed_calls += 1;
        }
    }

    fn finish(self, text: &str) -> GeneratedSummary {
        GeneratedSummary {
            text: text.to_string(),
            tokens: self.tokens,
            elapsed_secs: self.elapsed_secs,
            calls: self.calls,
            failed_calls: self.failed_calls,
        }
    }
}

/// Generate one summary.
///
/// The window is anchored at the latest timestamp of the whole log, then
/// narrowed to the request's scope. An empty result short-circuits to
/// [`GeneratedSummary::no_data`] without calling the model. Strategies that
/// do not apply to the period length run as [`Strategy::Direct`].
pub async fn generate_summary<S: Summarizer>(
    records: &[ActivityRecord],
    request: &SummaryRequest,
    summarizer: &S,
) -> Result<GeneratedSummary> {
    let SummaryRequest {
        scope,
        period_days,
        strategy,
    } = request;
    log::info!("Generating {strategy} summary for {scope} over {period_days} days");

    let Some((_, in_period)) = select_period(records, *period_days)? else {
        log::info!("No data for this period");
        return Ok(GeneratedSummary::no_data());
    };
    let selected = scope.filter(&in_period);
    if selected.is_empty() {
        log::info!("No data for {scope} in this period");
        return Ok(GeneratedSummary::no_data());
    }

    let prefix = scope.prompt_prefix();
    let final_prefix = format!("{prefix}{period_days}-day activity:");

    let effective = strategy.effective_for(*period_days);
    if effective != *strategy {
        log::info!("{strategy} does not apply to {period_days} days, falling back to direct");
    }

    let summary = match effective {
        Strategy::Direct => {
            let completion = summarizer.summarize(&join_text(&selected), &final_prefix).await;
            let mut totals = CallTotals::default();
            totals.absorb(&completion);
            totals.finish(completion.text())
        }
        Strategy::DailyChained => {
            let groups = group_by_day(&selected)
                .into_iter()
                .map(|(date, recs)| (format!("{prefix}updates for {date}:"), recs))
                .collect();
            chain(summarizer, groups, &final_prefix).await
        }
        Strategy::WeeklyChained => {
            let groups = group_by_week(&selected)
                .into_iter()
                .map(|(monday, recs)| (format!("{prefix}updates for week starting {monday}:"), recs))
                .collect();
            chain(summarizer, groups, &final_prefix).await
        }
    };

    log::info!(
        "Done: {} tokens, {:.2}s over {} calls",
        summary.tokens,
        summary.elapsed_secs,
        summary.calls
    );
    Ok(summary)
}

/// Summarize each group, then summarize the concatenated group summaries.
async fn chain<S: Summarizer>(
    summarizer: &S,
    groups: Vec<(String, Vec<&ActivityRecord>)>,
    final_prefix: &str,
) -> GeneratedSummary {
    let mut totals = CallTotals::default();
    let mut partials = Vec::with_capacity(groups.len());
    let count = groups.len();

    for (i, (prefix, recs)) in groups.iter().enumerate() {
        log::debug!("Summarizing group {}/{count}: {prefix}", i + 1);
        let completion = summarizer.summarize(&join_text(recs), prefix).await;
        log::debug!(
            "Group {}: {} tokens, {:.2}s",
            i + 1,
            completion.total_tokens(),
            completion.elapsed_secs()
        );
        totals.absorb(&completion);
        partials.push(completion.text().to_string());
    }

    if partials.is_empty() {
        return GeneratedSummary::no_data();
    }

    log::debug!("Chaining {} summaries", partials.len());
    let completion = summarizer.summarize(&partials.join("\n"), final_prefix).await;
    totals.absorb(&completion);
    totals.finish(completion.text())
}

fn join_text(records: &[&ActivityRecord]) -> String {
    records
        .iter()
        .map(|r| r.text())
        .collect::<Vec<_>>()
        .join("\n")
}

fn group_by_day<'a>(records: &[&'a ActivityRecord]) -> BTreeMap<NaiveDate, Vec<&'a ActivityRecord>> {
    let mut days: BTreeMap<NaiveDate, Vec<&ActivityRecord>> = BTreeMap::new();
    for &r in records {
        days.entry(r.created_at.date()).or_default().push(r);
    }
    days
}

fn group_by_week<'a>(records: &[&'a ActivityRecord]) -> BTreeMap<NaiveDate, Vec<&'a ActivityRecord>> {
    let mut weeks: BTreeMap<NaiveDate, Vec<&ActivityRecord>> = BTreeMap::new();
    for &r in records {
        weeks.entry(week_start(r.created_at.date())).or_default().push(r);
    }
    weeks
}

/// A completed request, ready to append to the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub level: Level,
    pub entity: String,
    pub period_days: u32,
    /// The requested strategy, even when it ran as direct.
    pub strategy: Strategy,
    pub summary_text: String,
    pub tokens: u64,
    pub time_taken: f64,
    pub generated_at: String,
}

impl SummaryResult {
    pub fn new(request: &SummaryRequest, summary: &GeneratedSummary) -> Self {
        Self {
            level: request.scope.level(),
            entity: request.scope.entity().to_string(),
            period_days: request.period_days,
            strategy: request.strategy,
            summary_text: summary.text.clone(),
            tokens: summary.tokens,
            time_taken: summary.elapsed_secs,
            generated_at: chrono::Local::now()
                .naive_local()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        }
    }
}

/// Append a result row; returns its id.
pub async fn store_result(db: &Database, result: &SummaryResult) -> Result<i64> {
    let result = result.clone();
    let id = db
        .writer()
        .call(move |conn| repository::insert_summary(conn, &result))
        .await?;
    Ok(id)
}
