pub mod types;

use std::collections::BTreeMap;

pub use types::*;

use crate::error::Result;
use crate::query::builder::ResultsQuery;
use crate::storage::repository::SummaryRow;
use crate::storage::Database;

/// Grouped usage for the rows matched by `query`, keyed by
/// (level, strategy, period).
pub async fn compute_period_stats(db: &Database, query: ResultsQuery) -> Result<Vec<PeriodStats>> {
    let rows = query.rows(db).await?;
    Ok(period_stats(&rows))
}

pub fn period_stats(rows: &[SummaryRow]) -> Vec<PeriodStats> {
    let mut groups: BTreeMap<(&str, &str, i64), Vec<&SummaryRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.level.as_str(), row.strategy.as_str(), row.period_days))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((level, strategy, period_days), group)| {
            let tokens = distribution(&token_values(&group));
            let time = distribution(&time_values(&group));
            PeriodStats {
                level: level.to_string(),
                strategy: strategy.to_string(),
                period_days,
                count: tokens.count,
                tokens_mean: tokens.mean,
                tokens_sum: tokens.sum,
                time_mean: time.mean,
                time_sum: time.sum,
            }
        })
        .collect()
}

/// Token and time distributions keyed by (level, strategy).
pub fn strategy_stats(rows: &[SummaryRow]) -> Vec<StrategyStats> {
    let mut groups: BTreeMap<(&str, &str), Vec<&SummaryRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.level.as_str(), row.strategy.as_str()))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((level, strategy), group)| StrategyStats {
            level: level.to_string(),
            strategy: strategy.to_string(),
            tokens: distribution(&token_values(&group)),
            time: distribution(&time_values(&group)),
        })
        .collect()
}

/// Mean usage per strategy, in strategy-name order.
pub fn average_by_strategy(rows: &[SummaryRow]) -> Vec<Average> {
    let mut groups: BTreeMap<&str, Vec<&SummaryRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.strategy.as_str()).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(key, group)| average(key.to_string(), &group))
        .collect()
}

/// Mean usage per period length, shortest first.
pub fn average_by_period(rows: &[SummaryRow]) -> Vec<Average> {
    let mut groups: BTreeMap<i64, Vec<&SummaryRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.period_days).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(key, group)| average(key.to_string(), &group))
        .collect()
}

/// The entry with the lowest mean token count. Ties keep the first.
pub fn most_token_efficient(averages: &[Average]) -> Option<&Average> {
    averages
        .iter()
        .reduce(|best, a| if a.tokens < best.tokens { a } else { best })
}

/// The entry with the lowest mean time. Ties keep the first.
pub fn fastest(averages: &[Average]) -> Option<&Average> {
    averages
        .iter()
        .reduce(|best, a| if a.time < best.time { a } else { best })
}

fn average(key: String, group: &[&SummaryRow]) -> Average {
    Average {
        key,
        count: group.len() as u64,
        tokens: distribution(&token_values(group)).mean,
        time: distribution(&time_values(group)).mean,
    }
}

fn token_values(group: &[&SummaryRow]) -> Vec<f64> {
    group.iter().map(|r| r.tokens as f64).collect()
}

fn time_values(group: &[&SummaryRow]) -> Vec<f64> {
    group.iter().map(|r| r.time_taken).collect()
}

fn distribution(values: &[f64]) -> Distribution {
    if values.is_empty() {
        return Distribution::default();
    }

    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    let mean = sum / n;
    let std = (values.len() > 1).then(|| {
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    });
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Distribution {
        count: values.len() as u64,
        sum,
        mean,
        std,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(level: &str, strategy: &str, period: i64, tokens: i64, time: f64) -> SummaryRow {
        SummaryRow {
            id: 0,
            level: level.to_string(),
            entity: "alice".to_string(),
            period_days: period,
            strategy: strategy.to_string(),
            summary_text: "text".to_string(),
            tokens,
            time_taken: time,
            generated_at: "2024-07-10T12:00:00".to_string(),
        }
    }

    fn sample() -> Vec<SummaryRow> {
        vec![
            row("user", "direct", 3, 100, 1.0),
            row("user", "direct", 3, 200, 3.0),
            row("user", "daily_chained", 3, 400, 6.0),
            row("user", "direct", 7, 300, 2.0),
            row("team", "weekly_chained", 15, 900, 9.0),
        ]
    }

    #[test]
    fn test_distribution_empty() {
        let d = distribution(&[]);
        assert_eq!(d.count, 0);
        assert_eq!(d.std, None);
    }

    #[test]
    fn test_distribution_single_value_has_no_std() {
        let d = distribution(&[5.0]);
        assert_eq!(d.mean, 5.0);
        assert_eq!(d.std, None);
        assert_eq!(d.min, 5.0);
        assert_eq!(d.max, 5.0);
    }

    #[test]
    fn test_distribution_sample_std() {
        let d = distribution(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(d.count, 8);
        assert_eq!(d.mean, 5.0);
        // Sample variance is 32 / 7.
        let std = d.std.unwrap();
        assert!((std - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
        assert_eq!(d.min, 2.0);
        assert_eq!(d.max, 9.0);
    }

    #[test]
    fn test_period_stats_groups() {
        let stats = period_stats(&sample());
        assert_eq!(stats.len(), 4);

        let direct3 = stats
            .iter()
            .find(|s| s.level == "user" && s.strategy == "direct" && s.period_days == 3)
            .unwrap();
        assert_eq!(direct3.count, 2);
        assert_eq!(direct3.tokens_mean, 150.0);
        assert_eq!(direct3.tokens_sum, 300.0);
        assert_eq!(direct3.time_mean, 2.0);
        assert_eq!(direct3.time_sum, 4.0);
    }

    #[test]
    fn test_strategy_stats_groups() {
        let stats = strategy_stats(&sample());
        let keys: Vec<(&str, &str)> = stats
            .iter()
            .map(|s| (s.level.as_str(), s.strategy.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("team", "weekly_chained"),
                ("user", "daily_chained"),
                ("user", "direct"),
            ]
        );
        let direct = &stats[2];
        assert_eq!(direct.tokens.count, 3);
        assert_eq!(direct.tokens.mean, 200.0);
        assert_eq!(direct.tokens.min, 100.0);
        assert_eq!(direct.tokens.max, 300.0);
        assert_eq!(direct.tokens.std, Some(100.0));
    }

    #[test]
    fn test_averages_and_findings() {
        let rows = sample();
        let by_strategy = average_by_strategy(&rows);
        let keys: Vec<&str> = by_strategy.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["daily_chained", "direct", "weekly_chained"]);
        assert_eq!(most_token_efficient(&by_strategy).unwrap().key, "direct");
        assert_eq!(fastest(&by_strategy).unwrap().key, "direct");

        let by_period = average_by_period(&rows);
        let keys: Vec<&str> = by_period.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["3", "7", "15"]);
        assert!((by_period[0].tokens - 700.0 / 3.0).abs() < 1e-9);

        assert!(most_token_efficient(&[]).is_none());
    }

    #[tokio::test]
    async fn test_compute_period_stats_applies_query() {
        use crate::query::scope::{Level, Scope};
        use crate::storage::repository;
        use crate::summary::{GeneratedSummary, Strategy, SummaryRequest, SummaryResult};

        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                for (scope, tokens) in [
                    (Scope::User("alice".into()), 10),
                    (Scope::User("bob".into()), 30),
                    (Scope::All, 100),
                ] {
                    let summary = GeneratedSummary {
                        text: "s".into(),
                        tokens,
                        elapsed_secs: 1.0,
                        calls: 1,
                        failed_calls: 0,
                    };
                    let req = SummaryRequest::new(scope, 5, Strategy::Direct);
                    repository::insert_summary(conn, &SummaryResult::new(&req, &summary))?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let stats = compute_period_stats(&db, ResultsQuery::new().level(Level::User))
            .await
            .unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].tokens_mean, 20.0);
        assert_eq!(stats[0].time_sum, 2.0);
    }
}
