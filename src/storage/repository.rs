use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::summary::SummaryResult;

// ── Summaries ──────────────────────────────────────────────────────

/// A stored summary row as read back from the `summaries` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub id: i64,
    pub level: String,
    pub entity: String,
    pub period_days: i64,
    pub strategy: String,
    pub summary_text: String,
    pub tokens: i64,
    pub time_taken: f64,
    pub generated_at: String,
}

pub(crate) const SUMMARY_COLUMNS: &str =
    "id, level, entity, period_days, strategy, summary_text, tokens, time_taken, generated_at";

pub(crate) fn summary_from_row(row: &Row<'_>) -> Result<SummaryRow, rusqlite::Error> {
    Ok(SummaryRow {
        id: row.get(0)?,
        level: row.get(1)?,
        entity: row.get(2)?,
        period_days: row.get(3)?,
        strategy: row.get(4)?,
        summary_text: row.get(5)?,
        tokens: row.get(6)?,
        time_taken: row.get(7)?,
        generated_at: row.get(8)?,
    })
}

/// Append one result. There is no update path; reruns add new rows.
pub fn insert_summary(conn: &Connection, result: &SummaryResult) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO summaries (level, entity, period_days, strategy, summary_text, tokens, time_taken, generated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            result.level.as_str(),
            result.entity,
            result.period_days,
            result.strategy.as_str(),
            result.summary_text,
            result.tokens as i64,
            result.time_taken,
            result.generated_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_summaries(conn: &Connection) -> Result<Vec<SummaryRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("SELECT {SUMMARY_COLUMNS} FROM summaries ORDER BY id"))?;
    let rows = stmt.query_map([], summary_from_row)?;
    rows.collect()
}

pub fn count_summaries(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))
}

pub fn last_generated_at(conn: &Connection) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row("SELECT MAX(generated_at) FROM summaries", [], |row| row.get(0))
}

/// Columns the results view can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterColumn {
    Level,
    Entity,
    PeriodDays,
    Strategy,
}

impl FilterColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterColumn::Level => "level",
            FilterColumn::Entity => "entity",
            FilterColumn::PeriodDays => "period_days",
            FilterColumn::Strategy => "strategy",
        }
    }
}

/// Distinct values of a column in first-stored order.
pub fn distinct_values(conn: &Connection, column: FilterColumn) -> Result<Vec<String>, rusqlite::Error> {
    let col = column.as_sql();
    let mut stmt = conn.prepare(&format!(
        "SELECT CAST({col} AS TEXT) FROM summaries GROUP BY {col} ORDER BY MIN(id)"
    ))?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn unset_config(conn: &Connection, key: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute("DELETE FROM app_config WHERE key = ?1", params![key])?;
    Ok(n > 0)
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::scope::Scope;
    use crate::storage::Database;
    use crate::summary::{GeneratedSummary, Strategy, SummaryRequest};

    fn result(scope: Scope, period: u32, strategy: Strategy, tokens: u64) -> SummaryResult {
        let summary = GeneratedSummary {
            text: format!("{} summary", scope.entity()),
            tokens,
            elapsed_secs: tokens as f64 / 10.0,
            calls: 1,
            failed_calls: 0,
        };
        SummaryResult::new(&SummaryRequest::new(scope, period, strategy), &summary)
    }

    #[tokio::test]
    async fn test_insert_and_list_summaries() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let first = insert_summary(conn, &result(Scope::User("alice".into()), 3, Strategy::Direct, 40))?;
                let second = insert_summary(conn, &result(Scope::All, 15, Strategy::WeeklyChained, 90))?;
                assert!(second > first);

                let rows = list_summaries(conn)?;
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].level, "user");
                assert_eq!(rows[0].entity, "alice");
                assert_eq!(rows[0].period_days, 3);
                assert_eq!(rows[0].strategy, "direct");
                assert_eq!(rows[0].tokens, 40);
                assert_eq!(rows[1].entity, "All Teams");
                assert_eq!(rows[1].strategy, "weekly_chained");
                assert!((rows[1].time_taken - 9.0).abs() < 1e-9);

                assert_eq!(count_summaries(conn)?, 2);
                assert!(last_generated_at(conn)?.is_some());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reruns_append_duplicates() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                let r = result(Scope::Team("Team A".into()), 5, Strategy::DailyChained, 10);
                insert_summary(conn, &r)?;
                insert_summary(conn, &r)?;
                assert_eq!(count_summaries(conn)?, 2);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_values() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                insert_summary(conn, &result(Scope::User("bob".into()), 7, Strategy::Direct, 1))?;
                insert_summary(conn, &result(Scope::User("alice".into()), 3, Strategy::Direct, 1))?;
                insert_summary(conn, &result(Scope::User("bob".into()), 3, Strategy::DailyChained, 1))?;

                assert_eq!(distinct_values(conn, FilterColumn::Entity)?, vec!["bob", "alice"]);
                assert_eq!(distinct_values(conn, FilterColumn::PeriodDays)?, vec!["7", "3"]);
                assert_eq!(
                    distinct_values(conn, FilterColumn::Strategy)?,
                    vec!["direct", "daily_chained"]
                );
                assert_eq!(distinct_values(conn, FilterColumn::Level)?, vec!["user"]);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_table() {
        let db = Database::open_memory().await.unwrap();

        db.reader()
            .call(|conn| {
                assert_eq!(count_summaries(conn)?, 0);
                assert_eq!(last_generated_at(conn)?, None);
                assert!(list_summaries(conn)?.is_empty());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                assert_eq!(get_config(conn, "llm_model")?, None);
                set_config(conn, "llm_model", "gpt-4o-mini")?;
                set_config(conn, "periods", "1,3,5")?;
                assert_eq!(get_config(conn, "llm_model")?, Some("gpt-4o-mini".to_string()));

                set_config(conn, "llm_model", "gpt-4o")?;
                assert_eq!(get_config(conn, "llm_model")?, Some("gpt-4o".to_string()));

                let all = list_config(conn)?;
                assert_eq!(all.len(), 2);
                assert_eq!(all[0].0, "llm_model");

                assert!(unset_config(conn, "periods")?);
                assert!(!unset_config(conn, "periods")?);
                assert_eq!(list_config(conn)?.len(), 1);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
