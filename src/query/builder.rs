use crate::error::{Error, Result};
use crate::query::scope::Level;
use crate::storage::repository::{summary_from_row, SummaryRow, SUMMARY_COLUMNS};
use crate::storage::Database;
use crate::summary::Strategy;

/// Fields the results view can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Id,
    Tokens,
    TimeTaken,
    GeneratedAt,
}

impl OrderBy {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderBy::Id => "id",
            OrderBy::Tokens => "tokens",
            OrderBy::TimeTaken => "time_taken",
            OrderBy::GeneratedAt => "generated_at",
        }
    }
}

impl std::str::FromStr for OrderBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(OrderBy::Id),
            "tokens" => Ok(OrderBy::Tokens),
            "time" | "time_taken" => Ok(OrderBy::TimeTaken),
            "generated_at" => Ok(OrderBy::GeneratedAt),
            other => Err(Error::Other(format!("cannot order by '{other}'"))),
        }
    }
}

/// Builder for querying stored summaries.
///
/// Each filter accepts any number of values; an empty filter matches every
/// row, several values match any of them.
#[derive(Debug, Clone, Default)]
pub struct ResultsQuery {
    levels: Vec<Level>,
    entities: Vec<String>,
    periods: Vec<u32>,
    strategies: Vec<Strategy>,
    limit: Option<u32>,
    order_by: OrderBy,
    order_desc: bool,
}

impl ResultsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.levels.push(level);
        self
    }

    pub fn levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels.extend(levels);
        self
    }

    pub fn entity(mut self, entity: &str) -> Self {
        self.entities.push(entity.to_string());
        self
    }

    pub fn entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.extend(entities.into_iter().map(Into::into));
        self
    }

    pub fn period(mut self, days: u32) -> Self {
        self.periods.push(days);
        self
    }

    pub fn periods(mut self, periods: impl IntoIterator<Item = u32>) -> Self {
        self.periods.extend(periods);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategies(mut self, strategies: impl IntoIterator<Item = Strategy>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn order_by(mut self, field: OrderBy) -> Self {
        self.order_by = field;
        self
    }

    pub fn descending(mut self) -> Self {
        self.order_desc = true;
        self
    }

    /// Build and execute the query, returning stored rows.
    pub async fn rows(self, db: &Database) -> Result<Vec<SummaryRow>> {
        let builder = self;
        db.reader()
            .call(move |conn| {
                let (sql, params) = builder.build_sql();
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(param_refs.as_slice(), summary_from_row)?;
                rows.collect::<std::result::Result<Vec<SummaryRow>, _>>()
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Build and execute the query, returning a count of matching rows.
    pub async fn count(self, db: &Database) -> Result<u64> {
        let builder = self;
        db.reader()
            .call(move |conn| {
                let (inner_sql, params) = builder.build_sql();
                let sql = format!("SELECT COUNT(*) FROM ({inner_sql})");
                let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                    params.iter().map(|p| p.as_ref()).collect();
                let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
                Ok::<u64, rusqlite::Error>(count as u64)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Build and execute the query, returning results as JSON.
    pub async fn to_json(self, db: &Database) -> Result<String> {
        let rows = self.rows(db).await?;
        serde_json::to_string_pretty(&rows).map_err(|e| Error::Other(e.to_string()))
    }

    /// Build and execute the query, returning results as CSV.
    pub async fn to_csv(self, db: &Database) -> Result<String> {
        let rows = self.rows(db).await?;
        rows_to_csv(&rows)
    }

    fn build_sql(&self) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut wheres = Vec::new();

        push_in_clause(
            &mut wheres,
            &mut params,
            "level",
            self.levels.iter().map(|l| l.as_str().to_string()),
        );
        push_in_clause(&mut wheres, &mut params, "entity", self.entities.iter().cloned());
        push_in_clause(&mut wheres, &mut params, "period_days", self.periods.iter().copied());
        push_in_clause(
            &mut wheres,
            &mut params,
            "strategy",
            self.strategies.iter().map(|s| s.as_str().to_string()),
        );

        let mut sql = format!("SELECT {SUMMARY_COLUMNS} FROM summaries");
        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres.join(" AND "));
        }

        let order_dir = if self.order_desc { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {} {order_dir}", self.order_by.as_sql()));

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT ?{}", params.len() + 1));
            params.push(Box::new(limit));
        }

        (sql, params)
    }
}

fn push_in_clause<T, I>(
    wheres: &mut Vec<String>,
    params: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
    column: &str,
    values: I,
) where
    T: rusqlite::types::ToSql + 'static,
    I: Iterator<Item = T>,
{
    let mut placeholders = Vec::new();
    for value in values {
        params.push(Box::new(value));
        placeholders.push(format!("?{}", params.len()));
    }
    if !placeholders.is_empty() {
        wheres.push(format!("{column} IN ({})", placeholders.join(", ")));
    }
}

/// Serialize rows with a header line, quoting as needed.
pub fn rows_to_csv(rows: &[SummaryRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(SUMMARY_COLUMNS.split(", "))?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::scope::Scope;
    use crate::storage::repository;
    use crate::summary::{GeneratedSummary, SummaryRequest, SummaryResult};

    #[test]
    fn test_build_sql_default() {
        let (sql, params) = ResultsQuery::new().build_sql();
        assert!(sql.contains("FROM summaries"));
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains("ORDER BY id ASC"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_build_sql_with_filters() {
        let (sql, params) = ResultsQuery::new()
            .level(Level::User)
            .entities(["alice", "bob"])
            .strategy(Strategy::DailyChained)
            .limit(10)
            .order_by(OrderBy::Tokens)
            .descending()
            .build_sql();
        assert!(sql.contains("level IN (?1)"));
        assert!(sql.contains("entity IN (?2, ?3)"));
        assert!(sql.contains("strategy IN (?4)"));
        assert!(sql.contains("ORDER BY tokens DESC"));
        assert!(sql.contains("LIMIT ?5"));
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn test_order_by_from_str() {
        assert_eq!("time".parse::<OrderBy>().unwrap(), OrderBy::TimeTaken);
        assert!("name".parse::<OrderBy>().is_err());
    }

    async fn seeded() -> Database {
        let db = Database::open_memory().await.unwrap();
        let rows = vec![
            (Scope::User("alice".into()), 3, Strategy::Direct, 30),
            (Scope::User("alice".into()), 3, Strategy::DailyChained, 70),
            (Scope::User("bob".into()), 7, Strategy::Direct, 20),
            (Scope::Team("Team A".into()), 15, Strategy::WeeklyChained, 90),
            (Scope::All, 15, Strategy::Direct, 50),
        ];
        db.writer()
            .call(move |conn| {
                for (scope, period, strategy, tokens) in rows {
                    let summary = GeneratedSummary {
                        text: format!("{}, {period} days", scope.entity()),
                        tokens,
                        elapsed_secs: 1.5,
                        calls: 1,
                        failed_calls: 0,
                    };
                    let result =
                        SummaryResult::new(&SummaryRequest::new(scope, period, strategy), &summary);
                    repository::insert_summary(conn, &result)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_rows_unfiltered() {
        let db = seeded().await;
        let rows = ResultsQuery::new().rows(&db).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].entity, "alice");
        assert_eq!(rows[4].entity, "All Teams");
    }

    #[tokio::test]
    async fn test_rows_multi_value_filters() {
        let db = seeded().await;

        let rows = ResultsQuery::new()
            .levels([Level::User, Level::Team])
            .periods([3, 15])
            .rows(&db)
            .await
            .unwrap();
        let entities: Vec<&str> = rows.iter().map(|r| r.entity.as_str()).collect();
        assert_eq!(entities, vec!["alice", "alice", "Team A"]);

        let n = ResultsQuery::new()
            .strategy(Strategy::Direct)
            .count(&db)
            .await
            .unwrap();
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn test_order_and_limit() {
        let db = seeded().await;
        let rows = ResultsQuery::new()
            .order_by(OrderBy::Tokens)
            .descending()
            .limit(2)
            .rows(&db)
            .await
            .unwrap();
        let tokens: Vec<i64> = rows.iter().map(|r| r.tokens).collect();
        assert_eq!(tokens, vec![90, 70]);
    }

    #[tokio::test]
    async fn test_to_csv_quotes_text() {
        let db = seeded().await;
        let csv = ResultsQuery::new()
            .entity("bob")
            .to_csv(&db)
            .await
            .unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,level,entity,period_days,strategy,summary_text,tokens,time_taken,generated_at")
        );
        let line = lines.next().unwrap();
        assert!(line.contains(",user,bob,7,direct,\"bob, 7 days\",20,1.5,"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_to_csv_empty_has_header() {
        let db = seeded().await;
        let csv = ResultsQuery::new().entity("nobody").to_csv(&db).await.unwrap();
        assert_eq!(
            csv.trim_end(),
            "id,level,entity,period_days,strategy,summary_text,tokens,time_taken,generated_at"
        );
    }

    #[tokio::test]
    async fn test_to_json() {
        let db = seeded().await;
        let json = ResultsQuery::new()
            .level(Level::All)
            .to_json(&db)
            .await
            .unwrap();
        let parsed: Vec<SummaryRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].entity, "All Teams");
        assert_eq!(parsed[0].period_days, 15);
    }
}
