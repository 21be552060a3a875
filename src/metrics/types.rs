use serde::Serialize;

/// Summary statistics over a set of observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    /// Sample standard deviation; undefined for fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Token and latency usage for one (level, strategy, period) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub level: String,
    pub strategy: String,
    pub period_days: i64,
    pub count: u64,
    pub tokens_mean: f64,
    pub tokens_sum: f64,
    pub time_mean: f64,
    pub time_sum: f64,
}

/// Token and latency distributions for one (level, strategy) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStats {
    pub level: String,
    pub strategy: String,
    pub tokens: Distribution,
    pub time: Distribution,
}

/// Mean tokens and time for one key (a strategy name or a period length).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Average {
    pub key: String,
    pub count: u64,
    pub tokens: f64,
    pub time: f64,
}
