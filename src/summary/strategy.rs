use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a summary is assembled from the records of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One call over every record in the window.
    Direct,
    /// One call per calendar day, then one call over the daily summaries.
    DailyChained,
    /// One call per ISO week, then one call over the weekly summaries.
    WeeklyChained,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::Direct,
        Strategy::DailyChained,
        Strategy::WeeklyChained,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::DailyChained => "daily_chained",
            Strategy::WeeklyChained => "weekly_chained",
        }
    }

    /// Whether the strategy means anything for a window of `period_days`.
    /// Chaining a single group is just `Direct` with an extra call.
    pub fn applies_to(&self, period_days: u32) -> bool {
        match self {
            Strategy::Direct => true,
            Strategy::DailyChained => period_days > 1,
            Strategy::WeeklyChained => period_days > 7,
        }
    }

    /// The strategy actually executed for `period_days`.
    pub fn effective_for(&self, period_days: u32) -> Strategy {
        if self.applies_to(period_days) {
            *self
        } else {
            Strategy::Direct
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "direct" => Ok(Strategy::Direct),
            "daily_chained" | "daily" => Ok(Strategy::DailyChained),
            "weekly_chained" | "weekly" => Ok(Strategy::WeeklyChained),
            other => Err(Error::InvalidStrategy(format!(
                "{other} (expected direct, daily_chained, or weekly_chained)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_to() {
        assert!(Strategy::Direct.applies_to(1));
        assert!(!Strategy::DailyChained.applies_to(1));
        assert!(Strategy::DailyChained.applies_to(2));
        assert!(!Strategy::WeeklyChained.applies_to(7));
        assert!(Strategy::WeeklyChained.applies_to(8));
    }

    #[test]
    fn test_effective_for() {
        assert_eq!(Strategy::DailyChained.effective_for(1), Strategy::Direct);
        assert_eq!(Strategy::WeeklyChained.effective_for(5), Strategy::Direct);
        assert_eq!(Strategy::WeeklyChained.effective_for(15), Strategy::WeeklyChained);
    }

    #[test]
    fn test_parse_and_display() {
        for s in Strategy::ALL {
            assert_eq!(s.as_str().parse::<Strategy>().unwrap(), s);
        }
        assert_eq!("daily-chained".parse::<Strategy>().unwrap(), Strategy::DailyChained);
        assert_eq!("Weekly".parse::<Strategy>().unwrap(), Strategy::WeeklyChained);
        assert!("monthly".parse::<Strategy>().is_err());
        assert_eq!(Strategy::WeeklyChained.to_string(), "weekly_chained");
    }
}
