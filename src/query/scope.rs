use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ingest::ActivityRecord;

/// Entity name stored for the aggregate scope.
pub const ALL_TEAMS: &str = "All Teams";

/// The granularity a summary is produced at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    User,
    Team,
    All,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::User => "user",
            Level::Team => "team",
            Level::All => "all",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Level::User),
            "team" => Ok(Level::Team),
            "all" => Ok(Level::All),
            other => Err(Error::InvalidLevel(format!(
                "{other} (expected user, team, or all)"
            ))),
        }
    }
}

/// Which slice of the activity log a summary covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    User(String),
    Team(String),
    All,
}

impl Scope {
    /// Build a scope from a level and an entity name. The entity is ignored
    /// for the aggregate level.
    pub fn from_parts(level: Level, entity: Option<&str>) -> Result<Self> {
        match (level, entity) {
            (Level::All, _) => Ok(Scope::All),
            (Level::User, Some(e)) if !e.is_empty() => Ok(Scope::User(e.to_string())),
            (Level::Team, Some(e)) if !e.is_empty() => Ok(Scope::Team(e.to_string())),
            (level, _) => Err(Error::Config(format!("an entity is required for level {level}"))),
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Scope::User(_) => Level::User,
            Scope::Team(_) => Level::Team,
            Scope::All => Level::All,
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            Scope::User(name) | Scope::Team(name) => name,
            Scope::All => ALL_TEAMS,
        }
    }

    pub fn matches(&self, record: &ActivityRecord) -> bool {
        match self {
            Scope::User(name) => record.respondent == *name,
            Scope::Team(name) => record.team == *name,
            Scope::All => true,
        }
    }

    /// Keep only the records this scope covers, preserving order.
    pub fn filter<'a>(&self, records: &[&'a ActivityRecord]) -> Vec<&'a ActivityRecord> {
        records.iter().copied().filter(|r| self.matches(r)).collect()
    }

    /// Instruction prefix; callers append what is being summarized.
    pub fn prompt_prefix(&self) -> String {
        match self {
            Scope::User(name) | Scope::Team(name) => format!("Summarize {name}'s "),
            Scope::All => "Summarize all teams' ".to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level(), self.entity())
    }
}
