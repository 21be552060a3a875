use crate::error::{Error, Result};
use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::storage::{repository, Database};

pub const KEY_MODEL: &str = "llm_model";
pub const KEY_BASE_URL: &str = "llm_base_url";
pub const KEY_PERIODS: &str = "periods";
pub const KEY_MAX_USERS: &str = "max_users";
pub const KEY_TEAM_SEED: &str = "team_seed";

/// Keys accepted by `config set`.
pub const KNOWN_KEYS: [&str; 5] = [KEY_MODEL, KEY_BASE_URL, KEY_PERIODS, KEY_MAX_USERS, KEY_TEAM_SEED];

pub const DEFAULT_PERIODS: [u32; 6] = [1, 3, 5, 7, 15, 30];
pub const DEFAULT_MAX_USERS: usize = 6;

/// Runtime settings, resolved from `app_config` over built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub base_url: String,
    pub periods: Vec<u32>,
    pub max_users: usize,
    pub team_seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            periods: DEFAULT_PERIODS.to_vec(),
            max_users: DEFAULT_MAX_USERS,
            team_seed: None,
        }
    }
}

impl Settings {
    /// Read every stored key and overlay it on the defaults.
    pub async fn load(db: &Database) -> Result<Self> {
        let pairs = db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?;
        Self::from_pairs(&pairs)
    }

    /// Unknown keys are ignored; known keys with bad values are errors.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self> {
        let mut settings = Settings::default();
        for (key, value) in pairs {
            match key.as_str() {
                KEY_MODEL => settings.model = value.clone(),
                KEY_BASE_URL => settings.base_url = value.clone(),
                KEY_PERIODS => settings.periods = parse_periods(value)?,
                KEY_MAX_USERS => settings.max_users = parse_number(key, value)?,
                KEY_TEAM_SEED => settings.team_seed = Some(parse_number(key, value)?),
                other => log::debug!("Ignoring unknown config key {other}"),
            }
        }
        Ok(settings)
    }
}

/// Parse a comma-separated list of positive day counts, e.g. `1,3,7`.
pub fn parse_periods(value: &str) -> Result<Vec<u32>> {
    let periods = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u32>() {
            Ok(0) | Err(_) => Err(Error::InvalidPeriod(s.to_string())),
            Ok(n) => Ok(n),
        })
        .collect::<Result<Vec<u32>>>()?;
    if periods.is_empty() {
        return Err(Error::InvalidPeriod(value.to_string()));
    }
    Ok(periods)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}

/// Reject unknown keys and malformed values before they are stored.
pub fn validate(key: &str, value: &str) -> Result<()> {
    match key {
        KEY_MODEL | KEY_BASE_URL => {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{key} cannot be empty")));
            }
        }
        KEY_PERIODS => {
            parse_periods(value)?;
        }
        KEY_MAX_USERS => {
            parse_number::<usize>(key, value)?;
        }
        KEY_TEAM_SEED => {
            parse_number::<u64>(key, value)?;
        }
        other => {
            return Err(Error::Config(format!(
                "unknown config key '{other}' (known: {})",
                KNOWN_KEYS.join(", ")
            )))
        }
    }
    Ok(())
}
