use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use crate::date_util::parse_timestamp;
use crate::error::{Error, Result};

pub const TEAM_A: &str = "Team A";
pub const TEAM_B: &str = "Team B";

/// One stand-up entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub respondent: String,
    pub team: String,
    pub created_at: NaiveDateTime,
    pub progress: String,
    pub plans: String,
}

impl ActivityRecord {
    /// The text sent to the model for this entry: progress, a space, then plans.
    pub fn text(&self) -> String {
        format!("{} {}", self.progress, self.plans)
    }
}

/// The full set of loaded stand-up entries, in file order.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    records: Vec<ActivityRecord>,
}

impl ActivityLog {
    pub fn new(records: Vec<ActivityRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ActivityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct respondents in order of first appearance.
    pub fn respondents(&self) -> Vec<String> {
        first_seen(self.records.iter().map(|r| r.respondent.as_str()))
    }

    /// Distinct team names, sorted.
    pub fn teams(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.team.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Respondent")]
    respondent: String,
    #[serde(rename = "Creation Date")]
    creation_date: String,
    #[serde(rename = "Previous work day progress", default)]
    progress: Option<String>,
    #[serde(rename = "Plans for today", default)]
    plans: Option<String>,
}

/// Load a stand-up export from disk and assign teams.
pub fn load_csv(path: impl AsRef<Path>, seed: Option<u64>) -> Result<ActivityLog> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
    let log = from_reader(file, seed)?;
    log::info!(
        "Loaded {} stand-up entries from {} ({} respondents)",
        log.len(),
        path.display(),
        log.respondents().len()
    );
    Ok(log)
}

/// Distinct names in order of first appearance.
fn first_seen<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Parse stand-up CSV data from any reader and assign teams.
pub fn from_reader<R: Read>(reader: R, seed: Option<u64>) -> Result<ActivityLog> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let created_at = parse_timestamp(&row.creation_date).ok_or_else(|| Error::InvalidRecord {
            row: i + 1,
            message: format!("unrecognized timestamp: {:?}", row.creation_date),
        })?;
        rows.push((row, created_at));
    }

    let respondents = first_seen(rows.iter().map(|(r, _)| r.respondent.as_str()));
    let teams = assign_teams(&respondents, seed);

    let records = rows
        .into_iter()
        .map(|(row, created_at)| {
            let team = teams
                .get(&row.respondent)
                .cloned()
                .unwrap_or_else(|| TEAM_B.to_string());
            ActivityRecord {
                respondent: row.respondent,
                team,
                created_at,
                progress: row.progress.unwrap_or_default(),
                plans: row.plans.unwrap_or_default(),
            }
        })
        .collect();

    Ok(ActivityLog::new(records))
}

/// Randomly split respondents into two teams.
///
/// The shuffled first half (rounded down) joins Team A, the rest Team B.
/// With a seed the split is reproducible across runs.
pub fn assign_teams(respondents: &[String], seed: Option<u64>) -> HashMap<String, String> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    };
    let mut shuffled = respondents.to_vec();
    shuffled.shuffle(&mut rng);

    let split = shuffled.len() / 2;
    shuffled
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let team = if i < split { TEAM_A } else { TEAM_B };
            (name, team.to_string())
        })
        .collect()
}
