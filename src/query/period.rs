use chrono::{Duration, NaiveDateTime};

use crate::error::{Error, Result};
use crate::ingest::ActivityRecord;

/// A trailing window of whole days ending at an anchor timestamp.
///
/// Both endpoints are inclusive: a 3-day window anchored at `2024-07-10 15:00`
/// covers `2024-07-08 15:00 ..= 2024-07-10 15:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingWindow {
    pub days: u32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TrailingWindow {
    pub fn new(days: u32, end: NaiveDateTime) -> Result<Self> {
        if days == 0 {
            return Err(Error::InvalidPeriod("period must be at least 1 day".into()));
        }
        // Periods reaching past the calendar's first instant cover everything.
        let start = end
            .checked_sub_signed(Duration::days(days as i64 - 1))
            .unwrap_or(NaiveDateTime::MIN);
        Ok(Self { days, start, end })
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Records inside the window, in their original order.
    pub fn select<'a>(&self, records: &'a [ActivityRecord]) -> Vec<&'a ActivityRecord> {
        records.iter().filter(|r| self.contains(r.created_at)).collect()
    }
}

/// Select the records of the trailing `days`-day window anchored at the
/// latest timestamp in `records`.
///
/// Returns `None` when nothing falls inside the window (including when
/// `records` is empty), so callers can short-circuit without a model call.
pub fn select_period(
    records: &[ActivityRecord],
    days: u32,
) -> Result<Option<(TrailingWindow, Vec<&ActivityRecord>)>> {
    let Some(end) = records.iter().map(|r| r.created_at).max() else {
        return Ok(None);
    };
    let window = TrailingWindow::new(days, end)?;
    let selected = window.select(records);
    if selected.is_empty() {
        Ok(None)
    } else {
        Ok(Some((window, selected)))
    }
}
