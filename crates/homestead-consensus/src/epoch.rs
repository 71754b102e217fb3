// crates/homestead-consensus/src/epoch.rs
//
// Epoch window math.
//
// An epoch is a fixed-length wall-clock window (default 4 hours) aligned to
// 00:00 UTC. The epoch a validator scores is the most recently *completed*
// window, identified by its start time formatted as `YYYY-MM-DDTHH-MM-SSZ`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use homestead_core::HomesteadError;

/// Format of epoch identifiers.
pub const EPOCH_ID_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

/// Maps wall-clock time onto epoch windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    /// Length of one epoch in seconds. Must divide 24 hours evenly for
    /// windows to stay aligned to midnight.
    epoch_length_secs: i64,
}

impl Default for EpochClock {
    fn default() -> Self {
        Self::from_hours(4)
    }
}

impl EpochClock {
    pub fn from_hours(hours: u32) -> Self {
        Self {
            epoch_length_secs: i64::from(hours.max(1)) * 3600,
        }
    }

    pub fn epoch_length(&self) -> Duration {
        Duration::seconds(self.epoch_length_secs)
    }

    /// Start of the window containing `at`.
    pub fn window_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let ts = at.timestamp();
        let start = ts - ts.rem_euclid(self.epoch_length_secs);
        Utc.timestamp_opt(start, 0).single().unwrap_or(at)
    }

    /// Start of the most recently completed window at `now`.
    pub fn last_completed_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window_start(now) - self.epoch_length()
    }

    /// Identifier of the most recently completed epoch.
    pub fn epoch_id_for(&self, now: DateTime<Utc>) -> String {
        format_epoch_id(self.last_completed_start(now))
    }

    /// `[start, end)` of the window named by `epoch_id`.
    pub fn bounds(&self, epoch_id: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), HomesteadError> {
        let start = parse_epoch_id(epoch_id)?;
        Ok((start, start + self.epoch_length()))
    }
}

pub fn format_epoch_id(start: DateTime<Utc>) -> String {
    start.format(EPOCH_ID_FORMAT).to_string()
}

pub fn parse_epoch_id(epoch_id: &str) -> Result<DateTime<Utc>, HomesteadError> {
    chrono::NaiveDateTime::parse_from_str(epoch_id, EPOCH_ID_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| HomesteadError::InvalidInput(format!("Bad epoch id '{}': {}", epoch_id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_epoch_id_is_last_completed_window() {
        let clock = EpochClock::default();
        assert_eq!(clock.epoch_id_for(at(10, 30)), "2024-05-01T04-00-00Z");
        assert_eq!(clock.epoch_id_for(at(8, 0)), "2024-05-01T04-00-00Z");
        assert_eq!(clock.epoch_id_for(at(7, 59)), "2024-05-01T00-00-00Z");
    }

    #[test]
    fn test_epoch_id_crosses_midnight() {
        let clock = EpochClock::default();
        assert_eq!(clock.epoch_id_for(at(1, 0)), "2024-04-30T20-00-00Z");
    }

    #[test]
    fn test_bounds_round_trip() {
        let clock = EpochClock::default();
        let (start, end) = clock.bounds("2024-05-01T04-00-00Z").unwrap();
        assert_eq!(start, at(4, 0));
        assert_eq!(end, at(8, 0));
        assert!(clock.bounds("yesterday").is_err());
    }
}
