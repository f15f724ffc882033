// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Rate-of-change tracking for cumulative counters
//!
//! Derives hourly and daily rate estimates from two observations of a
//! cumulative quantity (a validator or baker balance) separated in time. The
//! last observation per prefix is kept in a small versioned state file so a
//! process restart does not reset the baseline.
//!
//! The state table is the only process-wide mutable state in the crate. All
//! access goes through a mutex; a [`RateCycle`] holds it for a whole
//! observation cycle and persists once when dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{BackendError, BackendResult};

/// Magic bytes for state file identification
const MAGIC_BYTES: &[u8; 8] = b"HLRATE\0\0";

/// Current state file version
const STATE_VERSION: u32 = 1;

const SECS_PER_HOUR: f64 = 3600.0;

/// Last observation of one tracked counter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateState {
    pub last_value: f64,
    /// Unix milliseconds of the last observation
    pub last_timestamp_ms: i64,
    pub hourly_rate: f64,
    pub delta: f64,
}

/// Result of one observation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateObservation {
    pub hourly_rate: f64,
    pub delta: f64,
    pub daily_estimate: f64,
}

/// Prefix to state
pub type RateTable = BTreeMap<String, RateState>;

/// Leading fields shared by every state file version
#[derive(Debug, Serialize, Deserialize)]
struct StateFileHeader {
    magic: [u8; 8],
    version: u32,
}

/// Encoded size of [`StateFileHeader`]
const HEADER_LEN: usize = 12;

/// On-disk layout of the current version
#[derive(Debug, Serialize, Deserialize)]
struct StateFileRecord {
    magic: [u8; 8],
    version: u32,
    entries: RateTable,
}

/// What was found when reading the state file
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(usize),
    Missing,
    Corrupt(String),
    Unsupported(u32),
}

/// Versioned durable storage for the rate table
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table. Anything other than a valid current-version file
    /// yields an empty table together with the reason.
    pub fn load(&self) -> (RateTable, LoadOutcome) {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (RateTable::new(), LoadOutcome::Missing)
            }
            Err(e) => return (RateTable::new(), LoadOutcome::Corrupt(e.to_string())),
        };

        let Some(head) = bytes.get(..HEADER_LEN) else {
            return (
                RateTable::new(),
                LoadOutcome::Corrupt(format!("truncated header ({} bytes)", bytes.len())),
            );
        };
        let header: StateFileHeader = match bincode::deserialize(head) {
            Ok(header) => header,
            Err(e) => return (RateTable::new(), LoadOutcome::Corrupt(e.to_string())),
        };
        if &header.magic != MAGIC_BYTES {
            return (
                RateTable::new(),
                LoadOutcome::Corrupt("magic bytes mismatch".into()),
            );
        }
        if header.version != STATE_VERSION {
            return (RateTable::new(), LoadOutcome::Unsupported(header.version));
        }

        let record: StateFileRecord = match bincode::deserialize(&bytes) {
            Ok(record) => record,
            Err(e) => return (RateTable::new(), LoadOutcome::Corrupt(e.to_string())),
        };

        let count = record.entries.len();
        (record.entries, LoadOutcome::Loaded(count))
    }

    /// Write the whole table, replacing the previous file atomically
    pub fn save(&self, table: &RateTable) -> BackendResult<()> {
        let record = StateFileRecord {
            magic: *MAGIC_BYTES,
            version: STATE_VERSION,
            entries: table.clone(),
        };
        let bytes = bincode::serialize(&record)
            .map_err(|e| BackendError::Persistence(format!("encode failed: {}", e)))?;
        self.write_atomic(&bytes)
            .map_err(|e| BackendError::Persistence(e.to_string()))
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)
    }
}

/// Rate tracker over a shared, optionally persisted, state table
#[derive(Debug)]
pub struct RateTracker {
    table: Mutex<RateTable>,
    store: Option<StateFile>,
}

impl RateTracker {
    /// Open with durable storage, reading it once
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let store = StateFile::new(path);
        let (table, outcome) = store.load();
        match &outcome {
            LoadOutcome::Loaded(n) => {
                log::debug!("Loaded {} rate baselines from {}", n, store.path().display())
            }
            LoadOutcome::Missing => log::debug!(
                "No rate state at {}, starting fresh",
                store.path().display()
            ),
            LoadOutcome::Corrupt(reason) => log::warn!(
                "Rate state at {} is unreadable ({}), starting fresh",
                store.path().display(),
                reason
            ),
            LoadOutcome::Unsupported(version) => log::warn!(
                "Rate state at {} has unsupported version {}, starting fresh",
                store.path().display(),
                version
            ),
        }
        Self {
            table: Mutex::new(table),
            store: Some(store),
        }
    }

    /// Tracker without durable storage
    pub fn in_memory() -> Self {
        Self {
            table: Mutex::new(RateTable::new()),
            store: None,
        }
    }

    /// Begin an observation cycle holding the state lock
    pub fn cycle(&self) -> RateCycle<'_> {
        let table = self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        RateCycle {
            table,
            store: self.store.as_ref(),
            dirty: false,
        }
    }

    /// Observe one counter and persist
    pub fn observe(&self, prefix: &str, current_value: f64, now: DateTime<Utc>) -> RateObservation {
        let mut cycle = self.cycle();
        cycle.observe(prefix, current_value, now)
    }

    /// Copy of the stored state for a prefix
    pub fn state(&self, prefix: &str) -> Option<RateState> {
        self.cycle().table.get(prefix).copied()
    }
}

/// Exclusive access to the rate table for one observation cycle.
///
/// Persists the table on drop if anything was observed. A persistence failure
/// is logged; the in-memory table stays authoritative.
pub struct RateCycle<'a> {
    table: MutexGuard<'a, RateTable>,
    store: Option<&'a StateFile>,
    dirty: bool,
}

impl RateCycle<'_> {
    pub fn observe(&mut self, prefix: &str, current_value: f64, now: DateTime<Utc>) -> RateObservation {
        self.dirty = true;
        let now_ms = now.timestamp_millis();

        let Some(prev) = self.table.get(prefix).copied() else {
            self.table.insert(
                prefix.to_string(),
                RateState {
                    last_value: current_value,
                    last_timestamp_ms: now_ms,
                    hourly_rate: 0.0,
                    delta: 0.0,
                },
            );
            return RateObservation::default();
        };

        let delta = current_value - prev.last_value;
        let elapsed_secs = (now_ms - prev.last_timestamp_ms) as f64 / 1000.0;
        let hourly_rate = if elapsed_secs > 0.0 {
            delta / (elapsed_secs / SECS_PER_HOUR)
        } else {
            0.0
        };

        self.table.insert(
            prefix.to_string(),
            RateState {
                last_value: current_value,
                last_timestamp_ms: now_ms,
                hourly_rate,
                delta,
            },
        );

        RateObservation {
            hourly_rate,
            delta,
            daily_estimate: hourly_rate * 24.0,
        }
    }

    fn persist(&self) {
        let Some(store) = self.store else { return };
        if let Err(e) = store.save(&self.table) {
            log::warn!(
                "Could not save rate state to {}: {}",
                store.path().display(),
                e
            );
        }
    }
}

impl Drop for RateCycle<'_> {
    fn drop(&mut self) {
        if self.dirty {
            self.persist();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn temp_state_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hlmon-rate-{}-{}.state", name, std::process::id()))
    }

    #[test]
    fn test_first_observation_is_baseline() {
        let tracker = RateTracker::in_memory();
        let obs = tracker.observe("x", 100.0, t0());
        assert_eq!(obs, RateObservation::default());
        let state = tracker.state("x").unwrap();
        assert_eq!(state.last_value, 100.0);
        assert_eq!(state.hourly_rate, 0.0);
    }

    #[test]
    fn test_hourly_rate() {
        let tracker = RateTracker::in_memory();
        tracker.observe("x", 100.0, t0());
        let obs = tracker.observe("x", 200.0, t0() + Duration::seconds(3600));
        assert_eq!(obs.hourly_rate, 100.0);
        assert_eq!(obs.delta, 100.0);
        assert_eq!(obs.daily_estimate, 2400.0);
    }

    #[test]
    fn test_zero_elapsed_time() {
        let tracker = RateTracker::in_memory();
        tracker.observe("x", 100.0, t0());
        let obs = tracker.observe("x", 150.0, t0());
        assert_eq!(obs.hourly_rate, 0.0);
        assert_eq!(obs.delta, 50.0);
        assert_eq!(obs.daily_estimate, 0.0);
    }

    #[test]
    fn test_clock_going_backwards_reports_zero_rate() {
        let tracker = RateTracker::in_memory();
        tracker.observe("x", 100.0, t0());
        let obs = tracker.observe("x", 160.0, t0() - Duration::seconds(60));
        assert_eq!(obs.hourly_rate, 0.0);
    }

    #[test]
    fn test_half_hour_extrapolation() {
        let tracker = RateTracker::in_memory();
        tracker.observe("tezos", 1_000_000.0, t0());
        let obs = tracker.observe("tezos", 1_000_050.0, t0() + Duration::minutes(30));
        assert_eq!(obs.hourly_rate, 100.0);
    }

    #[test]
    fn test_prefixes_are_independent() {
        let tracker = RateTracker::in_memory();
        {
            let mut cycle = tracker.cycle();
            cycle.observe("eth", 3000.0, t0());
            cycle.observe("tezos", 10.0, t0());
        }
        let eth = tracker.observe("eth", 3600.0, t0() + Duration::hours(1));
        assert_eq!(eth.hourly_rate, 600.0);
        assert_eq!(eth.daily_estimate, 14400.0);
        assert_eq!(tracker.state("tezos").unwrap().last_value, 10.0);
    }

    #[test]
    fn test_persistence_survives_restart() {
        let path = temp_state_path("restart");
        let _ = fs::remove_file(&path);
        {
            let tracker = RateTracker::open(&path);
            tracker.observe("eth", 3000.0, t0());
        }
        let tracker = RateTracker::open(&path);
        let obs = tracker.observe("eth", 3600.0, t0() + Duration::hours(1));
        assert_eq!(obs.hourly_rate, 600.0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let path = temp_state_path("corrupt");
        fs::write(&path, b"definitely not a state file").unwrap();
        let (table, outcome) = StateFile::new(&path).load();
        assert!(table.is_empty());
        assert!(matches!(outcome, LoadOutcome::Corrupt(_)));

        let tracker = RateTracker::open(&path);
        assert_eq!(tracker.observe("eth", 1.0, t0()), RateObservation::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unsupported_version() {
        let path = temp_state_path("version");
        let record = StateFileRecord {
            magic: *MAGIC_BYTES,
            version: STATE_VERSION + 1,
            entries: RateTable::new(),
        };
        fs::write(&path, bincode::serialize(&record).unwrap()).unwrap();
        let (_, outcome) = StateFile::new(&path).load();
        assert_eq!(outcome, LoadOutcome::Unsupported(STATE_VERSION + 1));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_newer_layout_is_unsupported_not_corrupt() {
        #[derive(Serialize)]
        struct WiderState {
            last_value: f64,
            last_timestamp_ms: i64,
            hourly_rate: f64,
            delta: f64,
            daily: f64,
        }
        #[derive(Serialize)]
        struct NextRecord {
            magic: [u8; 8],
            version: u32,
            entries: BTreeMap<String, WiderState>,
        }

        let wide = |v: f64| WiderState {
            last_value: v,
            last_timestamp_ms: 1_700_000_000_000,
            hourly_rate: 1.0,
            delta: 2.0,
            daily: 24.0,
        };
        let record = NextRecord {
            magic: *MAGIC_BYTES,
            version: 2,
            entries: [("eth".to_string(), wide(3000.0)), ("tezos".to_string(), wide(10.0))]
                .into_iter()
                .collect(),
        };
        let path = temp_state_path("v2");
        fs::write(&path, bincode::serialize(&record).unwrap()).unwrap();
        let (table, outcome) = StateFile::new(&path).load();
        assert!(table.is_empty());
        assert_eq!(outcome, LoadOutcome::Unsupported(2));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        let path = temp_state_path("short");
        fs::write(&path, &MAGIC_BYTES[..]).unwrap();
        let (_, outcome) = StateFile::new(&path).load();
        assert!(matches!(outcome, LoadOutcome::Corrupt(_)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_failure_is_persistence_error() {
        let dir = std::env::temp_dir().join(format!("hlmon-rate-save-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let err = StateFile::new(&dir).save(&RateTable::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Persistence);
        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_file(dir.with_extension("tmp"));
    }

    #[test]
    fn test_missing_file() {
        let (table, outcome) = StateFile::new(temp_state_path("missing-never-written")).load();
        assert!(table.is_empty());
        assert_eq!(outcome, LoadOutcome::Missing);
    }

    #[test]
    fn test_persistence_failure_is_not_fatal() {
        // A directory cannot be replaced by a file rename
        let dir = std::env::temp_dir().join(format!("hlmon-rate-dir-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let tracker = RateTracker::open(&dir);
        tracker.observe("eth", 100.0, t0());
        let obs = tracker.observe("eth", 200.0, t0() + Duration::hours(1));
        assert_eq!(obs.hourly_rate, 100.0);
        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_file(dir.with_extension("tmp"));
    }
}
