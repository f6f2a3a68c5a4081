//! Tiered log store: three file-backed append logs with per-tier locking.
//!
//! Each tier owns one plain-text log file and one exclusive lock that
//! serializes every read and write on that file. Different tiers never share
//! a lock, so an append on tier 0 never blocks a read on tier 1, and no
//! operation ever holds two tier locks at once.
//!
//! # File layout
//!
//! ```text
//! log_dir/
//! ├── first.log      <- tier 0, raw measurements
//! ├── second.log     <- tier 1, first-level averages
//! └── third.log      <- tier 2, second-level averages
//! ```
//!
//! # Append-order invariant
//!
//! Every writer appends records in non-decreasing timestamp order (each
//! tier's input is itself append-ordered), so expired records always form a
//! contiguous prefix of the file. Trimming therefore scans from the start
//! and stops at the first live record instead of filtering the whole file.
//! If the pipeline is ever broadened to multiple producers with out-of-order
//! writes, this prefix-stop must become a full scan-and-filter.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tracing::warn;

use crate::cutoff::{CutoffConfig, TIER_COUNT};
use crate::error::{Result, StoreError};
use crate::record::Record;

/// Log file name per tier, relative to the log directory.
pub const LOG_NAMES: [&str; TIER_COUNT] = ["first.log", "second.log", "third.log"];

/// File-backed store for the three cascaded tier logs.
///
/// The store owns one exclusive lock per tier; the locks are not reachable
/// from outside, so cross-tier lock acquisition cannot be expressed through
/// this API.
#[derive(Debug)]
pub struct TieredLogStore {
    /// Cutoff configuration shared by all tiers.
    cutoffs: CutoffConfig,
    /// Per-tier log files, each behind its own lock.
    tiers: [Mutex<TierLog>; TIER_COUNT],
}

/// State guarded by a tier's lock.
#[derive(Debug)]
struct TierLog {
    /// Path of this tier's log file.
    path: PathBuf,
}

impl TieredLogStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// Log files themselves are created lazily by the first append; a
    /// missing file reads as an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DirectoryAccess`] if the directory cannot be
    /// created or accessed.
    pub fn open<P: AsRef<Path>>(dir: P, cutoffs: CutoffConfig) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StoreError::DirectoryAccess {
            path: dir.display().to_string(),
            source: e,
        })?;

        let tiers = LOG_NAMES.map(|name| {
            Mutex::new(TierLog {
                path: dir.join(name),
            })
        });

        Ok(Self { cutoffs, tiers })
    }

    /// The cutoff configuration this store was opened with.
    pub fn cutoffs(&self) -> &CutoffConfig {
        &self.cutoffs
    }

    /// Appends `record` to the given tier, trimming the expired prefix.
    ///
    /// Under the tier's lock: reads all existing lines, drops the leading
    /// run of records older than the tier's retention window, and rewrites
    /// the file as the live suffix plus the new record. Records with a
    /// future timestamp count as live. The whole read-modify-write happens
    /// under the lock, so readers never observe a half-written file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTier`] for an out-of-range tier and
    /// [`StoreError`] I/O variants if the file cannot be read or rewritten.
    /// Malformed lines are skipped with a warning, not propagated.
    pub fn append(&self, tier: usize, record: &Record) -> Result<()> {
        let log = self.lock_tier(tier)?;
        let now = chrono::Utc::now().timestamp();

        let entries = read_entries(&log, tier)?;
        #[allow(clippy::cast_possible_wrap)] // retention windows are far below i64::MAX seconds
        let retention = self.cutoffs.retention_window(tier).as_secs() as i64;

        // Expired records form a contiguous prefix (append-order invariant),
        // so stop at the first live record.
        let live_from = entries
            .iter()
            .position(|(_, r)| r.age(now) < retention)
            .unwrap_or(entries.len());

        let mut contents = String::new();
        for (line, _) in &entries[live_from..] {
            contents.push_str(line);
            contents.push('\n');
        }
        contents.push_str(&record.to_line());
        contents.push('\n');

        fs::write(&log.path, contents).map_err(|e| StoreError::Rewrite {
            path: log.path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Reads the records of `tier` younger than `window`.
    ///
    /// Used by the aggregator engine; the lock is held only for the read.
    pub(crate) fn read_window(&self, tier: usize, window: Duration) -> Result<Vec<Record>> {
        let log = self.lock_tier(tier)?;
        let now = chrono::Utc::now().timestamp();
        #[allow(clippy::cast_possible_wrap)] // windows are far below i64::MAX seconds
        let window = window.as_secs() as i64;

        let records = read_entries(&log, tier)?
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| record.age(now) < window)
            .collect();

        Ok(records)
    }

    /// Acquires the lock for `tier`, validating the index first.
    fn lock_tier(&self, tier: usize) -> Result<std::sync::MutexGuard<'_, TierLog>> {
        let mutex = self.tiers.get(tier).ok_or(StoreError::InvalidTier {
            tier,
            max_tiers: TIER_COUNT,
        })?;

        // A poisoned lock means another worker panicked between the read and
        // the rewrite; the file on disk is still whole-line consistent, so
        // recover the guard and continue.
        let guard = match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(guard)
    }
}

/// Reads and decodes all lines of a tier log.
///
/// Returns `(line, record)` pairs so surviving lines can be rewritten
/// byte-identically. A missing file reads as an empty log; malformed lines
/// are skipped with a warning and dropped by the next rewrite.
fn read_entries(log: &TierLog, tier: usize) -> Result<Vec<(String, Record)>> {
    let contents = match fs::read_to_string(&log.path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StoreError::Read {
                path: log.path.display().to_string(),
                source: e,
            }
            .into());
        }
    };

    let mut entries = Vec::new();
    for line in contents.lines() {
        if line.is_empty() {
            continue;
        }
        match Record::parse(line) {
            Ok(record) => entries.push((line.to_string(), record)),
            Err(e) => warn!(tier, %e, "skipping malformed log line"),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn debug_store(dir: &Path) -> TieredLogStore {
        TieredLogStore::open(dir, CutoffConfig::debug()).unwrap()
    }

    fn record_aged(age: i64, value: f32) -> Record {
        let now = chrono::Utc::now().timestamp();
        Record::new(value, value - 5.0, now - age)
    }

    fn read_records(dir: &Path, tier: usize) -> Vec<Record> {
        let contents = fs::read_to_string(dir.join(LOG_NAMES[tier])).unwrap();
        contents.lines().map(|l| Record::parse(l).unwrap()).collect()
    }

    #[test]
    fn test_append_to_empty_log() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        store.append(0, &record_aged(0, 1.0)).unwrap();

        let records = read_records(dir.path(), 0);
        assert_eq!(records.len(), 1);
        assert!((records[0].temperature - 1.0).abs() < 0.005);
    }

    #[test]
    fn test_prefix_trimming() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        // Tier 0 retention is 120s in the debug set. Ages 200 and 150 are
        // expired, 50 and 10 are live.
        for (age, value) in [(200, 1.0), (150, 2.0), (50, 3.0), (10, 4.0)] {
            let line = record_aged(age, value).to_line();
            let path = dir.path().join(LOG_NAMES[0]);
            let mut contents = fs::read_to_string(&path).unwrap_or_default();
            contents.push_str(&line);
            contents.push('\n');
            fs::write(&path, contents).unwrap();
        }

        store.append(0, &record_aged(0, 5.0)).unwrap();

        let records = read_records(dir.path(), 0);
        let values: Vec<f32> = records.iter().map(|r| r.temperature).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0], "two oldest dropped, order preserved");
    }

    #[test]
    fn test_noop_trim_preserves_records() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        store.append(0, &record_aged(50, 1.0)).unwrap();
        store.append(0, &record_aged(10, 2.0)).unwrap();
        store.append(0, &record_aged(0, 3.0)).unwrap();

        let records = read_records(dir.path(), 0);
        let values: Vec<f32> = records.iter().map(|r| r.temperature).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_future_timestamp_is_live() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        // Negative age (clock skew): must survive every trim.
        store.append(0, &record_aged(-30, 1.0)).unwrap();
        store.append(0, &record_aged(0, 2.0)).unwrap();

        assert_eq!(read_records(dir.path(), 0).len(), 2);
    }

    #[test]
    fn test_malformed_line_skipped_on_rewrite() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        store.append(0, &record_aged(50, 1.0)).unwrap();
        let path = dir.path().join(LOG_NAMES[0]);
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("this line is corrupted\n");
        fs::write(&path, contents).unwrap();

        // The rewrite drops the corrupted line and keeps both records.
        store.append(0, &record_aged(0, 2.0)).unwrap();

        let records = read_records(dir.path(), 0);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_invalid_tier() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        assert!(store.append(TIER_COUNT, &record_aged(0, 1.0)).is_err());
    }

    #[test]
    fn test_read_window_filters_by_age() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        store.append(1, &record_aged(100, 1.0)).unwrap();
        store.append(1, &record_aged(40, 2.0)).unwrap();
        store.append(1, &record_aged(5, 3.0)).unwrap();

        let within_minute = store.read_window(1, Duration::from_secs(60)).unwrap();
        let values: Vec<f32> = within_minute.iter().map(|r| r.temperature).collect();
        assert_eq!(values, vec![2.0, 3.0]);

        let within_10s = store.read_window(1, Duration::from_secs(10)).unwrap();
        assert_eq!(within_10s.len(), 1);
    }

    #[test]
    fn test_tiers_trim_independently() {
        let dir = tempdir().unwrap();
        let store = debug_store(dir.path());

        // Age 150 is expired for tier 0 (retention 120) but live for
        // tier 1 (retention 300).
        store.append(0, &record_aged(150, 1.0)).unwrap();
        store.append(1, &record_aged(150, 1.0)).unwrap();
        store.append(0, &record_aged(0, 2.0)).unwrap();
        store.append(1, &record_aged(0, 2.0)).unwrap();

        assert_eq!(read_records(dir.path(), 0).len(), 1);
        assert_eq!(read_records(dir.path(), 1).len(), 2);
    }
}
