//! Aggregator engine: windowed averages over a tier's live records.
//!
//! Computes the arithmetic mean of each value field over the records of a
//! tier that are younger than the tier's aggregation window, producing the
//! derived record that a rollup worker appends to the next tier.
//!
//! The tier lock is held only for the read, not across the subsequent
//! append to the destination tier. A concurrent upstream append may land
//! either before or after the read; the average may or may not include a
//! record written in the same instant. Each tier's own lock discipline is
//! what matters, the cross-tier interleaving is accepted.

use crate::cutoff::TIER_COUNT;
use crate::error::{Result, StoreError};
use crate::record::Record;
use crate::store::TieredLogStore;

/// Computes the rolling average of `tier`'s records within its aggregation
/// window.
///
/// Both value fields are averaged independently. With zero qualifying
/// records the result has both fields set to `0.0`; this is a defined
/// outcome, not an error. The result's timestamp is always the computation
/// time, never any input record's time.
///
/// # Errors
///
/// Returns [`crate::error::StoreError`] variants if the tier index is out
/// of range or the tier log cannot be read.
pub fn compute_average(store: &TieredLogStore, tier: usize) -> Result<Record> {
    if tier >= TIER_COUNT {
        return Err(StoreError::InvalidTier {
            tier,
            max_tiers: TIER_COUNT,
        }
        .into());
    }
    let window = store.cutoffs().aggregation_window(tier);
    let records = store.read_window(tier, window)?;
    let now = chrono::Utc::now().timestamp();

    if records.is_empty() {
        return Ok(Record::new(0.0, 0.0, now));
    }

    let mut temperature_sum = 0.0f64;
    let mut feels_like_sum = 0.0f64;
    for record in &records {
        temperature_sum += f64::from(record.temperature);
        feels_like_sum += f64::from(record.feels_like);
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let count = records.len() as f64;
    #[allow(clippy::cast_possible_truncation)]
    let average = Record::new(
        (temperature_sum / count) as f32,
        (feels_like_sum / count) as f32,
        now,
    );
    Ok(average)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutoff::CutoffConfig;
    use tempfile::tempdir;

    fn record_aged(age: i64, temperature: f32, feels_like: f32) -> Record {
        let now = chrono::Utc::now().timestamp();
        Record::new(temperature, feels_like, now - age)
    }

    #[test]
    fn test_zero_count_average() {
        let dir = tempdir().unwrap();
        let store = TieredLogStore::open(dir.path(), CutoffConfig::debug()).unwrap();

        let before = chrono::Utc::now().timestamp();
        let average = compute_average(&store, 0).unwrap();
        let after = chrono::Utc::now().timestamp();

        assert_eq!(average.temperature, 0.0);
        assert_eq!(average.feels_like, 0.0);
        assert!(average.timestamp >= before && average.timestamp <= after);
    }

    #[test]
    fn test_all_expired_counts_as_zero() {
        let dir = tempdir().unwrap();
        let store = TieredLogStore::open(dir.path(), CutoffConfig::debug()).unwrap();

        // Older than tier 0's 30s aggregation window, but younger than its
        // 120s retention so it survives in the file.
        store.append(0, &record_aged(60, 10.0, 5.0)).unwrap();

        let average = compute_average(&store, 0).unwrap();
        assert_eq!(average.temperature, 0.0);
        assert_eq!(average.feels_like, 0.0);
    }

    #[test]
    fn test_average_of_window() {
        let dir = tempdir().unwrap();
        let store = TieredLogStore::open(dir.path(), CutoffConfig::debug()).unwrap();

        // Tier 0 aggregation window is 30s: the first record is excluded.
        store.append(0, &record_aged(60, 100.0, 100.0)).unwrap();
        store.append(0, &record_aged(20, 10.0, 4.0)).unwrap();
        store.append(0, &record_aged(10, 20.0, 8.0)).unwrap();

        let average = compute_average(&store, 0).unwrap();
        assert!((average.temperature - 15.0).abs() < 1e-6);
        assert!((average.feels_like - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_boundary_inclusion() {
        let dir = tempdir().unwrap();
        let store = TieredLogStore::open(dir.path(), CutoffConfig::debug()).unwrap();

        // Debug scenario: a record injected at t=0 is included in the tier 0
        // average at age 20 (< 30) and excluded at age 40 (>= 30).
        store.append(0, &record_aged(20, -2.0, -7.0)).unwrap();
        let average = compute_average(&store, 0).unwrap();
        assert!((average.temperature - -2.0).abs() < 0.005);
        assert!((average.feels_like - -7.0).abs() < 0.005);

        let dir = tempdir().unwrap();
        let store = TieredLogStore::open(dir.path(), CutoffConfig::debug()).unwrap();
        store.append(0, &record_aged(40, -2.0, -7.0)).unwrap();
        let average = compute_average(&store, 0).unwrap();
        assert_eq!(average.temperature, 0.0);
        assert_eq!(average.feels_like, 0.0);
    }

    #[test]
    fn test_invalid_tier_returns_error() {
        let dir = tempdir().unwrap();
        let store = TieredLogStore::open(dir.path(), CutoffConfig::debug()).unwrap();

        let result = compute_average(&store, TIER_COUNT);
        assert!(matches!(
            result,
            Err(crate::error::ThermologError::Store(
                StoreError::InvalidTier {
                    tier: TIER_COUNT,
                    max_tiers: TIER_COUNT,
                }
            ))
        ));
    }

    #[test]
    fn test_average_timestamp_is_now_not_inputs() {
        let dir = tempdir().unwrap();
        let store = TieredLogStore::open(dir.path(), CutoffConfig::debug()).unwrap();

        store.append(0, &record_aged(25, 1.0, 1.0)).unwrap();

        let before = chrono::Utc::now().timestamp();
        let average = compute_average(&store, 0).unwrap();
        assert!(average.timestamp >= before - 1);
    }
}
