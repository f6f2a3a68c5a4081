//! Cutoff configuration controlling aggregation and retention windows.
//!
//! The pipeline maintains [`TIER_COUNT`] cascaded tiers driven by a single
//! strictly ascending sequence of four duration cutoffs. Tier *i* averages
//! records younger than `CUTOFF[i]` (its aggregation window) and discards
//! records older than `CUTOFF[i + 1]` (its retention window), so each cutoff
//! serves as one tier's read window and the previous tier's write-side trim.
//!
//! The configuration is validated once at construction and immutable
//! afterwards; workers hold shared references and need no synchronization.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Number of cascaded tiers.
pub const TIER_COUNT: usize = 3;

/// Number of cutoffs: one aggregation window per tier plus the final
/// retention window of the last tier.
pub const CUTOFF_COUNT: usize = TIER_COUNT + 1;

// Seconds contained in a given unit.
const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const MONTH: u64 = 30 * DAY;
const YEAR: u64 = 365 * DAY;

/// Immutable, validated cutoff sequence shared by all workers.
///
/// # Example
///
/// ```rust
/// use thermolog::cutoff::CutoffConfig;
///
/// let cutoffs = CutoffConfig::debug();
/// assert!(cutoffs.aggregation_window(0) < cutoffs.retention_window(0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffConfig {
    /// Strictly ascending durations, serialized as seconds.
    #[serde(with = "duration_serde")]
    cutoffs: [Duration; CUTOFF_COUNT],
}

impl CutoffConfig {
    /// Creates a cutoff configuration from an explicit sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any cutoff is zero or the sequence is not
    /// strictly ascending.
    pub fn new(cutoffs: [Duration; CUTOFF_COUNT]) -> Result<Self> {
        let config = Self { cutoffs };
        config.validate()?;
        Ok(config)
    }

    /// The production cutoff set: hour / day / month / year.
    pub fn production() -> Self {
        Self {
            cutoffs: [
                Duration::from_secs(HOUR),
                Duration::from_secs(DAY),
                Duration::from_secs(MONTH),
                Duration::from_secs(YEAR),
            ],
        }
    }

    /// The debug cutoff set with short durations, so rotation and averaging
    /// become observable within minutes.
    pub fn debug() -> Self {
        Self {
            cutoffs: [
                Duration::from_secs(30),
                Duration::from_secs(120),
                Duration::from_secs(300),
                Duration::from_secs(600),
            ],
        }
    }

    /// Loads a cutoff configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// the loaded sequence fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates that the sequence is non-zero and strictly ascending.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on the first violation.
    pub fn validate(&self) -> Result<()> {
        for (index, cutoff) in self.cutoffs.iter().enumerate() {
            if cutoff.is_zero() {
                return Err(ConfigError::ZeroCutoff { index }.into());
            }
        }
        for index in 1..CUTOFF_COUNT {
            if self.cutoffs[index] <= self.cutoffs[index - 1] {
                return Err(ConfigError::NotAscending {
                    index,
                    current: self.cutoffs[index],
                    previous: self.cutoffs[index - 1],
                }
                .into());
            }
        }
        Ok(())
    }

    /// The window over which tier `tier`'s records are averaged.
    ///
    /// # Panics
    ///
    /// Panics if `tier >= TIER_COUNT`; callers validate tier indices first.
    pub fn aggregation_window(&self, tier: usize) -> Duration {
        self.cutoffs[tier]
    }

    /// The maximum age a record may reach in tier `tier` before being
    /// trimmed.
    ///
    /// # Panics
    ///
    /// Panics if `tier >= TIER_COUNT`; callers validate tier indices first.
    pub fn retention_window(&self, tier: usize) -> Duration {
        self.cutoffs[tier + 1]
    }

    /// The full cutoff sequence.
    pub fn cutoffs(&self) -> [Duration; CUTOFF_COUNT] {
        self.cutoffs
    }
}

/// Serde support for the cutoff array.
///
/// Durations are serialized as total seconds for human readability in JSON
/// configuration files.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::CUTOFF_COUNT;

    pub fn serialize<S>(cutoffs: &[Duration; CUTOFF_COUNT], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs: Vec<u64> = cutoffs.iter().map(Duration::as_secs).collect();
        secs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[Duration; CUTOFF_COUNT], D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = <[u64; CUTOFF_COUNT]>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
