//! Measurement record type and its log-line codec.
//!
//! A [`Record`] is one measurement (or one computed average) with two domain
//! values and an effective timestamp in epoch seconds. Records are rendered
//! to and parsed from a human-readable line format, one record per line:
//!
//! ```text
//! <verbose local timestamp> (<epoch seconds>) - Temperature <t>°C feels like <f>°C
//! Thu Jan 16 14:17:41 2025 (1737001061) - Temperature -2.69°C feels like -8.93°C
//! ```
//!
//! The codec is pure and stateless. `parse` extracts the epoch timestamp from
//! the first parenthesized token and the two values from fixed textual
//! anchors; the verbose timestamp is display-only and never read back.

use chrono::{DateTime, Local};

use crate::error::RecordError;

/// Anchor preceding the first value field.
const TEMP_ANCHOR: &str = "Temperature ";
/// Anchor preceding the second value field.
const FEELS_ANCHOR: &str = "like ";
/// Unit suffix terminating both value fields.
const UNIT_SUFFIX: &str = "°C";

/// One measurement or one computed average.
///
/// Immutable once written to a tier log; destroyed only by prefix trimming.
/// For raw records the timestamp is the sample time; for averaged records it
/// is the computation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Measured temperature in °C.
    pub temperature: f32,
    /// Perceived ("feels like") temperature in °C.
    pub feels_like: f32,
    /// Effective time of the record, epoch seconds.
    pub timestamp: i64,
}

impl Record {
    /// Creates a record from its fields.
    pub fn new(temperature: f32, feels_like: f32, timestamp: i64) -> Self {
        Self {
            temperature,
            feels_like,
            timestamp,
        }
    }

    /// Age of this record relative to `now`, in seconds.
    ///
    /// Negative for records with a future timestamp (clock skew); callers
    /// treat those as not expired.
    pub fn age(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    /// Renders this record as a log line (without trailing newline).
    ///
    /// The output embeds both a verbose local timestamp and the raw epoch
    /// seconds, and is unambiguously parseable by [`Record::parse`].
    pub fn to_line(&self) -> String {
        let verbose = DateTime::from_timestamp(self.timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&Local)
            .format("%c");
        format!(
            "{verbose} ({}) - Temperature {:.2}{UNIT_SUFFIX} feels like {:.2}{UNIT_SUFFIX}",
            self.timestamp, self.temperature, self.feels_like
        )
    }

    /// Parses a log line back into a record.
    ///
    /// The epoch timestamp is taken from the first parenthesized token, the
    /// temperature from between `"Temperature "` and the following `"°C"`,
    /// and the perceived temperature from between `"like "` and the
    /// following `"°C"`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Malformed`] when any anchor is missing or a
    /// numeric field fails to convert.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let open = line
            .find('(')
            .ok_or_else(|| malformed(line, "missing '(' before epoch timestamp"))?;
        let close = line[open..]
            .find(')')
            .map(|i| open + i)
            .ok_or_else(|| malformed(line, "missing ')' after epoch timestamp"))?;
        let timestamp: i64 = line[open + 1..close]
            .trim()
            .parse()
            .map_err(|_| malformed(line, "epoch timestamp is not an integer"))?;

        let temperature = parse_value(line, 0, TEMP_ANCHOR, "temperature")?;
        let feels_start = line
            .find(FEELS_ANCHOR)
            .ok_or_else(|| malformed(line, "missing 'like ' anchor"))?;
        let feels_like = parse_value(line, feels_start, FEELS_ANCHOR, "feels-like temperature")?;

        Ok(Self {
            temperature,
            feels_like,
            timestamp,
        })
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Extracts the float between `anchor` (searched from `from`) and the next
/// unit suffix.
fn parse_value(line: &str, from: usize, anchor: &str, what: &str) -> Result<f32, RecordError> {
    let start = line[from..]
        .find(anchor)
        .map(|i| from + i + anchor.len())
        .ok_or_else(|| malformed(line, &format!("missing '{anchor}' anchor")))?;
    let end = line[start..]
        .find(UNIT_SUFFIX)
        .map(|i| start + i)
        .ok_or_else(|| malformed(line, &format!("missing unit suffix after {what}")))?;
    line[start..end]
        .trim()
        .parse()
        .map_err(|_| malformed(line, &format!("{what} is not a number")))
}

fn malformed(line: &str, reason: &str) -> RecordError {
    RecordError::Malformed {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}
