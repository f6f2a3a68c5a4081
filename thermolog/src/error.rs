//! Error types for the thermolog retention pipeline.

use thiserror::Error;

/// The main error type for all thermolog operations.
///
/// This enum covers all error conditions that can occur across the pipeline,
/// from channel transport failures to per-tier log file I/O.
#[derive(Error, Debug)]
pub enum ThermologError {
    /// Error on the measurement channel.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Error decoding a log line into a record.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Error during a tier log operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error in cutoff configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A worker thread panicked instead of returning.
    #[error("worker '{worker}' panicked")]
    WorkerPanicked {
        /// Name of the panicked worker thread.
        worker: &'static str,
    },
}

/// Errors on the measurement channel.
///
/// Channel errors are fatal to the pipeline: the channel is foundational
/// infrastructure owned by the producer, and there is no retry policy.
/// The one exception is [`ChannelError::Timeout`], which the ingest worker
/// treats as a poll tick for its shutdown check.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to bind the channel endpoint.
    #[error("failed to bind channel at '{path}': {source}")]
    Bind {
        /// The endpoint path that could not be bound.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect to the channel endpoint.
    #[error("failed to connect to channel at '{path}': {source}")]
    Connect {
        /// The endpoint path that could not be reached.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept a producer connection.
    #[error("failed to accept producer connection: {source}")]
    Accept {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A frame read failed irrecoverably.
    #[error("channel read failed: {source}")]
    Read {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A frame write failed.
    #[error("channel write failed: {source}")]
    Write {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the channel.
    #[error("channel closed by peer")]
    Closed,

    /// A read timed out before a full frame arrived.
    ///
    /// Not fatal: workers use read timeouts as cancellation poll points.
    #[error("channel read timed out")]
    Timeout,
}

/// Errors decoding a log line into a record.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The line does not match the record format.
    #[error("malformed record line '{line}': {reason}")]
    Malformed {
        /// The offending line.
        line: String,
        /// Which anchor or field failed.
        reason: String,
    },
}

/// Errors during tier log operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested tier index is out of range.
    #[error("invalid tier {tier}: only {max_tiers} tiers available")]
    InvalidTier {
        /// The requested tier index.
        tier: usize,
        /// The number of tiers available.
        max_tiers: usize,
    },

    /// Failed to read a tier log file.
    #[error("failed to read log '{path}': {source}")]
    Read {
        /// The log file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to rewrite a tier log file.
    #[error("failed to rewrite log '{path}': {source}")]
    Rewrite {
        /// The log file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The log directory could not be created or accessed.
    #[error("failed to access log directory '{path}': {source}")]
    DirectoryAccess {
        /// The directory path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors in cutoff configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A cutoff duration is zero.
    #[error("cutoff {index} must be non-zero")]
    ZeroCutoff {
        /// Index of the zero cutoff.
        index: usize,
    },

    /// Cutoffs are not strictly ascending.
    #[error("cutoffs must be strictly ascending: cutoff {index} ({current:?}) must exceed its predecessor ({previous:?})")]
    NotAscending {
        /// Index of the offending cutoff.
        index: usize,
        /// The offending duration.
        current: std::time::Duration,
        /// The preceding duration it failed to exceed.
        previous: std::time::Duration,
    },

    /// Failed to read a cutoff config file.
    #[error("failed to read cutoff config '{path}': {source}")]
    Load {
        /// The config file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a cutoff config file.
    #[error("failed to parse cutoff config '{path}': {source}")]
    Parse {
        /// The config file path.
        path: String,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, ThermologError>`.
pub type Result<T> = std::result::Result<T, ThermologError>;
