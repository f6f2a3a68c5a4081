//! # thermolog
//!
//! Tiered, file-backed telemetry retention pipeline with progressive
//! downsampling.
//!
//! thermolog ingests periodic sensor measurements from a point-to-point
//! blocking channel and maintains three cascaded, time-windowed append logs
//! at increasing granularity (hour / day / month by default), each holding a
//! rolling average of the tier below it. Stale records expire automatically,
//! so storage stays bounded regardless of how long the pipeline runs. State
//! is plain text files plus one exclusive lock per tier; there is no
//! database, no queue, and no background runtime beyond three worker
//! threads.
//!
//! ## Key Properties
//!
//! - Bounded storage: each tier trims its expired prefix on every append
//! - Progressive downsampling: tier *i+1* holds rolling averages of tier *i*
//! - One exclusive lock per tier; tiers never block each other
//! - Plain-text logs, independently inspectable with standard tools
//! - Resilient decoding: a corrupted historical line is skipped with a
//!   warning, never fatal
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use thermolog::{ChannelListener, CutoffConfig, Pipeline, TieredLogStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Bind the channel endpoint and wait for the producer.
//! let listener = ChannelListener::bind("/tmp/thermolog.sock")?;
//! let channel = listener.accept()?;
//! channel.set_read_timeout(Some(Duration::from_millis(500)))?;
//!
//! // Open the tier logs and run the three workers.
//! let store = Arc::new(TieredLogStore::open("./logs", CutoffConfig::production())?);
//! let pipeline = Pipeline::spawn(channel, store);
//! pipeline.join()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Record`] — one measurement or one computed average, with its
//!   log-line codec
//! - [`CutoffConfig`] — immutable ascending cutoff sequence; tier *i*
//!   averages over `CUTOFF[i]` and retains up to `CUTOFF[i + 1]`
//! - [`TieredLogStore`] — append/trim/read over the three tier logs
//! - [`Pipeline`] — the ingest worker plus two rollup workers, with a
//!   shutdown handle
//! - [`Channel`] — blocking, fixed-frame transport between the producer
//!   and the ingest worker
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`record`] — record type and line codec
//! - [`cutoff`] — cutoff configuration
//! - [`store`] — tiered log store
//! - [`aggregate`] — windowed average computation
//! - [`channel`] — frame codec and Unix socket transport
//! - [`pipeline`] — worker loops and supervision
//! - [`error`] — error types

pub mod aggregate;
pub mod channel;
pub mod cutoff;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use aggregate::compute_average;
pub use channel::{Channel, ChannelListener, SocketChannel, FRAME_SIZE};
pub use cutoff::{CutoffConfig, TIER_COUNT};
pub use error::{Result, ThermologError};
pub use pipeline::{Pipeline, ShutdownHandle};
pub use record::Record;
pub use store::TieredLogStore;
