//! Worker loops and pipeline supervision.
//!
//! Three concurrent workers drive the cascade:
//!
//! 1. the ingest worker blocks on the channel and appends every measurement
//!    to tier 0;
//! 2. rollup worker 0→1 sleeps for tier 0's aggregation window, averages
//!    tier 0, and appends the result to tier 1;
//! 3. rollup worker 1→2 does the same from tier 1 to tier 2.
//!
//! There is no signalling between workers beyond the per-tier locks inside
//! the store; ordering between new data arriving in a tier and the next
//! rollup firing is purely wall-clock. Workers run until the process exits
//! or [`Pipeline::shutdown`] is signalled: rollup sleeps are condvar waits
//! that wake on shutdown, and the ingest worker polls the token whenever an
//! armed read timeout fires.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::aggregate::compute_average;
use crate::channel::Channel;
use crate::cutoff::TIER_COUNT;
use crate::error::{ChannelError, Result, StoreError, ThermologError};
use crate::store::TieredLogStore;

/// Cloneable shutdown token shared by all workers.
///
/// Wraps a flag and a condvar so a sleeping rollup worker wakes immediately
/// when shutdown is signalled instead of finishing its cycle sleep.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownHandle {
    /// Creates an unsignalled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals shutdown and wakes every waiting worker.
    pub fn signal(&self) {
        let (flag, condvar) = &*self.inner;
        *recover(flag.lock()) = true;
        condvar.notify_all();
    }

    /// Whether shutdown has been signalled.
    pub fn is_signalled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *recover(flag.lock())
    }

    /// Waits up to `timeout` for shutdown.
    ///
    /// Returns `true` if shutdown was signalled, `false` if the full
    /// timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let mut guard = recover(flag.lock());
        let mut remaining = timeout;
        let start = std::time::Instant::now();
        while !*guard {
            let (next, result) = match condvar.wait_timeout(guard, remaining) {
                Ok(woken) => woken,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard = next;
            if result.timed_out() {
                return *guard;
            }
            // Spurious wakeup: keep waiting out the remainder.
            match timeout.checked_sub(start.elapsed()) {
                Some(left) => remaining = left,
                None => return *guard,
            }
        }
        true
    }
}

/// Recovers a guard from a poisoned lock; the flag is a plain bool, so a
/// panicking peer cannot leave it inconsistent.
fn recover<'a, T>(
    result: std::result::Result<
        std::sync::MutexGuard<'a, T>,
        std::sync::PoisonError<std::sync::MutexGuard<'a, T>>,
    >,
) -> std::sync::MutexGuard<'a, T> {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Ingest worker loop: channel → tier 0.
///
/// Each successful read triggers exactly one append; the read is blocking,
/// so only one record is ever in flight. Tier 0 append failures are logged
/// and the record dropped. A channel failure is fatal: the worker signals
/// shutdown (stopping the rollup workers) and returns the error.
///
/// For prompt shutdown the caller should arm a read timeout on the channel;
/// timeouts are treated as poll ticks, not failures.
///
/// # Errors
///
/// Returns the fatal [`ChannelError`] that ended ingestion.
pub fn run_ingest<C: Channel>(
    mut channel: C,
    store: &TieredLogStore,
    shutdown: &ShutdownHandle,
) -> Result<()> {
    info!("ingest worker started");
    loop {
        if shutdown.is_signalled() {
            info!("ingest worker stopping");
            return Ok(());
        }
        match channel.read() {
            Ok(record) => {
                debug!(timestamp = record.timestamp, "measurement received");
                if let Err(e) = store.append(0, &record) {
                    error!(%e, "dropping measurement: tier 0 append failed");
                }
            }
            Err(ChannelError::Timeout) => {}
            Err(e) => {
                error!(%e, "channel failure, shutting the pipeline down");
                shutdown.signal();
                return Err(e.into());
            }
        }
    }
}

/// Rollup worker loop: tier `source_tier` → tier `source_tier + 1`.
///
/// Sleeps for the source tier's aggregation window, computes the windowed
/// average, and appends it to the destination tier. Failures inside a cycle
/// are logged and the cycle skipped; they never propagate to other workers.
///
/// # Errors
///
/// Returns [`StoreError::InvalidTier`] if `source_tier` has no destination
/// tier above it.
pub fn run_rollup(
    store: &TieredLogStore,
    source_tier: usize,
    shutdown: &ShutdownHandle,
) -> Result<()> {
    if source_tier + 1 >= TIER_COUNT {
        return Err(StoreError::InvalidTier {
            tier: source_tier,
            max_tiers: TIER_COUNT,
        }
        .into());
    }

    let period = store.cutoffs().aggregation_window(source_tier);
    info!(source_tier, ?period, "rollup worker started");

    loop {
        if shutdown.wait_timeout(period) {
            info!(source_tier, "rollup worker stopping");
            return Ok(());
        }

        let average = match compute_average(store, source_tier) {
            Ok(average) => average,
            Err(e) => {
                warn!(source_tier, %e, "skipping rollup cycle: average failed");
                continue;
            }
        };

        debug!(
            source_tier,
            temperature = average.temperature,
            feels_like = average.feels_like,
            "rolling up average"
        );
        if let Err(e) = store.append(source_tier + 1, &average) {
            warn!(source_tier, %e, "skipping rollup cycle: append failed");
        }
    }
}

/// Running pipeline: the three worker threads plus their shutdown token.
///
/// Replaces detached raw threads with an owned handle so shutdown can be
/// requested without touching worker logic.
#[derive(Debug)]
pub struct Pipeline {
    shutdown: ShutdownHandle,
    workers: Vec<(&'static str, JoinHandle<Result<()>>)>,
}

impl Pipeline {
    /// Spawns the ingest worker and both rollup workers.
    ///
    /// The caller keeps no obligation beyond eventually calling
    /// [`Pipeline::join`]; arm a read timeout on `channel` beforehand if
    /// shutdown must be able to interrupt a quiet channel.
    pub fn spawn<C>(channel: C, store: Arc<TieredLogStore>) -> Self
    where
        C: Channel + Send + 'static,
    {
        let shutdown = ShutdownHandle::new();
        let mut workers = Vec::with_capacity(3);

        {
            let store = Arc::clone(&store);
            let shutdown = shutdown.clone();
            workers.push((
                "ingest",
                thread::spawn(move || run_ingest(channel, &store, &shutdown)),
            ));
        }

        for source_tier in 0..TIER_COUNT - 1 {
            let store = Arc::clone(&store);
            let shutdown = shutdown.clone();
            let name: &'static str = if source_tier == 0 {
                "rollup-0-1"
            } else {
                "rollup-1-2"
            };
            workers.push((
                name,
                thread::spawn(move || run_rollup(&store, source_tier, &shutdown)),
            ));
        }

        Self { shutdown, workers }
    }

    /// A clone of the pipeline's shutdown token.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Requests shutdown of all workers.
    pub fn shutdown(&self) {
        self.shutdown.signal();
    }

    /// Waits for all workers to finish, returning the first fatal error.
    ///
    /// # Errors
    ///
    /// Returns the first worker error, typically the fatal channel failure
    /// that ended ingestion. A worker that panicked counts as failed and
    /// surfaces as [`ThermologError::WorkerPanicked`].
    pub fn join(self) -> Result<()> {
        let mut first_error = None;
        for (name, handle) in self.workers {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(_) => {
                    error!(worker = name, "worker thread panicked");
                    if first_error.is_none() {
                        first_error = Some(ThermologError::WorkerPanicked { worker: name });
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
