//! Batch probing.
//!
//! A `BatchProber` takes a batch of request descriptors and returns a result
//! for every one of them within a single wall-clock deadline:
//! - One non-blocking `Connection` per endpoint, multiplexed over `mio::Poll`
//! - Optional concurrency limit, with queued endpoints started as slots free
//! - Stragglers finalized as timeouts when the deadline passes
//!
//! All connections of a batch are driven from the calling thread. Use
//! [`probe_async`] from async code so the readiness loop runs on a blocking
//! worker instead of the runtime's threads.

mod batch;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::info;

use crate::config::ProbeConfig;
use crate::error_handling::{BatchStats, InitializationError};
use crate::request::{prepare_batch, NodeData, RequestDescriptor};
use crate::result::ProbeResult;
use batch::Batch;

/// Results of one batch, keyed by endpoint identifier.
pub type ProbeResults = HashMap<String, ProbeResult>;

/// A strategy for probing a batch of endpoints.
///
/// Implementations must return exactly one result per submitted identifier
/// and must not run past `timeout` by more than a small bounded overhead.
pub trait ProbeEngine {
    /// Probes every descriptor, returning a result per identifier.
    ///
    /// # Errors
    ///
    /// Only failures to set up the engine itself are returned; per-endpoint
    /// failures are reported as that endpoint's result.
    fn probe(
        &self,
        descriptors: HashMap<String, RequestDescriptor>,
        timeout: Duration,
    ) -> Result<ProbeResults, InitializationError>;
}

/// Probes batches of endpoints with raw non-blocking sockets.
#[derive(Debug, Clone, Default)]
pub struct BatchProber {
    config: ProbeConfig,
}

impl BatchProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probes a batch of descriptors against a deadline of `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::PollerError` if the readiness poller
    /// can't be created. Nothing else aborts a batch.
    pub fn probe(
        &self,
        descriptors: HashMap<String, RequestDescriptor>,
        timeout: Duration,
    ) -> Result<ProbeResults, InitializationError> {
        let start = Instant::now();
        let results = self.run_batch(descriptors, timeout)?;
        log_batch_summary(&results, start);
        Ok(results)
    }

    /// Builds descriptors from node attributes and probes them with the
    /// configured timeout.
    ///
    /// Nodes whose attributes can't be turned into a request are reported as
    /// misconfigured without being probed.
    ///
    /// # Errors
    ///
    /// Same as [`BatchProber::probe`].
    pub fn probe_nodes(
        &self,
        nodes: &HashMap<String, NodeData>,
    ) -> Result<ProbeResults, InitializationError> {
        let start = Instant::now();
        let batch = prepare_batch(nodes, &self.config);
        let mut results = self.run_batch(batch.descriptors, self.config.timeout)?;
        for (identifier, error) in batch.rejected {
            results.insert(identifier, ProbeResult::misconfigured(&error));
        }
        log_batch_summary(&results, start);
        Ok(results)
    }

    fn run_batch(
        &self,
        descriptors: HashMap<String, RequestDescriptor>,
        timeout: Duration,
    ) -> Result<ProbeResults, InitializationError> {
        if descriptors.is_empty() {
            return Ok(HashMap::new());
        }

        info!(
            "Probing {} endpoint(s) with a {:.3}s deadline",
            descriptors.len(),
            timeout.as_secs_f64()
        );
        Ok(Batch::new(&self.config, descriptors, timeout)?.run())
    }
}

fn log_batch_summary(results: &ProbeResults, start: Instant) {
    if !results.is_empty() {
        BatchStats::from_results(results.values()).log_summary(start.elapsed().as_secs_f64());
    }
}

impl ProbeEngine for BatchProber {
    fn probe(
        &self,
        descriptors: HashMap<String, RequestDescriptor>,
        timeout: Duration,
    ) -> Result<ProbeResults, InitializationError> {
        BatchProber::probe(self, descriptors, timeout)
    }
}

/// Runs [`BatchProber::probe_nodes`] on tokio's blocking pool.
///
/// # Errors
///
/// Returns `InitializationError::WorkerError` if the blocking task panics or
/// is cancelled, plus anything `probe_nodes` returns.
pub async fn probe_async(
    prober: BatchProber,
    nodes: HashMap<String, NodeData>,
) -> Result<ProbeResults, InitializationError> {
    tokio::task::spawn_blocking(move || prober.probe_nodes(&nodes))
        .await
        .map_err(|e| InitializationError::WorkerError(e.to_string()))?
}
