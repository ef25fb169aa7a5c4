//! Batch statistics.
//!
//! Counts the outcome of every endpoint in a batch so the prober can log a
//! one-line summary when the batch finishes.

use std::collections::HashMap;

use log::info;
use strum::IntoEnumIterator;

use super::types::ErrorType;
use crate::result::ProbeResult;

/// Outcome counters for one batch.
///
/// All error types are initialized to zero on creation. The prober owns this
/// value exclusively, so plain counters suffice.
#[derive(Debug, Clone)]
pub struct BatchStats {
    successes: usize,
    errors: HashMap<ErrorType, usize>,
}

impl Default for BatchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStats {
    pub fn new() -> Self {
        BatchStats {
            successes: 0,
            errors: ErrorType::iter().map(|error| (error, 0)).collect(),
        }
    }

    /// Builds statistics from a finished set of results.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ProbeResult>) -> Self {
        let mut stats = Self::new();
        for result in results {
            stats.record(result);
        }
        stats
    }

    /// Counts one endpoint result.
    pub fn record(&mut self, result: &ProbeResult) {
        match result.error_type() {
            None => self.successes += 1,
            Some(error) => *self.errors.entry(error).or_insert(0) += 1,
        }
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn get_error_count(&self, error: ErrorType) -> usize {
        self.errors.get(&error).copied().unwrap_or(0)
    }

    pub fn total_errors(&self) -> usize {
        self.errors.values().sum()
    }

    pub fn total(&self) -> usize {
        self.successes + self.total_errors()
    }

    /// Logs a summary line, listing only the error categories that occurred.
    pub fn log_summary(&self, elapsed_secs: f64) {
        let mut breakdown: Vec<String> = ErrorType::iter()
            .filter_map(|error| {
                let count = self.get_error_count(error);
                (count > 0).then(|| format!("{}: {}", error, count))
            })
            .collect();
        breakdown.sort();

        if breakdown.is_empty() {
            info!(
                "Probed {} endpoint(s) in {:.3}s: all succeeded",
                self.total(),
                elapsed_secs
            );
        } else {
            info!(
                "Probed {} endpoint(s) in {:.3}s: {} succeeded, {} failed ({})",
                self.total(),
                elapsed_secs,
                self.successes,
                self.total_errors(),
                breakdown.join(", ")
            );
        }
    }
}
