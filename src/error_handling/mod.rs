//! Error handling and batch statistics.
//!
//! This module provides:
//! - Error type definitions (configuration, transport, initialization)
//! - Categorization of transport failures into `ErrorType`
//! - Per-batch outcome statistics
//!
//! Per-endpoint failures are never propagated to the caller as errors; they are
//! converted into that endpoint's result. Only initialization failures abort a
//! whole batch.

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::categorize_transport_error;
pub use stats::BatchStats;
pub use types::{ConfigurationError, ErrorType, InitializationError, TransportError};
