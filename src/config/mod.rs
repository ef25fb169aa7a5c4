//! Probe configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, limits, default request attributes)
//! - HTTP header name constants and the recognized TLS knob names
//! - The immutable `ProbeConfig` value and CLI option types

mod constants;
mod headers;
mod types;

// Re-export all constants
pub use constants::*;
pub use headers::*;
pub use types::{LogFormat, LogLevel, Opt, ProbeConfig};
