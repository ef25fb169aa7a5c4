//! Utility types shared by the connection and result modules.
//!
//! This module provides:
//! - Timing facts for individual connections

mod timing;

pub use timing::{duration_to_ms, ConnectionTiming, TimingRecorder};
