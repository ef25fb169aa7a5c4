//! webservice_probe library: concurrent, non-blocking web-service probing
//!
//! This library checks a batch of HTTP and HTTPS endpoints within a single
//! wall-clock deadline and reports one structured result per endpoint: a
//! success with status, protocol version, headers and timing facts, or a
//! failure (transport error, unexpected status, timeout, misconfiguration).
//!
//! Every endpoint gets its own non-blocking socket; all sockets of a batch are
//! multiplexed over one readiness poller on the calling thread.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::time::Duration;
//!
//! use serde_json::json;
//! use webservice_probe::{BatchProber, NodeData, ProbeConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let nodes: HashMap<String, NodeData> = serde_json::from_value(json!({
//!     "www": { "uri": "http://192.0.2.10/health", "expected_status": 204 },
//!     "api": { "uri": "https://api.example.com/", "address": "192.0.2.20" },
//! }))?;
//!
//! let prober = BatchProber::new(ProbeConfig::default().with_timeout(Duration::from_secs(2)));
//! for (identifier, result) in prober.probe_nodes(&nodes)? {
//!     println!("{identifier}: {:?}", result.error_message());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Host names are never resolved here; a node either uses an IP address in its
//! URI or carries the pre-resolved `address` attribute.

pub mod config;
pub mod connection;
pub mod error_handling;
pub mod initialization;
pub mod prober;
pub mod request;
pub mod result;
pub mod tls;
mod utils;

// Re-export public API
pub use config::{LogFormat, LogLevel, Opt, ProbeConfig};
pub use error_handling::{
    BatchStats, ConfigurationError, ErrorType, InitializationError, TransportError,
};
pub use prober::{probe_async, BatchProber, ProbeEngine, ProbeResults};
pub use request::{prepare_batch, HttpMethod, NodeData, PreparedBatch, RequestDescriptor};
pub use result::{classify, to_records, ProbeResult, ProbeSuccess, ResultRecord};
pub use utils::{duration_to_ms, ConnectionTiming};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version banner, e.g. `webservice_probe v0.1.0`.
///
/// With `include_build`, the revision from `WEBSERVICE_PROBE_REVISION` at
/// build time is appended when it was set.
pub fn version_string(include_build: bool) -> String {
    let mut version = format!("{} v{}", env!("CARGO_PKG_NAME"), VERSION);
    if include_build {
        if let Some(revision) = option_env!("WEBSERVICE_PROBE_REVISION") {
            version.push_str(&format!(" (rev {revision})"));
        }
    }
    version
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        assert_eq!(version_string(false), format!("webservice_probe v{VERSION}"));
        assert!(version_string(true).starts_with(&version_string(false)));
    }
}
