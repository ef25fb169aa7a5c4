//! Probe results.
//!
//! This module provides:
//! - `ProbeResult`, the one value every endpoint in a batch ends up with
//! - The classifier mapping a finished `Connection` onto a `ProbeResult`
//! - `ResultRecord`, the flat serialized form handed back to the scheduler

mod classifier;
mod record;

use std::time::Duration;

pub use classifier::classify;
pub use record::{to_records, ResultRecord};

use crate::error_handling::{
    categorize_transport_error, ConfigurationError, ErrorType, TransportError,
};
use crate::tls::TlsFacts;
use crate::utils::ConnectionTiming;

/// A response that carried the expected status.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSuccess {
    pub status: u16,
    /// Protocol version the server answered with, e.g. `1.1`
    pub http_version: String,
    /// All response headers in the order received
    pub headers: Vec<(String, String)>,
    pub timing: ConnectionTiming,
    /// Present for https endpoints
    pub tls: Option<TlsFacts>,
}

impl ProbeSuccess {
    /// First value of a response header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The outcome of probing one endpoint for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    /// A well-formed response with the expected status.
    Success(ProbeSuccess),
    /// A well-formed response with some other status.
    UnexpectedStatus {
        status: u16,
        status_message: String,
        http_version: String,
    },
    /// Connect, TLS, I/O or response framing failure.
    TransportError {
        message: String,
        error_type: ErrorType,
    },
    /// The batch deadline passed before the endpoint finished.
    Timeout { after: Duration },
    /// The endpoint's configuration couldn't be turned into a request.
    Misconfigured { message: String },
}

impl ProbeResult {
    pub fn unexpected_status(status: u16, status_message: &str, http_version: &str) -> Self {
        ProbeResult::UnexpectedStatus {
            status,
            status_message: status_message.to_string(),
            http_version: http_version.to_string(),
        }
    }

    pub fn transport_error(error: &TransportError) -> Self {
        ProbeResult::TransportError {
            message: error.to_string(),
            error_type: categorize_transport_error(error),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        ProbeResult::Timeout { after }
    }

    pub fn misconfigured(error: &ConfigurationError) -> Self {
        ProbeResult::Misconfigured {
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Success(_))
    }

    /// The failure category, or `None` for a success.
    pub fn error_type(&self) -> Option<ErrorType> {
        match self {
            ProbeResult::Success(_) => None,
            ProbeResult::UnexpectedStatus { .. } => Some(ErrorType::UnexpectedStatus),
            ProbeResult::TransportError { error_type, .. } => Some(*error_type),
            ProbeResult::Timeout { .. } => Some(ErrorType::Timeout),
            ProbeResult::Misconfigured { .. } => Some(ErrorType::Configuration),
        }
    }

    /// Human-readable failure message, or `None` for a success.
    pub fn error_message(&self) -> Option<String> {
        match self {
            ProbeResult::Success(_) => None,
            ProbeResult::UnexpectedStatus { status, .. } => Some(format!("{status} response")),
            ProbeResult::TransportError { message, .. } => Some(message.clone()),
            ProbeResult::Timeout { after } => {
                Some(format!("Request timeout after {}s.", after.as_secs()))
            }
            ProbeResult::Misconfigured { message } => Some(message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProbeResult::unexpected_status(503, "Service Unavailable", "1.1").error_message(),
            Some("503 response".to_string())
        );
        assert_eq!(
            ProbeResult::timeout(Duration::from_millis(2500)).error_message(),
            Some("Request timeout after 2s.".to_string())
        );
        assert_eq!(
            ProbeResult::misconfigured(&ConfigurationError::MissingUri).error_message(),
            Some("missing uri".to_string())
        );
    }

    #[test]
    fn test_transport_error_is_categorized() {
        let result = ProbeResult::transport_error(&TransportError::ConnectionClosed);
        assert_eq!(result.error_type(), Some(ErrorType::PrematureClose));
        assert!(!result.is_success());
        assert_eq!(
            result.error_message().unwrap(),
            "connection closed before a complete response was received"
        );
    }

    #[test]
    fn test_success_has_no_error() {
        let result = ProbeResult::Success(ProbeSuccess {
            status: 200,
            http_version: "1.1".to_string(),
            headers: vec![("Server".to_string(), "nginx".to_string())],
            timing: ConnectionTiming::default(),
            tls: None,
        });
        assert!(result.is_success());
        assert_eq!(result.error_type(), None);
        assert_eq!(result.error_message(), None);
        if let ProbeResult::Success(success) = &result {
            assert_eq!(success.header("server"), Some("nginx"));
        }
    }
}
