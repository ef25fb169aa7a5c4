//! Error type definitions.
//!
//! This module defines the error types raised while building requests, driving
//! connections and setting up the process, plus the `ErrorType` categories used
//! for batch statistics.

use std::io;
use std::net::SocketAddr;

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error creating the readiness poller for a batch.
    #[error("Poller initialization error: {0}")]
    PollerError(#[source] io::Error),

    /// The blocking worker running a batch panicked or was cancelled.
    #[error("Probe worker error: {0}")]
    WorkerError(String),
}

/// Errors raised while turning node attributes into a request descriptor.
///
/// These are reported for the offending endpoint only; the rest of the batch
/// is still probed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The node has no `uri` attribute.
    #[error("missing uri")]
    MissingUri,

    /// The `uri` attribute could not be parsed.
    #[error("invalid uri {uri:?}: {reason}")]
    InvalidUri {
        /// The offending value
        uri: String,
        /// Why parsing failed
        reason: String,
    },

    /// The URI scheme is neither `http` nor `https`.
    #[error("unsupported uri scheme {0:?}")]
    UnsupportedScheme(String),

    /// The URI names a host that is not an address and no `address` was given.
    #[error("host {0:?} is not a pre-resolved address")]
    UnresolvedHost(String),

    /// The HTTP method is not one of GET, HEAD, POST, PUT, DELETE.
    #[error("unsupported HTTP method {0:?}")]
    UnsupportedMethod(String),

    /// The HTTP version is not a `major.minor` token.
    #[error("invalid HTTP version {0:?}")]
    InvalidHttpVersion(String),

    /// The expected status is not an HTTP status code.
    #[error("invalid expected status {0}")]
    InvalidExpectedStatus(String),

    /// A header name or value cannot be written on the wire.
    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    /// An attribute has the wrong type.
    #[error("invalid value for {key}: {reason}")]
    InvalidAttribute {
        /// The attribute name
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// The TLS knobs could not be turned into a client configuration.
    #[error("TLS configuration error: {0}")]
    Tls(String),
}

/// Failures below the HTTP layer while driving one connection.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The TCP connect failed.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// The address connected to
        addr: SocketAddr,
        /// The underlying socket error
        #[source]
        source: io::Error,
    },

    /// The TLS layer reported an error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A read or write on the socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The response could not be parsed as HTTP/1.x.
    #[error("malformed HTTP response: {0}")]
    Protocol(String),

    /// The peer closed the connection before a complete response arrived.
    #[error("connection closed before a complete response was received")]
    ConnectionClosed,

    /// The response head did not fit in the head buffer.
    #[error("response head exceeds {0} bytes")]
    HeadTooLarge(usize),

    /// A connection reached the classifier before it finished.
    #[error("connection is not finished (state {0})")]
    NotFinished(String),
}

impl TransportError {
    /// Converts an I/O error from the transport, unwrapping TLS errors that the
    /// transport carried inside it.
    pub fn from_transport_io(err: io::Error) -> Self {
        let is_tls = err
            .get_ref()
            .is_some_and(|inner| inner.is::<rustls::Error>());
        if !is_tls {
            return TransportError::Io(err);
        }

        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<rustls::Error>()) {
            Some(Ok(tls)) => TransportError::Tls(*tls),
            Some(Err(other)) => TransportError::Io(io::Error::new(kind, other)),
            None => TransportError::Io(io::Error::from(kind)),
        }
    }
}

/// Categories of probe failures, used for batch statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    // Connect errors
    ConnectionRefused,
    ConnectionReset,
    HostUnreachable,
    ConnectOther,
    // TLS errors
    TlsHandshake,
    TlsCertificate,
    // HTTP errors
    Protocol,
    PrematureClose,
    UnexpectedStatus,
    // Other failures
    Io,
    Timeout,
    Configuration,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::ConnectionRefused => "connection refused",
            ErrorType::ConnectionReset => "connection reset",
            ErrorType::HostUnreachable => "host unreachable",
            ErrorType::ConnectOther => "connect error",
            ErrorType::TlsHandshake => "TLS handshake error",
            ErrorType::TlsCertificate => "TLS certificate error",
            ErrorType::Protocol => "HTTP protocol error",
            ErrorType::PrematureClose => "premature close",
            ErrorType::UnexpectedStatus => "unexpected status",
            ErrorType::Io => "I/O error",
            ErrorType::Timeout => "timeout",
            ErrorType::Configuration => "configuration error",
        }
    }

    /// Short machine-readable tag written into result records.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorType::ConnectionRefused => "connection_refused",
            ErrorType::ConnectionReset => "connection_reset",
            ErrorType::HostUnreachable => "host_unreachable",
            ErrorType::ConnectOther => "connect",
            ErrorType::TlsHandshake => "tls_handshake",
            ErrorType::TlsCertificate => "tls_certificate",
            ErrorType::Protocol => "protocol",
            ErrorType::PrematureClose => "premature_close",
            ErrorType::UnexpectedStatus => "unexpected_status",
            ErrorType::Io => "io",
            ErrorType::Timeout => "timeout",
            ErrorType::Configuration => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_all_error_types_have_string_representation() {
        for error_type in ErrorType::iter() {
            assert!(
                !error_type.as_str().is_empty(),
                "{:?} should have non-empty string",
                error_type
            );
        }
    }

    #[test]
    fn test_error_type_tags_are_unique() {
        let tags: HashSet<_> = ErrorType::iter().map(|t| t.tag()).collect();
        assert_eq!(tags.len(), ErrorType::iter().count());
    }

    #[test]
    fn test_tls_error_is_unwrapped_from_io_error() {
        let io_err = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::General("boom".into()),
        );
        match TransportError::from_transport_io(io_err) {
            TransportError::Tls(rustls::Error::General(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected TLS error, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_io_error_stays_io() {
        let io_err = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(
            TransportError::from_transport_io(io_err),
            TransportError::Io(e) if e.kind() == io::ErrorKind::ConnectionReset
        ));
    }

    #[test]
    fn test_configuration_error_messages() {
        assert_eq!(
            ConfigurationError::UnsupportedMethod("PATCH".into()).to_string(),
            "unsupported HTTP method \"PATCH\""
        );
        assert_eq!(ConfigurationError::MissingUri.to_string(), "missing uri");
    }
}
