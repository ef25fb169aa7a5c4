//! Error categorization.
//!
//! Maps transport failures onto `ErrorType` categories so batch summaries can
//! group endpoints by what went wrong.

use std::io;

use super::types::{ErrorType, TransportError};

/// Categorizes a `TransportError` into an `ErrorType`.
///
/// # Arguments
///
/// * `error` - The transport error captured by a failed connection
///
/// # Returns
///
/// The appropriate `ErrorType` for the error.
pub fn categorize_transport_error(error: &TransportError) -> ErrorType {
    match error {
        TransportError::Connect { source, .. } => categorize_connect_error(source),
        TransportError::Tls(tls) => categorize_tls_error(tls),
        TransportError::Io(io_err) => match io_err.kind() {
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                ErrorType::ConnectionReset
            }
            io::ErrorKind::ConnectionRefused => ErrorType::ConnectionRefused,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => ErrorType::PrematureClose,
            _ => ErrorType::Io,
        },
        TransportError::Protocol(_) | TransportError::HeadTooLarge(_) => ErrorType::Protocol,
        TransportError::ConnectionClosed => ErrorType::PrematureClose,
        TransportError::NotFinished(_) => ErrorType::Io,
    }
}

fn categorize_connect_error(error: &io::Error) -> ErrorType {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => ErrorType::ConnectionRefused,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            ErrorType::ConnectionReset
        }
        io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::AddrNotAvailable => ErrorType::HostUnreachable,
        _ => ErrorType::ConnectOther,
    }
}

fn categorize_tls_error(error: &rustls::Error) -> ErrorType {
    match error {
        rustls::Error::InvalidCertificate(_)
        | rustls::Error::NoCertificatesPresented
        | rustls::Error::InvalidCertRevocationList(_) => ErrorType::TlsCertificate,
        _ => ErrorType::TlsHandshake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn connect_error(kind: io::ErrorKind) -> TransportError {
        TransportError::Connect {
            addr: SocketAddr::from(([127, 0, 0, 1], 9)),
            source: io::Error::from(kind),
        }
    }

    #[test]
    fn test_connect_errors() {
        assert_eq!(
            categorize_transport_error(&connect_error(io::ErrorKind::ConnectionRefused)),
            ErrorType::ConnectionRefused
        );
        assert_eq!(
            categorize_transport_error(&connect_error(io::ErrorKind::HostUnreachable)),
            ErrorType::HostUnreachable
        );
        assert_eq!(
            categorize_transport_error(&connect_error(io::ErrorKind::PermissionDenied)),
            ErrorType::ConnectOther
        );
    }

    #[test]
    fn test_tls_errors() {
        let cert = TransportError::Tls(rustls::Error::InvalidCertificate(
            rustls::CertificateError::UnknownIssuer,
        ));
        assert_eq!(categorize_transport_error(&cert), ErrorType::TlsCertificate);

        let pin_mismatch = TransportError::Tls(rustls::Error::InvalidCertificate(
            rustls::CertificateError::ApplicationVerificationFailure,
        ));
        assert_eq!(categorize_transport_error(&pin_mismatch), ErrorType::TlsCertificate);

        let handshake = TransportError::Tls(rustls::Error::HandshakeNotComplete);
        assert_eq!(categorize_transport_error(&handshake), ErrorType::TlsHandshake);

        // Local session setup failures are not certificate problems
        let setup = TransportError::Tls(rustls::Error::General(
            "no TLS configuration for https endpoint".into(),
        ));
        assert_eq!(categorize_transport_error(&setup), ErrorType::TlsHandshake);
    }

    #[test]
    fn test_http_layer_errors() {
        assert_eq!(
            categorize_transport_error(&TransportError::Protocol("bad".into())),
            ErrorType::Protocol
        );
        assert_eq!(
            categorize_transport_error(&TransportError::ConnectionClosed),
            ErrorType::PrematureClose
        );
        assert_eq!(
            categorize_transport_error(&TransportError::Io(io::Error::from(
                io::ErrorKind::ConnectionReset
            ))),
            ErrorType::ConnectionReset
        );
    }
}
