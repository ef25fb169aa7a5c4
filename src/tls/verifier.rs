//! Server certificate verification honouring the per-endpoint TLS knobs.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, Error, SignatureScheme};

use super::extract::spki_sha256;

/// Wraps the WebPKI verifier with the `ssl_verifypeer`, `ssl_verifyhost` and
/// `ssl_pinnedpublickey` knobs.
///
/// Handshake signatures are always checked, even when chain verification is
/// switched off.
#[derive(Debug)]
pub(crate) struct ProbeVerifier {
    /// `None` when the peer chain isn't verified
    chain: Option<Arc<WebPkiServerVerifier>>,
    verify_host: bool,
    pins: Vec<[u8; 32]>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ProbeVerifier {
    pub(crate) fn new(
        chain: Option<Arc<WebPkiServerVerifier>>,
        verify_host: bool,
        pins: Vec<[u8; 32]>,
        algorithms: WebPkiSupportedAlgorithms,
    ) -> Self {
        Self {
            chain,
            verify_host,
            pins,
            algorithms,
        }
    }
}

impl ServerCertVerifier for ProbeVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        if let Some(chain) = &self.chain {
            let verified =
                chain.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now);
            match verified {
                Ok(_) => {}
                Err(Error::InvalidCertificate(ref e))
                    if !self.verify_host && is_name_mismatch(e) =>
                {
                    log::debug!("Ignoring certificate name mismatch for {server_name:?}");
                }
                Err(e) => return Err(e),
            }
        }

        if !self.pins.is_empty() {
            let hash = spki_sha256(end_entity.as_ref()).ok_or(Error::InvalidCertificate(
                CertificateError::BadEncoding,
            ))?;
            if !self.pins.contains(&hash) {
                log::debug!("Public key of {server_name:?} matches none of the pinned keys");
                return Err(Error::InvalidCertificate(
                    CertificateError::ApplicationVerificationFailure,
                ));
            }
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

fn is_name_mismatch(error: &CertificateError) -> bool {
    matches!(
        error,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}
