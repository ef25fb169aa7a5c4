//! Certificate and session fact extraction.

use ring::digest::{digest, SHA256};
use rustls::ClientConnection;
use serde::Serialize;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};

/// Facts about a completed TLS handshake, reported with successful probes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlsFacts {
    /// Negotiated protocol version (e.g. `TLSv1_3`)
    pub tls_version: Option<String>,
    /// Negotiated cipher suite
    pub cipher_suite: Option<String>,
    /// Leaf certificate subject
    pub subject: Option<String>,
    /// Leaf certificate issuer
    pub issuer: Option<String>,
    /// Leaf certificate expiry, RFC 2822
    pub not_after: Option<String>,
    /// Leaf certificate public key algorithm
    pub key_algorithm: Option<String>,
    /// DNS names from the Subject Alternative Name extension
    pub subject_alternative_names: Vec<String>,
}

/// Collects session and leaf-certificate facts from a finished handshake.
///
/// Certificate fields are left empty if the peer sent none or the leaf
/// certificate can't be parsed; that never fails the probe.
pub(crate) fn tls_facts(conn: &ClientConnection) -> TlsFacts {
    let mut facts = TlsFacts {
        tls_version: conn.protocol_version().map(|v| format!("{v:?}")),
        cipher_suite: conn
            .negotiated_cipher_suite()
            .map(|cs| format!("{:?}", cs.suite())),
        ..TlsFacts::default()
    };

    let Some(leaf) = conn.peer_certificates().and_then(|certs| certs.first()) else {
        return facts;
    };
    match x509_parser::parse_x509_certificate(leaf.as_ref()) {
        Ok((_, cert)) => {
            facts.subject = Some(cert.subject().to_string());
            facts.issuer = Some(cert.issuer().to_string());
            facts.not_after = cert.validity().not_after.to_rfc2822().ok();
            facts.key_algorithm = Some(key_algorithm(&cert));
            facts.subject_alternative_names = extract_certificate_sans(&cert);
        }
        Err(e) => log::debug!("Couldn't parse peer certificate: {e}"),
    }

    facts
}

/// SHA-256 of the certificate's DER-encoded SubjectPublicKeyInfo, the value
/// public-key pins are compared against.
pub(crate) fn spki_sha256(cert_der: &[u8]) -> Option<[u8; 32]> {
    let (_, cert) = x509_parser::parse_x509_certificate(cert_der).ok()?;
    let hash = digest(&SHA256, cert.tbs_certificate.subject_pki.raw);
    hash.as_ref().try_into().ok()
}

fn key_algorithm(cert: &X509Certificate<'_>) -> String {
    let oid = cert.tbs_certificate.subject_pki.algorithm.algorithm.to_id_string();
    match oid.as_str() {
        "1.2.840.113549.1.1.1" => "RSA".to_string(),
        "1.2.840.10045.2.1" => "ECDSA".to_string(),
        "1.3.101.112" => "Ed25519".to_string(),
        "1.3.101.113" => "Ed448".to_string(),
        _ => oid,
    }
}

/// Extracts the DNS names from the Subject Alternative Name extension.
fn extract_certificate_sans(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                if let GeneralName::DNSName(dns_name) = general_name {
                    sans.push(dns_name.to_string());
                }
            }
        }
    }

    sans
}
