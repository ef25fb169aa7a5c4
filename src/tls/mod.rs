//! TLS client configuration.
//!
//! This module turns an endpoint's TLS knobs into a `rustls::ClientConfig`:
//! - Trust roots from `ssl_ca_file`/`ssl_ca_path`, or the WebPKI roots
//! - Protocol version range and cipher suite selection
//! - Client certificate authentication
//! - Peer, host-name and public-key-pin verification policy
//!
//! Configurations are cached per distinct set of knobs for the length of a
//! batch, since building the root store is the expensive part.

mod extract;
mod verifier;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::debug;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};

use crate::error_handling::ConfigurationError;
use crate::request::{TlsKnob, TlsOptions};

pub use extract::TlsFacts;
pub(crate) use extract::tls_facts;
use verifier::ProbeVerifier;

/// Builds a client configuration for one set of TLS knobs.
///
/// # Errors
///
/// Returns `ConfigurationError::Tls` if a CA, certificate or key file can't be
/// read, the version range or cipher list selects nothing rustls supports, or
/// a pinned key isn't in `sha256//<base64>` form.
pub fn client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>, ConfigurationError> {
    let provider = Arc::new(crypto_provider(options)?);
    let versions = protocol_versions(options)?;

    let chain = if options.verify_peer() {
        let roots = root_store(options)?;
        let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(|e| tls_error(format!("certificate verifier: {e}")))?;
        Some(verifier)
    } else {
        debug!("Peer certificate verification disabled");
        None
    };
    let pins = match options.get(TlsKnob::SslPinnedpublickey) {
        Some(pins) => parse_pins(pins)?,
        None => Vec::new(),
    };
    let verifier = ProbeVerifier::new(
        chain,
        options.verify_host(),
        pins,
        provider.signature_verification_algorithms,
    );

    let builder = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&versions)
        .map_err(|e| tls_error(format!("protocol versions: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    let config = match (options.get(TlsKnob::SslCert), options.get(TlsKnob::SslKey)) {
        (Some(cert), Some(key)) => {
            let chain = load_certificates(Path::new(cert))?;
            let key = PrivateKeyDer::from_pem_file(key)
                .map_err(|e| tls_error(format!("reading key {key}: {e:?}")))?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| tls_error(format!("client certificate: {e}")))?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => return Err(tls_error("ssl_cert and ssl_key must be set together")),
    };

    for knob in [TlsKnob::SslTimeout, TlsKnob::SslVerifyDepth] {
        if let Some(value) = options.get(knob) {
            debug!("TLS knob {}={value} is not enforced", knob.as_str());
        }
    }

    Ok(Arc::new(config))
}

/// Per-batch cache of client configurations keyed by their knobs.
#[derive(Default)]
pub struct TlsConfigCache {
    configs: HashMap<TlsOptions, Arc<ClientConfig>>,
}

impl TlsConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &mut self,
        options: &TlsOptions,
    ) -> Result<Arc<ClientConfig>, ConfigurationError> {
        if let Some(config) = self.configs.get(options) {
            return Ok(config.clone());
        }
        let config = client_config(options)?;
        self.configs.insert(options.clone(), config.clone());
        Ok(config)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

fn tls_error(message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::Tls(message.into())
}

fn crypto_provider(options: &TlsOptions) -> Result<CryptoProvider, ConfigurationError> {
    let mut provider = ring::default_provider();
    let Some(list) = options.get(TlsKnob::SslCiphers) else {
        return Ok(provider);
    };

    let wanted: Vec<String> = list
        .split([':', ','])
        .map(|name| name.trim().to_ascii_uppercase())
        .filter(|name| !name.is_empty())
        .collect();
    provider
        .cipher_suites
        .retain(|suite| wanted.contains(&format!("{:?}", suite.suite()).to_ascii_uppercase()));

    if provider.cipher_suites.is_empty() {
        return Err(tls_error(format!("no supported cipher suites in {list:?}")));
    }
    Ok(provider)
}

/// Maps a version spelling (`TLSv1_2`, `TLSv1.3`, `1.2`, `SSLv3`, ...) onto
/// `major * 10 + minor` of the TLS version number.
fn parse_version(text: &str) -> Result<u8, ConfigurationError> {
    let lower = text.trim().to_ascii_lowercase();
    let is_ssl = lower.starts_with("ssl");
    let digits: String = lower.chars().filter(char::is_ascii_digit).collect();
    let version = match (is_ssl, digits.as_str()) {
        (true, "2") => 2,
        (true, "3") => 3,
        (false, "1" | "10") => 10,
        (false, "11") => 11,
        (false, "12") => 12,
        (false, "13") => 13,
        _ => return Err(tls_error(format!("unknown protocol version {text:?}"))),
    };
    Ok(version)
}

fn protocol_versions(
    options: &TlsOptions,
) -> Result<Vec<&'static SupportedProtocolVersion>, ConfigurationError> {
    let knob_version = |knob: TlsKnob| options.get(knob).map(parse_version).transpose();

    let (min, max) = match knob_version(TlsKnob::SslVersion)? {
        Some(exact) => (exact, exact),
        None => (
            knob_version(TlsKnob::SslMinVersion)?.unwrap_or(12),
            knob_version(TlsKnob::SslMaxVersion)?.unwrap_or(13),
        ),
    };

    let versions: Vec<&'static SupportedProtocolVersion> = [
        (12, &rustls::version::TLS12),
        (13, &rustls::version::TLS13),
    ]
    .into_iter()
    .filter(|(number, _)| (min..=max).contains(number))
    .map(|(_, version)| version)
    .collect();

    if versions.is_empty() {
        return Err(tls_error(format!(
            "no supported protocol version between {min} and {max} (only TLS 1.2 and 1.3)"
        )));
    }
    Ok(versions)
}

fn root_store(options: &TlsOptions) -> Result<RootCertStore, ConfigurationError> {
    let mut roots = RootCertStore::empty();
    let ca_file = options.get(TlsKnob::SslCaFile);
    let ca_path = options.get(TlsKnob::SslCaPath);

    if ca_file.is_none() && ca_path.is_none() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        return Ok(roots);
    }

    if let Some(file) = ca_file {
        for cert in load_certificates(Path::new(file))? {
            roots
                .add(cert)
                .map_err(|e| tls_error(format!("CA certificate in {file}: {e}")))?;
        }
    }

    if let Some(dir) = ca_path {
        let entries =
            std::fs::read_dir(dir).map_err(|e| tls_error(format!("reading CA path {dir}: {e}")))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            // Directories like /etc/ssl/certs hold unrelated files too
            match load_certificates(&path) {
                Ok(certs) => {
                    let (added, ignored) = roots.add_parsable_certificates(certs);
                    debug!(
                        "Loaded {added} CA certificate(s) from {} ({ignored} ignored)",
                        path.display()
                    );
                }
                Err(e) => debug!("Skipping {}: {e}", path.display()),
            }
        }
    }

    if roots.is_empty() {
        return Err(tls_error("no CA certificates found"));
    }
    Ok(roots)
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigurationError> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| tls_error(format!("reading {}: {e:?}", path.display())))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(format!("parsing {}: {e:?}", path.display())))?;

    if certs.is_empty() {
        return Err(tls_error(format!("no certificates in {}", path.display())));
    }
    Ok(certs)
}

/// Parses `sha256//<base64>` pins separated by `;`.
fn parse_pins(pins: &str) -> Result<Vec<[u8; 32]>, ConfigurationError> {
    pins.split(';')
        .map(str::trim)
        .filter(|pin| !pin.is_empty())
        .map(|pin| {
            let encoded = pin
                .strip_prefix("sha256//")
                .ok_or_else(|| tls_error(format!("pinned key {pin:?} must start with sha256//")))?;
            let decoded = BASE64
                .decode(encoded)
                .map_err(|e| tls_error(format!("pinned key {pin:?}: {e}")))?;
            <[u8; 32]>::try_from(decoded.as_slice())
                .map_err(|_| tls_error(format!("pinned key {pin:?} is not a SHA-256 hash")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;
    use std::io::Write;

    fn options(pairs: &[(TlsKnob, &str)]) -> TlsOptions {
        pairs
            .iter()
            .fold(TlsOptions::default(), |opts, (knob, value)| opts.with(*knob, *value))
    }

    #[test]
    fn test_default_options_build() {
        let opts = TlsOptions::from_node_config(None, &ProbeConfig::default()).unwrap();
        assert!(client_config(&opts).is_ok());
    }

    #[test]
    fn test_parse_version_spellings() {
        assert_eq!(parse_version("TLSv1_2").unwrap(), 12);
        assert_eq!(parse_version("TLSv1.3").unwrap(), 13);
        assert_eq!(parse_version("1.2").unwrap(), 12);
        assert_eq!(parse_version("TLSv1").unwrap(), 10);
        assert_eq!(parse_version("SSLv3").unwrap(), 3);
        assert!(parse_version("QUIC").is_err());
    }

    #[test]
    fn test_version_range_is_clamped_to_supported_versions() {
        let opts = options(&[(TlsKnob::SslMinVersion, "TLSv1")]);
        assert_eq!(protocol_versions(&opts).unwrap().len(), 2);

        let opts = options(&[(TlsKnob::SslVersion, "TLSv1_3")]);
        let versions = protocol_versions(&opts).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_3);

        let opts = options(&[(TlsKnob::SslMaxVersion, "TLSv1_1")]);
        assert!(protocol_versions(&opts).is_err());
    }

    #[test]
    fn test_cipher_selection() {
        let opts = options(&[(TlsKnob::SslCiphers, "tls13_aes_256_gcm_sha384:BOGUS")]);
        let provider = crypto_provider(&opts).unwrap();
        assert_eq!(provider.cipher_suites.len(), 1);

        let opts = options(&[(TlsKnob::SslCiphers, "ECDHE-RSA-RC4-SHA")]);
        assert!(matches!(
            crypto_provider(&opts),
            Err(ConfigurationError::Tls(_))
        ));
    }

    #[test]
    fn test_parse_pins() {
        let hash = [7u8; 32];
        let pin = format!("sha256//{}", BASE64.encode(hash));
        let pins = parse_pins(&format!("{pin}; {pin}")).unwrap();
        assert_eq!(pins, vec![hash, hash]);

        assert!(parse_pins("md5//abcd").is_err());
        assert!(parse_pins("sha256//not-base64!").is_err());
        assert!(parse_pins(&format!("sha256//{}", BASE64.encode([1u8; 16]))).is_err());
    }

    #[test]
    fn test_ca_file_is_loaded() {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(certified.cert.pem().as_bytes()).unwrap();

        let opts = options(&[(TlsKnob::SslCaFile, file.path().to_str().unwrap())]);
        assert_eq!(root_store(&opts).unwrap().len(), 1);
        assert!(client_config(&opts).is_ok());
    }

    #[test]
    fn test_missing_ca_file_is_a_configuration_error() {
        let opts = options(&[(TlsKnob::SslCaFile, "/nonexistent/ca.pem")]);
        assert!(matches!(
            client_config(&opts),
            Err(ConfigurationError::Tls(_))
        ));
    }

    #[test]
    fn test_missing_ca_file_is_ignored_without_peer_verification() {
        let opts = options(&[
            (TlsKnob::SslCaFile, "/nonexistent/ca.pem"),
            (TlsKnob::SslVerifypeer, "false"),
        ]);
        assert!(client_config(&opts).is_ok());
    }

    #[test]
    fn test_cert_without_key_is_rejected() {
        let opts = options(&[(TlsKnob::SslCert, "/tmp/client.pem")]);
        assert!(client_config(&opts).is_err());
    }

    #[test]
    fn test_client_certificate_is_loaded() {
        let certified = rcgen::generate_simple_self_signed(vec!["client".to_string()]).unwrap();
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        cert.write_all(certified.cert.pem().as_bytes()).unwrap();
        let mut key = tempfile::NamedTempFile::new().unwrap();
        key.write_all(certified.key_pair.serialize_pem().as_bytes()).unwrap();

        let opts = options(&[
            (TlsKnob::SslCert, cert.path().to_str().unwrap()),
            (TlsKnob::SslKey, key.path().to_str().unwrap()),
        ]);
        assert!(client_config(&opts).unwrap().client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn test_cache_reuses_configs_for_equal_options() {
        let defaults = ProbeConfig::default();
        let opts = TlsOptions::from_node_config(None, &defaults).unwrap();
        let lax = TlsOptions::from_node_config(None, &defaults.with_verify_peer(false)).unwrap();

        let mut cache = TlsConfigCache::new();
        let first = cache.get_or_build(&opts).unwrap();
        let second = cache.get_or_build(&opts.clone()).unwrap();
        cache.get_or_build(&lax).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 2);
    }
}
