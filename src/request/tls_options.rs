//! TLS knob extraction.
//!
//! Only whitelisted knob names are copied out of an endpoint's nested `config`
//! mapping; anything else is ignored. Knobs the caller leaves out fall back to
//! the process-wide defaults when the client configuration is built, except
//! verify-peer, whose default is copied in at extraction time.

use std::collections::BTreeMap;
use std::str::FromStr;

use log::debug;
use serde_json::Value;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::config::ProbeConfig;
use crate::error_handling::ConfigurationError;

/// Recognized TLS knob names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum TlsKnob {
    /// PEM bundle of trusted CA certificates
    SslCaFile,
    /// Directory of PEM CA certificates
    SslCaPath,
    /// PEM client certificate chain
    SslCert,
    /// PEM client private key
    SslKey,
    /// Colon- or comma-separated cipher suite names
    SslCiphers,
    /// Exact protocol version
    SslVersion,
    /// Lowest acceptable protocol version
    SslMinVersion,
    /// Highest acceptable protocol version
    SslMaxVersion,
    /// Whether the peer certificate chain is verified
    SslVerifypeer,
    /// Whether the certificate must match the host name
    SslVerifyhost,
    /// `sha256//<base64>` hashes of acceptable server public keys
    SslPinnedpublickey,
    /// Handshake timeout; accepted but the batch deadline governs
    SslTimeout,
    /// Maximum chain depth; accepted but not enforced
    SslVerifyDepth,
}

impl TlsKnob {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    fn is_flag(&self) -> bool {
        matches!(self, TlsKnob::SslVerifypeer | TlsKnob::SslVerifyhost)
    }
}

/// Sparse set of TLS knobs for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TlsOptions {
    knobs: BTreeMap<TlsKnob, String>,
}

impl TlsOptions {
    /// Extracts the whitelisted knobs from a node's `config` attribute.
    ///
    /// `ssl_verifypeer` is always present afterwards: either the caller's value
    /// or the default from `defaults`.
    pub fn from_node_config(
        config: Option<&Value>,
        defaults: &ProbeConfig,
    ) -> Result<Self, ConfigurationError> {
        let mut options = TlsOptions::default();

        match config {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    let Ok(knob) = TlsKnob::from_str(key) else {
                        debug!("Ignoring unrecognized TLS knob {key:?}");
                        continue;
                    };
                    if let Some(value) = knob_value(knob, value)? {
                        options.knobs.insert(knob, value);
                    }
                }
            }
            Some(other) => {
                return Err(ConfigurationError::InvalidAttribute {
                    key: "config".to_string(),
                    reason: format!("expected a mapping, got {other}"),
                })
            }
        }

        options
            .knobs
            .entry(TlsKnob::SslVerifypeer)
            .or_insert_with(|| defaults.verify_peer.to_string());

        Ok(options)
    }

    pub fn get(&self, knob: TlsKnob) -> Option<&str> {
        self.knobs.get(&knob).map(String::as_str)
    }

    /// Builder-style setter, mostly useful for constructing options by hand.
    pub fn with(mut self, knob: TlsKnob, value: impl Into<String>) -> Self {
        self.knobs.insert(knob, value.into());
        self
    }

    pub fn verify_peer(&self) -> bool {
        self.flag(TlsKnob::SslVerifypeer).unwrap_or(true)
    }

    pub fn verify_host(&self) -> bool {
        self.flag(TlsKnob::SslVerifyhost).unwrap_or(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TlsKnob, &str)> {
        self.knobs.iter().map(|(knob, value)| (*knob, value.as_str()))
    }

    fn flag(&self, knob: TlsKnob) -> Option<bool> {
        self.get(knob).and_then(parse_flag)
    }
}

fn knob_value(knob: TlsKnob, value: &Value) -> Result<Option<String>, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidAttribute {
        key: knob.as_str().to_string(),
        reason,
    };

    let text = match value {
        Value::Null => return Ok(None),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        other => return Err(invalid(format!("expected a scalar, got {other}"))),
    };

    if knob.is_flag() {
        return match parse_knob_flag(knob, &text) {
            Some(flag) => Ok(Some(flag.to_string())),
            None => Err(invalid(format!("expected a boolean, got {text:?}"))),
        };
    }

    Ok(Some(text))
}

/// `ssl_verifyhost` also takes curl's numeric levels, where `2` means on.
fn parse_knob_flag(knob: TlsKnob, value: &str) -> Option<bool> {
    match (knob, value.trim()) {
        (TlsKnob::SslVerifyhost, "2") => Some(true),
        _ => parse_flag(value),
    }
}

/// Parses the boolean spellings configuration files commonly use.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "peer" => Some(true),
        "false" | "no" | "off" | "0" | "none" => Some(false),
        _ => None,
    }
}
