//! Configuration types and CLI options.
//!
//! This module defines the immutable probe configuration threaded into the
//! batch prober, plus the enums and structs used for command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    DEFAULT_HTTP_METHOD, DEFAULT_HTTP_VERSION, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT,
    MAX_RESPONSE_BYTES, POLL_SLICE,
};
use crate::request::HttpMethod;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Process-wide probe defaults, overridable per call.
///
/// This value is immutable once handed to a [`BatchProber`](crate::BatchProber);
/// use the `with_*` methods to derive a modified copy.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use webservice_probe::ProbeConfig;
///
/// let config = ProbeConfig::default()
///     .with_timeout(Duration::from_secs(2))
///     .with_max_concurrency(Some(50));
/// assert!(config.verify_peer);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// Batch deadline used when the caller does not pass one explicitly
    pub timeout: Duration,

    /// Maximum number of connections in flight; `None` starts every endpoint at once
    pub max_concurrency: Option<usize>,

    /// Whether peer certificates are verified when an endpoint doesn't say
    pub verify_peer: bool,

    /// User-Agent header value sent unless an endpoint overrides it
    pub user_agent: String,

    /// HTTP verb used when an endpoint doesn't specify one
    pub default_http_method: HttpMethod,

    /// HTTP version token used when an endpoint doesn't specify one
    pub default_http_version: String,

    /// Upper bound on a single readiness wait
    pub poll_slice: Duration,

    /// Body bytes read before a response is considered complete
    pub max_response_bytes: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_concurrency: None,
            verify_peer: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_http_method: DEFAULT_HTTP_METHOD,
            default_http_version: DEFAULT_HTTP_VERSION.to_string(),
            poll_slice: POLL_SLICE,
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }
}

impl ProbeConfig {
    /// Returns a copy of this configuration with its timeout set to `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Returns a copy of this configuration with a different concurrency limit.
    pub fn with_max_concurrency(&self, max_concurrency: Option<usize>) -> Self {
        Self {
            max_concurrency,
            ..self.clone()
        }
    }

    /// Returns a copy of this configuration with a different verify-peer default.
    pub fn with_verify_peer(&self, verify_peer: bool) -> Self {
        Self {
            verify_peer,
            ..self.clone()
        }
    }
}

/// Command-line options for the `webservice_probe` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "webservice_probe",
    version,
    about = "Probe a batch of web-service endpoints against a single deadline"
)]
pub struct Opt {
    /// JSON file mapping endpoint identifiers to node attributes
    pub file: PathBuf,

    /// Batch deadline in seconds
    #[arg(long, default_value_t = 5.0)]
    pub timeout_seconds: f64,

    /// Maximum number of connections in flight (unbounded when omitted)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Disable peer certificate verification for endpoints that don't set `ssl_verifypeer`
    #[arg(long)]
    pub no_verify_peer: bool,

    /// Override the User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Pretty-print the JSON results
    #[arg(long)]
    pub pretty: bool,
}

impl From<&Opt> for ProbeConfig {
    fn from(opt: &Opt) -> Self {
        let defaults = ProbeConfig::default();
        Self {
            timeout: Duration::try_from_secs_f64(opt.timeout_seconds).unwrap_or(DEFAULT_TIMEOUT),
            max_concurrency: opt.max_concurrency.filter(|limit| *limit > 0),
            verify_peer: !opt.no_verify_peer,
            user_agent: opt.user_agent.clone().unwrap_or(defaults.user_agent),
            ..defaults
        }
    }
}
