//! Tests for command-line parsing into a probe configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use webservice_probe::config::DEFAULT_USER_AGENT;
use webservice_probe::{LogFormat, LogLevel, Opt, ProbeConfig};

#[test]
fn test_defaults() {
    let opt = Opt::parse_from(["webservice_probe", "nodes.json"]);
    assert_eq!(opt.file, PathBuf::from("nodes.json"));
    assert!(matches!(opt.log_level, LogLevel::Info));
    assert!(matches!(opt.log_format, LogFormat::Plain));
    assert!(!opt.pretty);

    let config = ProbeConfig::from(&opt);
    assert_eq!(config, ProbeConfig::default());
    assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
}

#[test]
fn test_all_options() {
    let opt = Opt::parse_from([
        "webservice_probe",
        "batch.json",
        "--timeout-seconds",
        "0.25",
        "--max-concurrency",
        "8",
        "--no-verify-peer",
        "--user-agent",
        "arborist/1",
        "--log-level",
        "debug",
        "--log-format",
        "json",
        "--pretty",
    ]);
    assert!(matches!(opt.log_level, LogLevel::Debug));
    assert!(matches!(opt.log_format, LogFormat::Json));
    assert!(opt.pretty);

    let config = ProbeConfig::from(&opt);
    assert_eq!(config.timeout, Duration::from_millis(250));
    assert_eq!(config.max_concurrency, Some(8));
    assert!(!config.verify_peer);
    assert_eq!(config.user_agent, "arborist/1");
}

#[test]
fn test_zero_concurrency_means_unbounded() {
    let opt = Opt::parse_from(["webservice_probe", "nodes.json", "--max-concurrency", "0"]);
    assert_eq!(ProbeConfig::from(&opt).max_concurrency, None);
}

#[test]
fn test_negative_timeout_falls_back_to_default() {
    let opt = Opt::parse_from([
        "webservice_probe",
        "nodes.json",
        "--timeout-seconds=-3",
    ]);
    assert_eq!(ProbeConfig::from(&opt).timeout, Duration::from_secs(5));
}

#[test]
fn test_missing_file_is_rejected() {
    assert!(Opt::try_parse_from(["webservice_probe"]).is_err());
    assert!(Opt::try_parse_from(["webservice_probe", "a.json", "--timeout-seconds", "soon"]).is_err());
}
