//! The end-of-batch summary line.
//!
//! Kept in its own test binary: it installs a capturing logger for the
//! whole process.

mod helpers;

use std::sync::Mutex;
use std::time::Duration;

use log::{LevelFilter, Log, Metadata, Record};
use serde_json::json;
use webservice_probe::{BatchProber, ErrorType, ProbeConfig};

use helpers::{http_response, nodes, StubServer};

static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("webservice_probe")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            CAPTURED.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

fn summary_lines() -> Vec<String> {
    CAPTURED
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with("Probed "))
        .cloned()
        .collect()
}

#[test]
fn test_summary_counts_rejected_nodes() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let server = StubServer::serve(http_response("200 OK", &[], ""), 1);
    let prober = BatchProber::new(ProbeConfig::default().with_timeout(Duration::from_secs(5)));
    let results = prober
        .probe_nodes(&nodes(json!({
            "web": { "uri": server.url("/") },
            "ftp": { "uri": "ftp://10.1.1.1/" },
        })))
        .unwrap();
    assert_eq!(results.len(), 2);

    let lines = summary_lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].starts_with("Probed 2 endpoint(s)"), "{}", lines[0]);
    assert!(lines[0].contains("1 succeeded, 1 failed"), "{}", lines[0]);
    assert!(
        lines[0].contains(&format!("{}: 1", ErrorType::Configuration)),
        "{}",
        lines[0]
    );
}
