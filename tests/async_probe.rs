//! The async wrapper used by schedulers running on tokio.

mod helpers;

use std::time::Duration;

use serde_json::json;
use webservice_probe::{probe_async, BatchProber, ErrorType, ProbeConfig};

use helpers::{http_response, nodes, SilentServer, StubServer};

#[tokio::test]
async fn test_probe_async_returns_every_endpoint() {
    let server = StubServer::serve(http_response("200 OK", &[], ""), 1);
    let silent = SilentServer::new();
    let prober = BatchProber::new(ProbeConfig::default().with_timeout(Duration::from_millis(300)));

    let results = probe_async(
        prober,
        nodes(json!({
            "up": { "uri": server.url("/") },
            "hung": { "uri": silent.url() },
            "broken": { "http_method": "GET" },
        })),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results["up"].is_success());
    assert_eq!(results["hung"].error_type(), Some(ErrorType::Timeout));
    assert_eq!(results["broken"].error_type(), Some(ErrorType::Configuration));
    server.requests();
}

#[tokio::test(flavor = "current_thread")]
async fn test_probe_async_does_not_block_the_runtime() {
    let silent = SilentServer::new();
    let prober = BatchProber::new(ProbeConfig::default().with_timeout(Duration::from_millis(400)));
    let batch = probe_async(prober, nodes(json!({ "hung": { "uri": silent.url() } })));

    // A timer on the same single-threaded runtime still fires while the batch runs
    let ticker = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::time::Instant::now()
    };
    let (results, ticked_at) = tokio::join!(batch, ticker);
    let finished_at = std::time::Instant::now();

    assert_eq!(results.unwrap()["hung"].error_type(), Some(ErrorType::Timeout));
    assert!(finished_at.duration_since(ticked_at) >= Duration::from_millis(200));
}
