//! Scenario: HTTP scale bridge adapter
//!
//! # Invariants under test (local mock server, no real scale)
//!
//! 1. An indicator frame in `weight` is parsed to kilograms.
//! 2. A numeric `weight` is taken as-is.
//! 3. Non-2xx responses surface as `ReadError::Status`.
//! 4. An unparseable frame surfaces as `ReadError::Malformed`.
//! 5. A bridge slower than the per-call timeout surfaces as `ReadError::Timeout`.
//! 6. A refused connection surfaces as `ReadError::Connection`.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use wv_scale::{HttpScaleSource, ReadError, WeightSource};

fn source(server: &MockServer) -> HttpScaleSource {
    HttpScaleSource::new(server.url("/scale/read"), Duration::from_millis(500))
}

#[tokio::test]
async fn frame_weight_is_parsed() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/scale/read");
            then.status(200).json_body(json!({
                "weight": "ST,NT, 9,    2.55 kg",
                "status": "ok",
                "timestamp": "2026-10-18T08:00:00Z"
            }));
        })
        .await;

    let reading = source(&server).read().await.unwrap();
    assert_eq!(reading.weight, 2.55);
    m.assert_async().await;
}

#[tokio::test]
async fn numeric_weight_is_accepted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/scale/read");
            then.status(200).json_body(json!({ "weight": 0.54 }));
        })
        .await;

    let reading = source(&server).read().await.unwrap();
    assert_eq!(reading.weight, 0.54);
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/scale/read");
            then.status(503).body("serial port busy");
        })
        .await;

    let err = source(&server).read().await.unwrap_err();
    assert_eq!(err, ReadError::Status { code: 503 });
}

#[tokio::test]
async fn unparseable_frame_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/scale/read");
            then.status(200).json_body(json!({ "weight": "OL" }));
        })
        .await;

    let err = source(&server).read().await.unwrap_err();
    assert!(matches!(err, ReadError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_bridge_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/scale/read");
            then.status(200)
                .json_body(json!({ "weight": 2.5 }))
                .delay(Duration::from_millis(1500));
        })
        .await;

    let err = source(&server).read().await.unwrap_err();
    assert_eq!(err, ReadError::Timeout { after_ms: 500 });
}

#[tokio::test]
async fn refused_connection_maps_to_connection_error() {
    // Port 9 (discard) on loopback is not expected to accept HTTP.
    let src = HttpScaleSource::new("http://127.0.0.1:9/scale/read", Duration::from_millis(500));
    let err = src.read().await.unwrap_err();
    assert!(
        matches!(err, ReadError::Connection(_) | ReadError::Timeout { .. }),
        "got {err:?}"
    );
}
