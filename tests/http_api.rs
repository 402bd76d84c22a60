mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::{pcm, relay, wait_clients, wait_removed};

async fn send(relay: &common::Relay, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    relay.server.router().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Read body frames until at least `len` bytes arrived
async fn read_bytes(body: &mut Body, len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while out.len() < len {
        let frame = body.frame().await.unwrap().unwrap();
        out.extend_from_slice(&frame.into_data().unwrap());
    }
    out
}

#[tokio::test]
async fn test_container_stream_relays_bytes() {
    let relay = relay();
    let response = send(&relay, Method::GET, "/api/play/QRR").await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "audio/aac");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::CONNECTION], "keep-alive");
    assert_eq!(headers[header::ACCEPT_RANGES], "none");
    assert_eq!(headers["icy-name"], "Radiko - QRR");
    assert_eq!(headers["icy-genre"], "Radio");

    wait_clients(relay.server.container_registry(), "QRR", 1).await;
    let feed = relay.transcoder.last_feed().unwrap();
    assert!(feed.write(b"adts-bytes").await);

    let mut body = response.into_body();
    assert_eq!(read_bytes(&mut body, 10).await, b"adts-bytes");
}

#[tokio::test]
async fn test_listeners_share_one_transcoder() {
    let relay = relay();

    let first = send(&relay, Method::GET, "/api/play/QRR").await;
    let second = send(&relay, Method::GET, "/api/play/QRR").await;
    let third = send(&relay, Method::GET, "/api/play/QRR").await;
    wait_clients(relay.server.container_registry(), "QRR", 3).await;

    assert_eq!(relay.transcoder.spawns(), 1);
    assert_eq!(relay.directory.auth_calls(), 1);

    let feed = relay.transcoder.last_feed().unwrap();
    assert!(feed.write(b"shared").await);

    for response in [first, second, third] {
        let mut body = response.into_body();
        assert_eq!(read_bytes(&mut body, 6).await, b"shared");
    }
}

#[tokio::test]
async fn test_pcm_stream_headers_and_alignment() {
    let relay = relay();
    let response = send(&relay, Method::GET, "/api/play/FMJ/pcm").await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "audio/L16;rate=48000;channels=2");
    assert_eq!(headers["x-audio-format"], "s16le");
    assert_eq!(headers["x-sample-rate"], "48000");
    assert_eq!(headers["x-channels"], "2");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");

    wait_clients(relay.server.pcm_registry(), "FMJ", 1).await;
    let feed = relay.transcoder.last_feed().unwrap();
    let samples = pcm(&[100, -100, 200, -200]);

    // Three bytes is less than a frame; nothing may go out yet
    assert!(feed.write(&samples[..3]).await);
    assert!(feed.write(&samples[3..]).await);

    let mut body = response.into_body();
    let received = read_bytes(&mut body, samples.len()).await;
    assert_eq!(received, samples);
}

#[tokio::test]
async fn test_head_returns_headers_without_starting_a_stream() {
    let relay = relay();
    let response = send(&relay, Method::HEAD, "/api/play/QRR").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/aac");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "none");
    assert_eq!(response.headers()["icy-name"], "Radiko - QRR");
    assert_eq!(relay.transcoder.spawns(), 0);
}

#[tokio::test]
async fn test_options_lists_allowed_methods() {
    let relay = relay();
    let response = send(&relay, Method::OPTIONS, "/api/play/QRR").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ALLOW], "GET, HEAD, OPTIONS");
    assert_eq!(relay.transcoder.spawns(), 0);
}

#[tokio::test]
async fn test_other_methods_are_rejected() {
    let relay = relay();

    let response = send(&relay, Method::POST, "/api/play/QRR").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_text(response).await, "Method not allowed");

    for method in [Method::HEAD, Method::POST, Method::DELETE] {
        let response = send(&relay, method, "/api/play/QRR/pcm").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    assert_eq!(relay.transcoder.spawns(), 0);
}

#[tokio::test]
async fn test_setup_failure_is_500_with_reason() {
    let relay = relay();
    relay.directory.set_token("");

    let response = send(&relay, Method::GET, "/api/play/QRR").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("empty auth token"));
    assert_eq!(relay.transcoder.spawns(), 0);
    assert_eq!(relay.server.container_registry().stream_count().await, 0);
}

#[tokio::test]
async fn test_unknown_station_is_500() {
    let relay = relay();
    relay.directory.forget_station("XXX");

    let response = send(&relay, Method::GET, "/api/play/XXX/pcm").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("failed to get area ID"));
}

#[tokio::test]
async fn test_status_reports_both_profiles() {
    let relay = relay();

    let empty = send(&relay, Method::GET, "/api/status").await;
    assert_eq!(empty.status(), StatusCode::OK);
    assert_eq!(body_text(empty).await, "{}");

    let _qrr_a = send(&relay, Method::GET, "/api/play/QRR").await;
    let _qrr_b = send(&relay, Method::GET, "/api/play/QRR").await;
    let _fmj = send(&relay, Method::GET, "/api/play/FMJ/pcm").await;
    wait_clients(relay.server.container_registry(), "QRR", 2).await;
    wait_clients(relay.server.pcm_registry(), "FMJ", 1).await;

    let response = send(&relay, Method::GET, "/api/status").await;
    let status: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();

    assert_eq!(
        status,
        serde_json::json!({
            "QRR": { "clients": 2, "running": true },
            "FMJ/pcm": { "clients": 1, "running": true },
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_last_listener_leaving_stops_after_grace() {
    let relay = relay();
    let registry = relay.server.container_registry();

    let response = send(&relay, Method::GET, "/api/play/QRR").await;
    wait_clients(registry, "QRR", 1).await;

    drop(response);
    wait_clients(registry, "QRR", 0).await;
    assert_eq!(relay.transcoder.stops(), 0);

    // A listener returning inside the window reuses the process
    let again = send(&relay, Method::GET, "/api/play/QRR").await;
    wait_clients(registry, "QRR", 1).await;
    assert_eq!(relay.transcoder.spawns(), 1);

    drop(again);
    wait_clients(registry, "QRR", 0).await;
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(relay.transcoder.stops(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    wait_removed(registry, "QRR").await;
    assert_eq!(relay.transcoder.stops(), 1);

    // After the stream is gone a new request starts a new process
    let _fresh = send(&relay, Method::GET, "/api/play/QRR").await;
    wait_clients(registry, "QRR", 1).await;
    assert_eq!(relay.transcoder.spawns(), 2);
}

#[tokio::test]
async fn test_stream_end_finishes_response_bodies() {
    let relay = relay();
    let response = send(&relay, Method::GET, "/api/play/QRR").await;
    wait_clients(relay.server.container_registry(), "QRR", 1).await;

    relay.transcoder.last_feed().unwrap().close().await;

    let mut body = response.into_body();
    while let Some(frame) = body.frame().await {
        frame.unwrap();
    }
    wait_removed(relay.server.container_registry(), "QRR").await;
}
