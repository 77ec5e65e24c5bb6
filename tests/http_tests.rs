// Integration tests for the HTTP control surface

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use mic_relay::http::ControlsResponse;
use mic_relay::{create_router, AppState, Capability, RelayMode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn router(h: &Harness) -> Router {
    create_router(AppState::new(Arc::clone(&h.controller)))
}

async fn call(app: &Router, method: &str, uri: &str) -> Result<(StatusCode, Vec<u8>)> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, body.to_vec()))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let app = router(&one_second(RelayMode::Framed, Some(6)));

    let (status, body) = call(&app, "GET", "/health").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    Ok(())
}

#[tokio::test]
async fn test_controls_follow_recording_state() -> Result<()> {
    let h = one_second(RelayMode::Framed, Some(6));
    let app = router(&h);

    let (status, body) = call(&app, "GET", "/controls").await?;
    assert_eq!(status, StatusCode::OK);
    let controls: ControlsResponse = serde_json::from_slice(&body)?;
    assert_eq!(controls.state, "idle");
    assert!(controls.start_recording.enabled);
    assert!(!controls.stop_recording.enabled);

    let (status, body) = call(&app, "POST", "/controls/start-recording").await?;
    assert_eq!(status, StatusCode::OK);
    let started: Value = serde_json::from_slice(&body)?;
    assert_eq!(started["status"], "recording");
    assert_eq!(started["controls"]["start-recording"]["enabled"], false);
    assert_eq!(started["controls"]["stop-recording"]["enabled"], true);

    let (_, body) = call(&app, "GET", "/controls").await?;
    let controls: ControlsResponse = serde_json::from_slice(&body)?;
    assert_eq!(controls.state, "recording");
    assert!(!controls.start_recording.enabled);
    assert!(controls.stop_recording.enabled);

    let (status, body) = call(&app, "POST", "/controls/stop-recording").await?;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body)?;
    assert_eq!(report["stats"]["chunks_count"], 2);
    assert_eq!(report["stats"]["settings"]["relay_mode"], "framed");

    let (_, body) = call(&app, "GET", "/controls").await?;
    let controls: ControlsResponse = serde_json::from_slice(&body)?;
    assert_eq!(controls.state, "idle");
    assert!(controls.start_recording.enabled);

    Ok(())
}

#[tokio::test]
async fn test_session_endpoint_reports_active_session() -> Result<()> {
    let h = one_second(RelayMode::Buffering, None);
    let app = router(&h);

    let (status, _) = call(&app, "GET", "/session").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, "POST", "/controls/start-recording").await?;
    let started: Value = serde_json::from_slice(&body)?;

    let (status, body) = call(&app, "GET", "/session").await?;
    assert_eq!(status, StatusCode::OK);
    let stats: Value = serde_json::from_slice(&body)?;
    assert_eq!(stats["session_id"], started["session_id"]);
    assert_eq!(stats["is_recording"], true);

    call(&app, "POST", "/controls/stop-recording").await?;

    let (status, _) = call(&app, "GET", "/session").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_invalid_transitions_conflict() -> Result<()> {
    let h = one_second(RelayMode::Raw, None);
    let app = router(&h);

    let (status, body) = call(&app, "POST", "/controls/stop-recording").await?;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: Value = serde_json::from_slice(&body)?;
    assert!(error["error"].as_str().unwrap().contains("idle"));

    call(&app, "POST", "/controls/start-recording").await?;
    let (status, _) = call(&app, "POST", "/controls/start-recording").await?;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&app, "POST", "/controls/stop-recording").await?;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_capture_is_reported() -> Result<()> {
    let h = harness(
        session_config(RelayMode::Framed, None),
        Capability::Unsupported {
            reason: "no audio input device".to_string(),
        },
        fake_backends(frames(10, 100)),
        Some(6),
        RecordingTransport::default(),
    );
    let app = router(&h);

    let (status, body) = call(&app, "GET", "/capability").await?;
    assert_eq!(status, StatusCode::OK);
    let capability: Value = serde_json::from_slice(&body)?;
    assert_eq!(capability["status"], "unsupported");
    assert_eq!(capability["reason"], "no audio input device");

    let (status, _) = call(&app, "POST", "/controls/start-recording").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, body) = call(&app, "GET", "/controls").await?;
    let controls: ControlsResponse = serde_json::from_slice(&body)?;
    assert!(controls.start_recording.enabled);
    assert!(!controls.stop_recording.enabled);

    Ok(())
}

#[tokio::test]
async fn test_denied_microphone_is_forbidden() -> Result<()> {
    let h = harness(
        session_config(RelayMode::Framed, None),
        supported(),
        denied_backends(),
        Some(6),
        RecordingTransport::default(),
    );
    let app = router(&h);

    let (status, body) = call(&app, "POST", "/controls/start-recording").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let error: Value = serde_json::from_slice(&body)?;
    assert!(error["error"].as_str().unwrap().contains("denied"));

    let (status, _) = call(&app, "GET", "/capability").await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_session_endpoint_answers_during_stop() -> Result<()> {
    let h = harness(
        session_config(RelayMode::FullSegment, None),
        supported(),
        fake_backends(frames(10, 100)),
        None,
        RecordingTransport::gated(),
    );
    let app = router(&h);

    call(&app, "POST", "/controls/start-recording").await?;

    let stop_app = app.clone();
    let stopping =
        tokio::spawn(async move { call(&stop_app, "POST", "/controls/stop-recording").await });
    tokio::time::timeout(Duration::from_secs(5), h.transport.wait_for_send()).await?;

    let (status, _) =
        tokio::time::timeout(Duration::from_secs(1), call(&app, "GET", "/session")).await??;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.transport.release(1);
    let (status, _) = stopping.await??;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}
