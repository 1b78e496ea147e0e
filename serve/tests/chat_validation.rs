//! Validation happens before any event stream opens (spec §8 scenario 1):
//! a malformed request gets a plain `400` JSON body, never SSE framing.

mod common;

use std::sync::Arc;

use orchestrator_core::MockLlmProvider;

#[tokio::test]
async fn empty_content_is_rejected_before_streaming() {
    let (url, server_handle, _workspace) = common::spawn_server_once(Arc::new(MockLlmProvider::default())).await;

    let body = serde_json::json!({
        "messages": [{
            "id": "m1",
            "role": "user",
            "content": "",
            "attachments": [],
            "status": "complete",
            "timestamp": "2026-01-01T00:00:00Z",
        }],
    });

    let client = reqwest::Client::new();
    let resp = client.post(format!("{url}/api/chat")).json(&body).send().await.unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let is_sse = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap_or_default().contains("event-stream"))
        .unwrap_or(false);
    assert!(!is_sse, "validation failure must not open an SSE stream");

    let json: serde_json::Value = resp.json().await.unwrap();
    eprintln!("[e2e] received: {json}");
    assert!(json["error"].as_str().unwrap().contains("no content"));

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), server_handle).await;
}

#[tokio::test]
async fn malformed_json_body_is_rejected() {
    let (url, server_handle, _workspace) = common::spawn_server_once(Arc::new(MockLlmProvider::default())).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{url}/api/chat"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("not valid json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), server_handle).await;
}
