//! Shared helpers for e2e tests. Received SSE frames are logged with
//! `[e2e] received: ...` -- run tests with `--nocapture` to see them.

use std::sync::Arc;
use std::time::Duration;

use orchestrator_core::LLMProvider;
use plan_spec::{ClientMessage, Role};
use serve::AppState;
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Binds to a random port, spawns the server in once mode, and returns the
/// base URL, the server's join handle, and the workspace tempdir (keep it
/// alive for the duration of the test -- dropping it deletes the sessions
/// the run created on disk).
pub async fn spawn_server_once(
    llm: Arc<dyn LLMProvider>,
) -> (
    String,
    tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
    tempfile::TempDir,
) {
    let workspace_dir = tempfile::tempdir().unwrap();
    let app_config = config::AppConfig {
        workspace_root: workspace_dir.path().to_path_buf(),
        bind_addr: "0.0.0.0:0".to_string(),
        dev_server_port_base: 5173,
    };
    let state = Arc::new(AppState::new(&app_config, llm));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{addr}");
    let server_handle = tokio::spawn(serve::run_serve_on_listener(listener, state, true));
    (url, server_handle, workspace_dir)
}

pub fn user_message(content: &str) -> ClientMessage {
    ClientMessage {
        id: "m1".to_string(),
        role: Role::User,
        content: content.to_string(),
        attachments: Vec::new(),
        status: "complete".to_string(),
        timestamp: "2026-01-01T00:00:00Z".to_string(),
    }
}

/// Reads the whole SSE body and splits it into parsed JSON events. Each
/// record is `data: {json}\n\n` (stream-event's wire framing).
pub async fn collect_sse(resp: reqwest::Response) -> Vec<serde_json::Value> {
    let text = timeout(Duration::from_secs(10), resp.text()).await.expect("sse body timed out").unwrap();
    eprintln!("[e2e] received: {text}");
    text.split("\n\n")
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| {
            let json = chunk.strip_prefix("data: ").unwrap_or(chunk);
            serde_json::from_str(json).unwrap_or_else(|e| panic!("bad sse frame {json:?}: {e}"))
        })
        .collect()
}
