//! Axum app: state and router. `AppState` bundles the pipeline's shared
//! collaborators (spec §9 Design Notes: these must be process-scoped and
//! passed in at construction rather than implicit) plus the teacher's
//! `shutdown_tx` once-mode hook, used only by tests.

use axum::{routing::{get, post}, Router};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use orchestrator_core::{LLMProvider, PipelineDeps};

use super::chat::handle_chat;

/// Shared server state, constructed once per process and cloned (cheaply,
/// everything inside is `Arc`) into every request.
#[derive(Clone)]
pub struct AppState {
    pub(crate) deps: PipelineDeps,
    /// When set, the handler sends on this once it starts serving a
    /// request, so `run_serve_on_listener`'s `once` mode can shut the
    /// listener down after a single connection (test harness only).
    pub(crate) shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    /// Builds server state from process configuration (spec §9), wiring in
    /// the caller-supplied LLM provider -- the one collaborator this crate
    /// never constructs itself (spec §1 Non-goals: "does not implement its
    /// own LLM").
    pub fn new(app_config: &config::AppConfig, llm: Arc<dyn LLMProvider>) -> Self {
        let store = Arc::new(workspace::Store::new(app_config.workspace_root.clone()));
        let deps = PipelineDeps {
            store,
            serializer: Arc::new(workspace::PerFileSerializer::new()),
            llm,
            policy: app_config.policy(),
            dev_servers: Arc::new(orchestrator_core::DevServerRegistry::new(app_config.dev_server_port_base)),
        };
        Self {
            deps,
            shutdown_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Arms the once-mode shutdown hook; `router`'s handler fires it on
    /// the first request it serves.
    pub fn with_shutdown_on_first_request(mut self, shutdown_tx: oneshot::Sender<()>) -> Self {
        self.shutdown_tx = Arc::new(Mutex::new(Some(shutdown_tx)));
        self
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Liveness probe. Not in spec §6's endpoint table, but conventional for
/// the teacher's `serve` binary and harmless to carry.
async fn healthz() -> &'static str {
    "ok"
}
