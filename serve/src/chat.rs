//! `POST /api/chat` (spec §6): validates the request, opens an event
//! stream, and runs the phase engine against it in a background task
//! while the response body drains the bus as SSE.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use orchestrator_core::{EventBus, PhaseEngine, PipelineContext};
use plan_spec::{validate_messages, ClientMessage};
use stream_event::ProtocolEvent;

use crate::app::AppState;

#[derive(Deserialize)]
pub(crate) struct ChatRequest {
    messages: Vec<ClientMessage>,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

#[derive(serde::Serialize)]
struct ValidationErrorBody {
    error: String,
}

pub(crate) async fn handle_chat(State(state): State<Arc<AppState>>, Json(body): Json<ChatRequest>) -> Response {
    if let Ok(mut guard) = state.shutdown_tx.lock() {
        if let Some(tx) = guard.take() {
            let _ = tx.send(());
        }
    }

    if let Err(err) = validate_messages(&body.messages) {
        let payload = ValidationErrorBody { error: err.to_string() };
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    }

    let session_id = body
        .session_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let ensured = match state.deps.store.ensure(&session_id).await {
        Ok(ensured) => ensured,
        Err(err) => {
            tracing::error!(session_id = %session_id, error = %err, "workspace ensure failed");
            let payload = ValidationErrorBody {
                error: format!("workspace error: {err}"),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response();
        }
    };

    let (bus, rx) = EventBus::new();
    bus.emit(ProtocolEvent::Session {
        session_id: session_id.clone(),
    });

    let mut ctx = PipelineContext::new(
        state.deps.clone(),
        bus,
        session_id,
        ensured.dir,
        ensured.is_new,
        body.messages,
    );

    tokio::spawn(async move {
        let engine = PhaseEngine::standard();
        engine.run(&mut ctx).await;
        persist_turn(&ctx).await;
    });

    let body_stream = ReceiverStream::new(rx.rx).map(|event| -> Result<axum::body::Bytes, Infallible> {
        match stream_event::to_sse_line(&event) {
            Ok(line) => Ok(axum::body::Bytes::from(line)),
            Err(err) => {
                tracing::error!(error = %err, "failed to frame protocol event");
                Ok(axum::body::Bytes::new())
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to build SSE response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

/// Rewrites `chat_history.json` and `metadata.json` at end-of-turn (spec
/// §6 workspace layout). Best-effort: persistence failures are logged,
/// never surfaced to the client since the event stream has already closed.
async fn persist_turn(ctx: &PipelineContext) {
    let messages: Vec<ClientMessage> = ctx
        .history
        .iter()
        .enumerate()
        .map(|(index, turn)| ClientMessage {
            id: format!("{}-{index}", ctx.session_id),
            role: if turn.role == "assistant" { plan_spec::Role::Assistant } else { plan_spec::Role::User },
            content: turn.content.clone(),
            attachments: Vec::new(),
            status: "complete".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
        .collect();

    if let Err(err) = workspace::write_chat_history(ctx.workspace_dir.join("chat_history.json"), &messages).await {
        tracing::warn!(session_id = %ctx.session_id, error = %err, "failed to persist chat history");
    }

    let title = ctx.plan.as_ref().and_then(|plan| plan.title.clone());
    let metadata_path = ctx.workspace_dir.join("metadata.json");
    let timestamp = chrono::Utc::now().to_rfc3339();
    let metadata = if title.is_some() {
        plan_spec::SessionMetadata {
            id: ctx.session_id.clone(),
            title,
            timestamp,
        }
    } else {
        match workspace::read_metadata(metadata_path.clone()).await {
            Ok(Some(existing)) => existing,
            _ => plan_spec::SessionMetadata {
                id: ctx.session_id.clone(),
                title: None,
                timestamp,
            },
        }
    };
    if let Err(err) = workspace::write_metadata(metadata_path, &metadata).await {
        tracing::warn!(session_id = %ctx.session_id, error = %err, "failed to persist session metadata");
    }
}
