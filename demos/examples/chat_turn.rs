//! Runs one full chat-only turn through the standard phase list against a
//! [`MockLlmProvider`] configured to answer with a plan that has no
//! file-touching tasks, so the turn completes without a real LLM or
//! subprocess tools -- just the orchestration itself.
//!
//! Run: `cargo run -p orchestrator-demos --example chat_turn -- "what is this project?"`

use std::env;
use std::sync::Arc;

use orchestrator_core::{DevServerRegistry, EventBus, MockLlmProvider, PhaseEngine, PipelineContext, PipelineDeps};
use plan_spec::{ClientMessage, Role};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let request = env::args().nth(1).unwrap_or_else(|| "explain what this codebase does".to_string());

    let workspace_root = std::env::temp_dir().join("orchestrator-demo-chat-turn");
    let store = Arc::new(workspace::Store::new(workspace_root));
    let session_id = "demo-chat-turn".to_string();
    let ensured = store.ensure(&session_id).await?;

    // "deps already installed" so Plan skips `npm install`, keeping this
    // example dependency-free.
    store.write_file(&session_id, "node_modules/.keep", "").await?;

    let plan_json = serde_json::json!({
        "title": "Answer a question about the project",
        "reasoning": "The request is informational; no files need to change.",
        "tasks": [{"type": "chat", "content": format!(
            "Demo mode (no live LLM): you asked \"{request}\" -- this CLI wires that straight \
             through Understand, Plan, Confirm, Execute, Verify, and Deliver with a plan that \
             carries a single chat task."
        )}],
    });

    let deps = PipelineDeps {
        store: store.clone(),
        serializer: Arc::new(workspace::PerFileSerializer::new()),
        llm: Arc::new(MockLlmProvider::with_json(plan_json.to_string())),
        policy: config::PolicyConfig::default(),
        dev_servers: Arc::new(DevServerRegistry::new(5173)),
    };

    let (bus, mut rx) = EventBus::new();
    let message = ClientMessage {
        id: "m1".to_string(),
        role: Role::User,
        content: request,
        attachments: Vec::new(),
        status: "complete".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    let mut ctx = PipelineContext::new(deps, bus, session_id, ensured.dir, ensured.is_new, vec![message]);

    let run = tokio::spawn(async move {
        PhaseEngine::standard().run(&mut ctx).await;
    });

    while let Some(event) = rx.rx.recv().await {
        let value = event.to_value()?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    run.await?;
    Ok(())
}
