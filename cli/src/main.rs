//! One-shot CLI: runs a single chat turn through the phase engine
//! in-process against a [`orchestrator_core::MockLlmProvider`] (spec §1 --
//! "local one-shot invocation binary for manual testing"), printing the
//! event stream to stdout as it arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use orchestrator_core::{DevServerRegistry, EventBus, MockLlmProvider, PhaseEngine, PipelineContext, PipelineDeps};
use plan_spec::{ClientMessage, Role};

#[derive(Parser, Debug)]
#[command(name = "orchestrator-cli")]
#[command(about = "Run one chat turn through the orchestrator pipeline")]
struct Args {
    /// User message (or pass as trailing positional words)
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,

    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,

    /// Session id; a fresh one is generated when omitted
    #[arg(long, value_name = "ID")]
    session_id: Option<String>,

    /// Directory sessions are scaffolded under (default: a process-scoped temp dir)
    #[arg(long, value_name = "DIR")]
    workspace_root: Option<PathBuf>,

    /// Print each raw event as one JSON line instead of a human summary
    #[arg(long)]
    json: bool,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_and_apply("orchestrator", None::<&std::path::Path>).ok();
    init_logging();

    let args = Args::parse();
    tracing::info!("orchestrator-cli starting up");

    let message = args
        .message
        .or_else(|| if args.rest.is_empty() { None } else { Some(args.rest.join(" ")) });
    let Some(message) = message else {
        eprintln!("orchestrator-cli: provide a message via -m/--message or trailing args");
        std::process::exit(1);
    };

    let app_config = config::AppConfig::from_env();
    let workspace_root = args.workspace_root.unwrap_or(app_config.workspace_root);
    let store = Arc::new(workspace::Store::new(workspace_root));
    let deps = PipelineDeps {
        store: store.clone(),
        serializer: Arc::new(workspace::PerFileSerializer::new()),
        llm: Arc::new(MockLlmProvider::default()),
        policy: app_config.policy(),
        dev_servers: Arc::new(DevServerRegistry::new(app_config.dev_server_port_base)),
    };

    let session_id = args.session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let ensured = store.ensure(&session_id).await?;

    let (bus, mut rx) = EventBus::new();
    bus.emit(stream_event::ProtocolEvent::Session {
        session_id: session_id.clone(),
    });

    let client_message = ClientMessage {
        id: "m1".to_string(),
        role: Role::User,
        content: message,
        attachments: Vec::new(),
        status: "complete".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    let mut ctx = PipelineContext::new(deps, bus, session_id, ensured.dir, ensured.is_new, vec![client_message]);

    let run = tokio::spawn(async move {
        PhaseEngine::standard().run(&mut ctx).await;
    });

    while let Some(event) = rx.rx.recv().await {
        if args.json {
            println!("{}", serde_json::to_string(&event.to_value()?)?);
        } else if let Some(line) = cli::render_human(&event) {
            println!("{line}");
        }
    }

    run.await?;
    Ok(())
}
