//! `PipelineContext`: the mutable state threaded through every phase (spec
//! §3), and `PipelineDeps`: the shared, phase-independent collaborators a
//! request needs (workspace store, per-file serializer, LLM provider,
//! policy). Grounded on the teacher's `Runtime<C, S>`
//! (`loom/src/graph/runtime.rs`): a bundle of context/store/stream-writer/
//! config passed by reference into every node, rather than threaded
//! piecemeal through function arguments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use config::PolicyConfig;
use plan_spec::{ClientMessage, ExecutionPlan, FileActionEvent, GitResultEvent, PmSpec, TransparencyTask, VerificationErrors};
use serde_json::Value;
use workspace::{PerFileSerializer, ProjectMemory, Store};

use crate::dev_server::DevServerRegistry;
use crate::events::EventBus;
use crate::llm::LLMProvider;

/// Shared, phase-independent collaborators for one request. Cheap to
/// clone (everything inside is `Arc`); constructed once per server and
/// handed to every request.
#[derive(Clone)]
pub struct PipelineDeps {
    pub store: Arc<Store>,
    pub serializer: Arc<PerFileSerializer>,
    pub llm: Arc<dyn LLMProvider>,
    pub policy: PolicyConfig,
    /// Process-scoped dev-server port allocator (spec §9): constructed
    /// once per server, not per request.
    pub dev_servers: Arc<DevServerRegistry>,
}

/// One LLM-shaped turn (role/content), mirrored from `ClientMessage`
/// history into the shape a provider call expects ("geminiContents" in
/// spec §3 -- the name is generic here since the provider is opaque).
#[derive(Clone, Debug)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

/// Shared mutable state threaded through the phase list for one request
/// (spec §3 `PipelineContext`).
pub struct PipelineContext {
    pub deps: PipelineDeps,
    pub events: EventBus,

    pub session_id: String,
    pub workspace_dir: std::path::PathBuf,
    pub is_new_session: bool,

    pub messages: Vec<ClientMessage>,
    pub history: Vec<HistoryTurn>,

    pub plan: Option<ExecutionPlan>,
    pub pm_spec: Option<PmSpec>,
    pub transparency_tasks: Vec<TransparencyTask>,

    pub existing_files: Vec<String>,
    pub completed_file_actions: Vec<FileActionEvent>,
    pub completed_git_actions: Vec<GitResultEvent>,

    /// One entry per phase visited, in visit order (spec §4.3 "extended
    /// thinking" answers land here too, keyed by phase name).
    pub phase_thoughts: Vec<(String, String)>,

    pub verification_errors: Option<VerificationErrors>,

    pub memory: ProjectMemory,

    pub request_started_at: Instant,

    /// Opaque phase-scratch slots (spec §3): intent classification,
    /// codebase summary, and other values one phase writes for a later
    /// phase to read, without widening this struct for every such value.
    pub scratch: HashMap<String, Value>,

    /// Running count of Repair-loop iterations (`_repairRetryCount` in
    /// spec §4.9/§8 scenario 5).
    pub repair_retry_count: usize,
    /// Error count observed at the end of the previous Verify pass, used
    /// by Repair's regression check.
    pub previous_error_count: Option<usize>,
    /// Snapshot of file contents taken when entering Repair, valid only
    /// until the next clean Verify or Repair exit (spec §3 lifecycle).
    pub file_checkpoint: HashMap<String, String>,
}

impl PipelineContext {
    pub fn new(
        deps: PipelineDeps,
        events: EventBus,
        session_id: String,
        workspace_dir: std::path::PathBuf,
        is_new_session: bool,
        messages: Vec<ClientMessage>,
    ) -> Self {
        let history = messages
            .iter()
            .map(|m| HistoryTurn {
                role: match m.role {
                    plan_spec::Role::User => "user".to_string(),
                    plan_spec::Role::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();
        Self {
            deps,
            events,
            session_id,
            workspace_dir,
            is_new_session,
            messages,
            history,
            plan: None,
            pm_spec: None,
            transparency_tasks: Vec::new(),
            existing_files: Vec::new(),
            completed_file_actions: Vec::new(),
            completed_git_actions: Vec::new(),
            phase_thoughts: Vec::new(),
            verification_errors: None,
            memory: ProjectMemory::new(),
            request_started_at: Instant::now(),
            scratch: HashMap::new(),
            repair_retry_count: 0,
            previous_error_count: None,
            file_checkpoint: HashMap::new(),
        }
    }

    /// The last user message's content, or empty string if none (Understand
    /// operates on this; spec §4.3).
    pub fn last_user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, plan_spec::Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.request_started_at.elapsed().as_millis() as u64
    }

    pub fn scratch_str(&self, key: &str) -> Option<String> {
        self.scratch.get(key).and_then(|v| v.as_str()).map(str::to_string)
    }

    pub fn set_scratch(&mut self, key: &str, value: impl Into<Value>) {
        self.scratch.insert(key.to_string(), value.into());
    }
}
