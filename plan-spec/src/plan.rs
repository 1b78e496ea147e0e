//! Execution plan: the orchestrator's parsed intent for one chat turn.

use serde::{Deserialize, Serialize};

/// A single unit of work inside an [`ExecutionPlan`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    Chat {
        content: String,
    },
    CreateFile {
        filepath: String,
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        depends_on: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feeds_into: Option<Vec<String>>,
    },
    EditFile {
        filepath: String,
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        depends_on: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feeds_into: Option<Vec<String>>,
    },
    DeleteFile {
        filepath: String,
    },
    GenerateImage {
        filepath: String,
        prompt: String,
    },
    GitAction {
        command: String,
    },
}

impl Task {
    /// The task's target file, if it mutates one (chat and git_action have none).
    pub fn filepath(&self) -> Option<&str> {
        match self {
            Task::CreateFile { filepath, .. }
            | Task::EditFile { filepath, .. }
            | Task::DeleteFile { filepath }
            | Task::GenerateImage { filepath, .. } => Some(filepath),
            Task::Chat { .. } | Task::GitAction { .. } => None,
        }
    }

    /// Whether this task gets a `TransparencyTask` (every non-chat task does).
    pub fn is_non_chat(&self) -> bool {
        !matches!(self, Task::Chat { .. })
    }

    /// Whether this task writes, edits, deletes, or creates a workspace file.
    /// Used for the Confirm-phase file-count gate and to decide whether
    /// Verify/Deliver's dev-server start apply at all (`git_action` does not
    /// count, matching spec §4.6/§4.10's "file-touching" wording).
    pub fn touches_file(&self) -> bool {
        self.filepath().is_some()
    }

    /// Short human-readable description used for `TransparencyTask::description`.
    pub fn describe(&self) -> String {
        match self {
            Task::Chat { .. } => "Respond".to_string(),
            Task::CreateFile { filepath, .. } => format!("Create {filepath}"),
            Task::EditFile { filepath, .. } => format!("Edit {filepath}"),
            Task::DeleteFile { filepath } => format!("Delete {filepath}"),
            Task::GenerateImage { filepath, .. } => format!("Generate image {filepath}"),
            Task::GitAction { command } => format!("Run {command}"),
        }
    }
}

/// The parsed orchestration plan for one chat turn (spec §3).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumptions: Option<Vec<String>>,
    /// Carried through for transparency passthrough only (spec §9 Open Questions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_decisions: Option<Vec<String>>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ExecutionPlan {
    /// Non-chat tasks in original plan order, used to build transparency tasks.
    pub fn non_chat_tasks(&self) -> impl Iterator<Item = (usize, &Task)> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_non_chat())
    }

    /// Count of tasks that touch a file, used by the Confirm-phase gate.
    pub fn file_touching_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.touches_file()).count()
    }
}
