//! Shared data-model types for the orchestrator: chat messages, execution
//! plans, PM specs, transparency projections, file/git results, and
//! verification output. No logic beyond small invariant helpers lives here;
//! the phases that produce and consume these types live in `core`.

pub mod file_action;
pub mod git_result;
pub mod message;
pub mod plan;
pub mod pm_spec;
pub mod session;
pub mod transparency;
pub mod verification;

pub use file_action::{filename_and_language, FileAction, FileActionEvent, FileActionStatus};
pub use git_result::GitResultEvent;
pub use message::{
    validate_messages, Attachment, AttachmentKind, ClientMessage, MessageValidationError, Role,
    MAX_CONTENT_CHARS, MAX_MESSAGES,
};
pub use plan::{ExecutionPlan, Task};
pub use pm_spec::{DesignSpec, PmSpec, ScopeSpec};
pub use session::SessionMetadata;
pub use transparency::{TaskStatus, TransparencyTask};
pub use verification::{LintFileResult, VerificationErrors};
