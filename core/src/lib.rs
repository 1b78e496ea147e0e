//! Phased pipeline engine: intent classification, plan generation,
//! concurrent task dispatch, verification, self-repair, and delivery (spec
//! §2). Everything outside this crate (browser client, LLM provider, file
//! loaders, HTTP shell) is a collaborator the core only consumes through a
//! narrow interface.

pub mod dev_server;
pub mod error;
pub mod events;
pub mod executor;
pub mod llm;
pub mod parsing;
pub mod phase;
pub mod pipeline;
pub mod preflight;
pub mod subprocess;
pub mod verify;

pub use dev_server::{DevServerHandle, DevServerRegistry};
pub use error::PipelineError;
pub use events::EventBus;
pub use executor::Executor;
pub use llm::{LLMProvider, LlmMessage, MockLlmProvider};
pub use phase::{Phase, PhaseEngine, PhaseResult};
pub use pipeline::{PipelineContext, PipelineDeps};
