pub mod backend;
pub mod error;
pub mod events;
pub mod hooks;
pub mod mock;
pub mod process;
pub mod prompt;
pub mod turn;
pub mod types;

pub use backend::LlmBackend;
pub use error::{BackendError, Result};
pub use hooks::ArchivalHook;
pub use mock::MockBackend;
pub use process::{ProcessBackend, SharedBackend};
pub use prompt::PromptBuilder;
pub use turn::{AgentCoordinator, TurnSignal};
pub use types::{
    Attachment, BackendEvent, BackendMessage, ProgressEvent, PromptPart, RunTurnInput,
    RunTurnOutput, ToolCallRecord, ToolDescriptor,
};
