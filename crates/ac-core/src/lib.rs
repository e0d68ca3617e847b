//! Shared types for the agent orchestration core: ids, errors, the data
//! model (sessions, messages, file-history entries, agent profiles).

pub mod error;
pub mod file_history;
pub mod ids;
pub mod message;
pub mod profile;
pub mod session;

pub use error::CoreError;
pub use file_history::FileHistoryEntry;
pub use ids::{MessageId, SessionId, ToolCallId};
pub use message::{ContentPart, FinishReason, Message, Role};
pub use profile::{AgentMode, AgentProfile, PermissionValue, ReasoningEffort, ToolEnablement};
pub use session::Session;
