//! The `Tool` contract every local, manager, and MCP-backed tool implements
//! (spec §4.2).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Static description of a tool surfaced to the model as part of the
/// provider request (name, description, JSON-schema input shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Whether a tool may be offered to a given agent mode. Manager-class tools
/// (those that mutate agent/session state rather than the workspace) are
/// restricted to primary agents (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    Viewer,
    Editor,
    Manager,
    /// The per-agent structured-output tool (spec §3/§4.2); ordered after
    /// managers in a resolved toolset but never suppressed for subordinates.
    StructuredOutput,
}

/// What a tool call produced: the text fed back to the model plus whatever
/// a caller up the stack (the delegation tool, the turn loop) wants
/// attached to the persisted `ToolResult` part.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub structured_output: bool,
}

impl From<String> for ToolOutput {
    fn from(content: String) -> Self {
        Self { content, metadata: HashMap::new(), structured_output: false }
    }
}

impl From<&str> for ToolOutput {
    fn from(content: &str) -> Self {
        Self::from(content.to_string())
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn info(&self) -> ToolInfo;

    fn class(&self) -> ToolClass {
        ToolClass::Viewer
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError>;
}
