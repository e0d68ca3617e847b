//! The "task" tool: the delegation subsystem's entry point (spec §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use ac_config::AgentRegistry;
use ac_core::{AgentMode, ContentPart, CoreError, Message, Role, SessionId, ToolCallId};
use ac_executor::{TurnDriver, TurnRequest};
use ac_session::{MessageStore, SessionStore};
use ac_toolset::{PermissionGate, Tool, ToolClass, ToolError, ToolInfo, ToolOutput, ToolSetResolver};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct TaskInput {
    prompt: String,
    subagent_type: String,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_title: Option<String>,
}

/// Turn defaults the task tool can't derive from the subordinate profile
/// alone, shared across every delegated turn this process runs.
#[derive(Debug, Clone)]
pub struct TaskToolConfig {
    pub summarizer_model_id: String,
    pub descriptor_model_id: String,
    pub default_max_output_tokens: u32,
    pub auto_compact: bool,
}

/// Exposes the "task" capability to primary agents: resolve a subordinate
/// profile, resume-or-create its child session, drive its turn to
/// completion on the same [`TurnDriver`] infrastructure the parent agent
/// uses, and hand back its reply. Manager-class, so `ToolSetResolver`
/// suppresses it for subordinate agents (spec §4.2) — a subordinate cannot
/// delegate further.
pub struct TaskTool {
    registry: Arc<AgentRegistry>,
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    resolver: Arc<ToolSetResolver>,
    driver: Arc<TurnDriver>,
    parent_session_id: SessionId,
    gate: Arc<dyn PermissionGate>,
    config: TaskToolConfig,
}

impl TaskTool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<AgentRegistry>,
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageStore>,
        resolver: Arc<ToolSetResolver>,
        driver: Arc<TurnDriver>,
        parent_session_id: SessionId,
        gate: Arc<dyn PermissionGate>,
        config: TaskToolConfig,
    ) -> Self {
        Self { registry, sessions, messages, resolver, driver, parent_session_id, gate, config }
    }
}

fn store_err(e: CoreError) -> ToolError {
    ToolError::Other(anyhow::Error::from(e))
}

#[async_trait]
impl Tool for TaskTool {
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: "task".into(),
            description: "Delegate a prompt to a subordinate agent running on its own child session.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string", "description": "Instructions for the subordinate agent."},
                    "subagent_type": {"type": "string", "description": "Registered id of a subordinate-mode agent."},
                    "task_id": {"type": "string", "description": "Resume this task's child session instead of starting a new one."},
                    "task_title": {"type": "string"},
                },
                "required": ["prompt", "subagent_type"],
            }),
        }
    }

    fn class(&self) -> ToolClass {
        ToolClass::Manager
    }

    #[instrument(skip(self, input), fields(parent_session_id = %self.parent_session_id))]
    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let parsed: TaskInput =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        let profile = self.registry.get(&parsed.subagent_type).filter(|p| p.is_subordinate());
        let Some(profile) = profile else {
            let valid = self
                .registry
                .list_by_mode(AgentMode::Subordinate)
                .into_iter()
                .map(|p| p.id.clone())
                .collect();
            let err = CoreError::NotSubordinate { requested: parsed.subagent_type.clone(), valid };
            return Err(ToolError::InvalidInput(err.to_string()));
        };

        let seed = parsed.task_id.clone().unwrap_or_else(|| ToolCallId::new().as_str());
        let title = parsed.task_title.clone().unwrap_or_else(|| profile.name.clone());

        let child = self
            .sessions
            .create_task_session(&seed, &self.parent_session_id, &title)
            .await
            .map_err(store_err)?;

        let prior = self.messages.list(&child.id).await.map_err(store_err)?;
        let resumed = !prior.is_empty();

        let tools = self.resolver.resolve(profile, Arc::clone(&self.gate)).await;
        let max_output_tokens = profile.max_output_tokens.unwrap_or(self.config.default_max_output_tokens);

        let request = TurnRequest {
            session_id: child.id,
            model_id: profile.model.clone(),
            summarizer_model_id: self.config.summarizer_model_id.clone(),
            descriptor_model_id: self.config.descriptor_model_id.clone(),
            max_output_tokens,
            auto_compact: self.config.auto_compact,
            tools,
            gate: Arc::clone(&self.gate),
            user_text: parsed.prompt,
            attachments: Vec::new(),
        };

        // Cost aggregation into the parent happens for free: every Complete
        // event inside this turn walks the session's ancestor chain, which
        // includes the parent session transparently (ac_session::genealogy).
        self.driver.run_turn(request, CancellationToken::new()).await?;

        let history = self.messages.list(&child.id).await.map_err(store_err)?;
        let (content, structured_output) = extract_reply(&history);

        let mut metadata = HashMap::new();
        metadata.insert("task_id".into(), seed);
        metadata.insert("subagent_type".into(), profile.id.clone());
        metadata.insert("subagent_name".into(), profile.name.clone());
        metadata.insert("resumed".into(), resumed.to_string());
        metadata.insert("structured".into(), structured_output.to_string());

        Ok(ToolOutput { content, metadata, structured_output })
    }
}

/// Prefer the last structured-output tool result anywhere in the child's
/// history; otherwise fall back to the last assistant message's text (spec
/// §4.4: "prefer the structured-output payload if present").
fn extract_reply(history: &[Message]) -> (String, bool) {
    let structured = history.iter().flat_map(|m| m.parts.iter()).rev().find_map(|part| match part {
        ContentPart::ToolResult { content, structured_output: true, is_error: false, .. } => Some(content.clone()),
        _ => None,
    });
    if let Some(payload) = structured {
        return (payload, true);
    }

    let text = history
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| {
            m.parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    (text, false)
}
