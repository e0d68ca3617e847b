//! `Message` and its content parts (spec §3).

use crate::ids::{MessageId, SessionId, ToolCallId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    ToolUse,
    Canceled,
    Error,
    PermissionDenied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    Attachment {
        path: String,
        mime: String,
        data: Vec<u8>,
    },
    ToolUse {
        call_id: ToolCallId,
        name: String,
        input: serde_json::Value,
        finished: bool,
    },
    ToolResult {
        call_id: ToolCallId,
        name: String,
        content: String,
        #[serde(default)]
        metadata: HashMap<String, String>,
        is_error: bool,
        #[serde(default)]
        structured_output: bool,
    },
    Finish {
        reason: FinishReason,
        at: DateTime<Utc>,
    },
}

impl ContentPart {
    pub fn tool_use_call_id(&self) -> Option<ToolCallId> {
        match self {
            ContentPart::ToolUse { call_id, .. } => Some(*call_id),
            _ => None,
        }
    }

    pub fn tool_result_call_id(&self) -> Option<ToolCallId> {
        match self {
            ContentPart::ToolResult { call_id, .. } => Some(*call_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: Role,
    pub parts: Vec<ContentPart>,
    /// Assistant messages only.
    #[serde(default)]
    pub model_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: SessionId, role: Role) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            role,
            parts: Vec::new(),
            model_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn tool_use_call_ids(&self) -> Vec<ToolCallId> {
        self.parts
            .iter()
            .filter_map(ContentPart::tool_use_call_id)
            .collect()
    }

    pub fn tool_result_call_ids(&self) -> Vec<ToolCallId> {
        self.parts
            .iter()
            .filter_map(ContentPart::tool_result_call_id)
            .collect()
    }

    /// An assistant message is dangling if it recorded tool-use blocks with
    /// no directly-following tool-role message containing a matching
    /// tool-result for every call id (spec §3, §8 "Dangling tool-use freedom").
    pub fn is_dangling(&self, following_tool_message: Option<&Message>) -> bool {
        let call_ids = self.tool_use_call_ids();
        if call_ids.is_empty() {
            return false;
        }
        let Some(tool_message) = following_tool_message else {
            return true;
        };
        let results: Vec<ToolCallId> = tool_message.tool_result_call_ids();
        call_ids.iter().any(|id| !results.contains(id))
    }
}
