//! Shared test fixtures for `ac-config`. Compiled only under `cfg(test)`.

use ac_core::{AgentMode, AgentProfile, PermissionValue};
use std::collections::HashMap;

pub fn profile_with_permission(id: &str, permission: HashMap<String, PermissionValue>) -> AgentProfile {
    AgentProfile {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        mode: AgentMode::Primary,
        native: false,
        hidden: false,
        model: "default-large".to_string(),
        max_output_tokens: None,
        reasoning_effort: Default::default(),
        system_prompt: String::new(),
        color: None,
        permission,
        tools: HashMap::new(),
        output_schema: None,
        origin: String::new(),
    }
}
