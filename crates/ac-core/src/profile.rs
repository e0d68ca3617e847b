//! `AgentProfile` — a discovered or built-in agent template (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Primary,
    Subordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// Value in a permission overlay map: either a single action for the whole
/// tool, or a pattern table keyed by input glob with `"*"` as the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionValue {
    Single(String),
    Patterned(HashMap<String, String>),
}

/// `tools` map: tool name or glob -> enabled. Absent key defaults to enabled.
pub type ToolEnablement = HashMap<String, bool>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub mode: AgentMode,
    #[serde(default)]
    pub native: bool,
    #[serde(default)]
    pub hidden: bool,
    pub model: String,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub color: Option<String>,
    /// tool name or "*" -> PermissionValue
    #[serde(default)]
    pub permission: HashMap<String, PermissionValue>,
    #[serde(default)]
    pub tools: ToolEnablement,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    /// Filesystem path this profile was discovered from; empty for built-ins.
    #[serde(default)]
    pub origin: String,
}

impl AgentProfile {
    /// Whether the structured-output tool is implicitly enabled: it is,
    /// unless the caller has explicitly disabled it (spec §3 invariant).
    pub fn structured_output_enabled(&self) -> bool {
        if self.output_schema.is_none() {
            return false;
        }
        *self.tools.get("structured_output").unwrap_or(&true)
    }

    pub fn is_subordinate(&self) -> bool {
        matches!(self.mode, AgentMode::Subordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_profile() -> AgentProfile {
        AgentProfile {
            id: "coder".into(),
            name: "Coder".into(),
            description: "Writes code".into(),
            mode: AgentMode::Primary,
            native: true,
            hidden: false,
            model: "model-a".into(),
            max_output_tokens: None,
            reasoning_effort: ReasoningEffort::Medium,
            system_prompt: String::new(),
            color: None,
            permission: HashMap::new(),
            tools: HashMap::new(),
            output_schema: None,
            origin: String::new(),
        }
    }

    #[test]
    fn structured_output_disabled_without_schema() {
        let profile = base_profile();
        assert!(!profile.structured_output_enabled());
    }

    #[test]
    fn structured_output_implicitly_enabled_with_schema() {
        let mut profile = base_profile();
        profile.output_schema = Some(serde_json::json!({"type": "object"}));
        assert!(profile.structured_output_enabled());
    }

    #[test]
    fn structured_output_can_be_explicitly_disabled() {
        let mut profile = base_profile();
        profile.output_schema = Some(serde_json::json!({"type": "object"}));
        profile.tools.insert("structured_output".into(), false);
        assert!(!profile.structured_output_enabled());
    }

    #[test]
    fn is_subordinate_matches_mode() {
        let mut profile = base_profile();
        assert!(!profile.is_subordinate());
        profile.mode = AgentMode::Subordinate;
        assert!(profile.is_subordinate());
    }

    #[test]
    fn permission_value_deserializes_single_and_patterned() {
        let single: PermissionValue = serde_json::from_str("\"allow\"").unwrap();
        assert!(matches!(single, PermissionValue::Single(s) if s == "allow"));

        let patterned: PermissionValue =
            serde_json::from_str(r#"{"*": "ask", "git *": "allow"}"#).unwrap();
        match patterned {
            PermissionValue::Patterned(map) => {
                assert_eq!(map.get("*").map(String::as_str), Some("ask"));
                assert_eq!(map.get("git *").map(String::as_str), Some("allow"));
            }
            _ => panic!("expected patterned value"),
        }
    }
}
