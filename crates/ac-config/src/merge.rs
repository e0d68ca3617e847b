//! Layered merge of agent profiles (spec §4.1).
//!
//! Three layers are merged in increasing precedence: built-in profiles,
//! markdown-discovered profiles, then config-file overlays. Scalar fields are
//! last-writer-wins. `tools` and `permission` merge key-wise instead of being
//! replaced wholesale, so an overlay can flip a single tool or pattern without
//! clobbering the rest of the table. `hidden` is monotonically sticky: once
//! any layer hides a profile, no later layer can unhide it. `native` always
//! reflects whether a built-in profile of the same id existed, regardless of
//! later layers.

use ac_core::AgentProfile;
use std::collections::HashMap;

/// A partial profile overlay as found in a markdown file or config section.
/// `None` fields mean "do not touch this field".
#[derive(Debug, Clone, Default)]
pub struct ProfileOverlay {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub mode: Option<ac_core::AgentMode>,
    pub hidden: Option<bool>,
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub reasoning_effort: Option<ac_core::ReasoningEffort>,
    pub system_prompt: Option<String>,
    pub color: Option<String>,
    pub permission: HashMap<String, ac_core::PermissionValue>,
    pub tools: HashMap<String, bool>,
    pub output_schema: Option<serde_json::Value>,
    pub origin: String,
}

impl ProfileOverlay {
    pub fn into_profile(self) -> AgentProfile {
        AgentProfile {
            id: self.id,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            mode: self.mode.unwrap_or(ac_core::AgentMode::Subordinate),
            native: false,
            hidden: self.hidden.unwrap_or(false),
            model: self.model.unwrap_or_default(),
            max_output_tokens: self.max_output_tokens,
            reasoning_effort: self.reasoning_effort.unwrap_or_default(),
            system_prompt: self.system_prompt.unwrap_or_default(),
            color: self.color,
            permission: self.permission,
            tools: self.tools,
            output_schema: self.output_schema,
            origin: self.origin,
        }
    }
}

/// Apply `overlay` on top of `base`, per the precedence rules above.
pub fn apply_overlay(base: AgentProfile, overlay: ProfileOverlay) -> AgentProfile {
    let native = base.native;
    let hidden = base.hidden || overlay.hidden.unwrap_or(false);

    let mut permission = base.permission;
    for (k, v) in overlay.permission {
        permission.insert(k, v);
    }

    let mut tools = base.tools;
    for (k, v) in overlay.tools {
        tools.insert(k, v);
    }

    AgentProfile {
        id: base.id,
        name: overlay.name.unwrap_or(base.name),
        description: overlay.description.unwrap_or(base.description),
        mode: overlay.mode.unwrap_or(base.mode),
        native,
        hidden,
        model: overlay.model.unwrap_or(base.model),
        max_output_tokens: overlay.max_output_tokens.or(base.max_output_tokens),
        reasoning_effort: overlay.reasoning_effort.unwrap_or(base.reasoning_effort),
        system_prompt: overlay.system_prompt.unwrap_or(base.system_prompt),
        color: overlay.color.or(base.color),
        permission,
        tools,
        output_schema: overlay.output_schema.or(base.output_schema),
        origin: if overlay.origin.is_empty() { base.origin } else { overlay.origin },
    }
}

/// Merge built-ins, markdown-discovered profiles, and config overlays into a
/// single `id -> AgentProfile` table, in that precedence order.
pub fn merge_layers(
    builtins: Vec<AgentProfile>,
    markdown: Vec<ProfileOverlay>,
    config: Vec<ProfileOverlay>,
) -> HashMap<String, AgentProfile> {
    let mut table: HashMap<String, AgentProfile> = HashMap::new();
    for profile in builtins {
        table.insert(profile.id.clone(), profile);
    }

    for overlay in markdown {
        apply_layer(&mut table, overlay);
    }
    for overlay in config {
        apply_layer(&mut table, overlay);
    }

    table
}

fn apply_layer(table: &mut HashMap<String, AgentProfile>, overlay: ProfileOverlay) {
    match table.remove(&overlay.id) {
        Some(base) => {
            table.insert(overlay.id.clone(), apply_overlay(base, overlay));
        }
        None => {
            let id = overlay.id.clone();
            table.insert(id, overlay.into_profile());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::{AgentMode, PermissionValue};

    fn builtin(id: &str) -> AgentProfile {
        let mut tools = HashMap::new();
        tools.insert("bash".to_string(), true);
        tools.insert("edit".to_string(), true);
        AgentProfile {
            id: id.to_string(),
            name: "Built In".to_string(),
            description: "d".to_string(),
            mode: AgentMode::Primary,
            native: true,
            hidden: false,
            model: "default-large".to_string(),
            max_output_tokens: None,
            reasoning_effort: Default::default(),
            system_prompt: String::new(),
            color: None,
            permission: HashMap::new(),
            tools,
            output_schema: None,
            origin: "builtin".to_string(),
        }
    }

    #[test]
    fn scalar_field_is_last_writer_wins() {
        let overlay = ProfileOverlay {
            id: "coder".to_string(),
            model: Some("custom-model".to_string()),
            origin: "config".to_string(),
            ..Default::default()
        };
        let table = merge_layers(vec![builtin("coder")], vec![], vec![overlay]);
        assert_eq!(table["coder"].model, "custom-model");
    }

    #[test]
    fn tools_merge_key_wise_instead_of_replacing() {
        let mut overlay_tools = HashMap::new();
        overlay_tools.insert("bash".to_string(), false);
        let overlay = ProfileOverlay {
            id: "coder".to_string(),
            tools: overlay_tools,
            origin: "config".to_string(),
            ..Default::default()
        };
        let table = merge_layers(vec![builtin("coder")], vec![], vec![overlay]);
        assert_eq!(table["coder"].tools.get("bash"), Some(&false));
        assert_eq!(table["coder"].tools.get("edit"), Some(&true));
    }

    #[test]
    fn hidden_is_monotonically_sticky() {
        let markdown_overlay = ProfileOverlay {
            id: "coder".to_string(),
            hidden: Some(true),
            origin: "markdown".to_string(),
            ..Default::default()
        };
        let config_overlay = ProfileOverlay {
            id: "coder".to_string(),
            hidden: Some(false),
            origin: "config".to_string(),
            ..Default::default()
        };
        let table = merge_layers(vec![builtin("coder")], vec![markdown_overlay], vec![config_overlay]);
        assert!(table["coder"].hidden);
    }

    #[test]
    fn native_is_preserved_from_builtin_source() {
        let overlay = ProfileOverlay {
            id: "coder".to_string(),
            model: Some("custom".to_string()),
            origin: "config".to_string(),
            ..Default::default()
        };
        let table = merge_layers(vec![builtin("coder")], vec![], vec![overlay]);
        assert!(table["coder"].native);
    }

    #[test]
    fn a_profile_with_no_builtin_source_is_not_native() {
        let overlay = ProfileOverlay {
            id: "custom-agent".to_string(),
            name: Some("Custom".to_string()),
            origin: "markdown".to_string(),
            ..Default::default()
        };
        let table = merge_layers(vec![builtin("coder")], vec![overlay], vec![]);
        assert!(!table["custom-agent"].native);
    }

    #[test]
    fn permission_overlay_merges_key_wise() {
        let mut base_permission = HashMap::new();
        base_permission.insert("bash".to_string(), PermissionValue::Single("ask".to_string()));
        base_permission.insert("read".to_string(), PermissionValue::Single("allow".to_string()));
        let mut base = builtin("coder");
        base.permission = base_permission;

        let mut overlay_permission = HashMap::new();
        overlay_permission.insert("bash".to_string(), PermissionValue::Single("deny".to_string()));
        let overlay = ProfileOverlay {
            id: "coder".to_string(),
            permission: overlay_permission,
            origin: "config".to_string(),
            ..Default::default()
        };

        let table = merge_layers(vec![base], vec![], vec![overlay]);
        assert_eq!(table["coder"].permission.get("bash"), Some(&PermissionValue::Single("deny".to_string())));
        assert_eq!(table["coder"].permission.get("read"), Some(&PermissionValue::Single("allow".to_string())));
    }
}
