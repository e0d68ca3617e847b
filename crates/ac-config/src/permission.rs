//! Permission evaluation (spec §4.1, §8 scenarios 2-3).
//!
//! Given (agent id, tool name, input string), consult four maps in strict
//! order: agent-exact, global-exact, agent-star, global-star. The first map
//! that yields a non-empty action wins; otherwise the result is `ask`.

use crate::registry::AgentRegistry;
use crate::glob::match_wildcard;
use ac_core::PermissionValue;
use std::collections::HashMap;

pub const ACTION_ALLOW: &str = "allow";
pub const ACTION_DENY: &str = "deny";
pub const ACTION_ASK: &str = "ask";

/// Global permission overlay, keyed the same way as an agent's own overlay.
pub type GlobalPermissions = HashMap<String, PermissionValue>;

/// Resolve a single `PermissionValue` against an input string. A `Single`
/// value resolves directly; a `Patterned` table is matched by glob with the
/// explicit `"*"` entry as the default and pattern matches overriding it.
/// Unknown action strings degrade to an empty action (falls through).
fn resolve_value(value: &PermissionValue, input: &str) -> Option<String> {
    let normalize = |action: &str| -> Option<String> {
        match action {
            ACTION_ALLOW | ACTION_DENY | ACTION_ASK => Some(action.to_string()),
            _ => None,
        }
    };

    match value {
        PermissionValue::Single(action) => normalize(action),
        PermissionValue::Patterned(table) => {
            let default = table.get("*").and_then(|a| normalize(a));
            let mut override_match = None;
            for (pattern, action) in table {
                if pattern == "*" {
                    continue;
                }
                if match_wildcard(pattern, input) {
                    if let Some(resolved) = normalize(action) {
                        override_match = Some(resolved);
                        break;
                    }
                }
            }
            override_match.or(default)
        }
    }
}

/// Evaluate the permission action for (agent id, tool, input) per the
/// four-source priority order in spec §4.1.
pub fn evaluate(
    registry: &AgentRegistry,
    global: &GlobalPermissions,
    agent_id: &str,
    tool: &str,
    input: &str,
) -> String {
    let agent_overlay = registry.get(agent_id).map(|p| p.permission.clone());

    let sources: [Option<&PermissionValue>; 4] = [
        agent_overlay.as_ref().and_then(|m| m.get(tool)),
        global.get(tool),
        agent_overlay.as_ref().and_then(|m| m.get("*")),
        global.get("*"),
    ];

    for source in sources.into_iter().flatten() {
        if let Some(action) = resolve_value(source, input) {
            return action;
        }
    }

    ACTION_ASK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AgentRegistry;

    fn single_map(pairs: &[(&str, &str)]) -> HashMap<String, PermissionValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PermissionValue::Single(v.to_string())))
            .collect()
    }

    #[test]
    fn agent_exact_wins_over_global() {
        let registry = AgentRegistry::with_profiles(vec![crate::test_support::profile_with_permission(
            "agent",
            single_map(&[("bash", "deny"), ("read", "allow")]),
        )]);
        let global = single_map(&[("bash", "ask")]);

        assert_eq!(evaluate(&registry, &global, "agent", "bash", "git status"), "deny");
        assert_eq!(evaluate(&registry, &global, "agent", "read", "/f"), "allow");
    }

    #[test]
    fn unknown_agent_falls_through_to_ask() {
        let registry = AgentRegistry::with_profiles(vec![]);
        let global = single_map(&[("bash", "ask")]);
        assert_eq!(
            evaluate(&registry, &global, "unknown-agent", "bash", "anything"),
            "ask"
        );
    }

    #[test]
    fn granular_bash_glob_resolves_by_pattern() {
        let mut table = HashMap::new();
        table.insert("*".to_string(), "ask".to_string());
        table.insert("git *".to_string(), "allow".to_string());
        table.insert("rm *".to_string(), "deny".to_string());
        let mut permission = HashMap::new();
        permission.insert("bash".to_string(), PermissionValue::Patterned(table));

        let registry = AgentRegistry::with_profiles(vec![
            crate::test_support::profile_with_permission("agent", permission),
        ]);
        let global = HashMap::new();

        assert_eq!(evaluate(&registry, &global, "agent", "bash", "git status"), "allow");
        assert_eq!(evaluate(&registry, &global, "agent", "bash", "rm -rf /"), "deny");
        assert_eq!(evaluate(&registry, &global, "agent", "bash", "make build"), "ask");
    }

    #[test]
    fn unknown_action_string_falls_through() {
        let registry = AgentRegistry::with_profiles(vec![crate::test_support::profile_with_permission(
            "agent",
            single_map(&[("bash", "maybe")]),
        )]);
        let global = single_map(&[("bash", "ask")]);
        assert_eq!(evaluate(&registry, &global, "agent", "bash", "x"), "ask");
    }
}
