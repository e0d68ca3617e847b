//! Tool-set resolution (spec §4.2): combine eager local tool groups with
//! concurrently-produced MCP tools into one stable slice per agent turn,
//! filtered by tool enablement and agent mode.

use crate::mcp_adapter::McpToolAdapter;
use crate::permission_gate::PermissionGate;
use crate::structured_output::StructuredOutputTool;
use crate::tool::{Tool, ToolClass};
use ac_config::is_tool_enabled;
use ac_core::{AgentProfile, ToolEnablement};
use ac_mcp::McpRegistry;
use std::sync::Arc;
use tracing::warn;

pub struct ToolSetResolver {
    local_tools: Vec<Arc<dyn Tool>>,
    mcp_registry: Option<Arc<McpRegistry>>,
}

impl ToolSetResolver {
    pub fn new(local_tools: Vec<Arc<dyn Tool>>, mcp_registry: Option<Arc<McpRegistry>>) -> Self {
        Self { local_tools, mcp_registry }
    }

    /// Resolve the tool set visible to `profile` for one turn. Manager-class
    /// local tools are dropped (with a warning) for subordinate agents,
    /// every tool is filtered through the agent's `tools` enablement map,
    /// and MCP tools are fetched concurrently and appended.
    pub async fn resolve(&self, profile: &AgentProfile, gate: Arc<dyn PermissionGate>) -> Vec<Arc<dyn Tool>> {
        let mut resolved = self.resolve_local(profile);

        if profile.structured_output_enabled() {
            if let Some(schema) = profile.output_schema.clone() {
                resolved.push(Arc::new(StructuredOutputTool::new(schema, &profile.origin)));
            }
        }

        if let Some(registry) = &self.mcp_registry {
            let discovered = registry.load_tools().await;
            for item in discovered {
                let adapter = McpToolAdapter::new(
                    item.server_name,
                    item.tool,
                    Arc::clone(registry),
                    Arc::clone(&gate),
                );
                if is_tool_enabled(&profile.tools, &adapter.qualified_name()) {
                    resolved.push(Arc::new(adapter));
                }
            }
        }

        resolved
    }

    fn resolve_local(&self, profile: &AgentProfile) -> Vec<Arc<dyn Tool>> {
        let mut resolved = Vec::new();
        for tool in &self.local_tools {
            let info = tool.info();
            if tool.class() == ToolClass::Manager && profile.is_subordinate() {
                warn!(agent = %profile.id, tool = %info.name, "manager tool suppressed for subordinate agent");
                continue;
            }
            if is_enabled(&profile.tools, &info.name) {
                resolved.push(Arc::clone(tool));
            }
        }
        resolved
    }
}

fn is_enabled(tools: &ToolEnablement, name: &str) -> bool {
    is_tool_enabled(tools, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolError, ToolInfo, ToolOutput};
    use ac_core::{AgentMode, ReasoningEffort};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedTool {
        name: &'static str,
        class: ToolClass,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn info(&self) -> ToolInfo {
            ToolInfo { name: self.name.to_string(), description: String::new(), input_schema: serde_json::json!({}) }
        }

        fn class(&self) -> ToolClass {
            self.class
        }

        async fn run(&self, _input: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::from("ok"))
        }
    }

    fn profile(mode: AgentMode, tools: HashMap<String, bool>) -> AgentProfile {
        AgentProfile {
            id: "agent".into(),
            name: "Agent".into(),
            description: String::new(),
            mode,
            native: false,
            hidden: false,
            model: "m".into(),
            max_output_tokens: None,
            reasoning_effort: ReasoningEffort::default(),
            system_prompt: String::new(),
            color: None,
            permission: HashMap::new(),
            tools,
            output_schema: None,
            origin: String::new(),
        }
    }

    #[tokio::test]
    async fn manager_tools_are_suppressed_for_subordinates() {
        let local: Vec<Arc<dyn Tool>> = vec![
            Arc::new(FixedTool { name: "edit", class: ToolClass::Editor }),
            Arc::new(FixedTool { name: "manager_spawn", class: ToolClass::Manager }),
        ];
        let resolver = ToolSetResolver::new(local, None);
        let profile = profile(AgentMode::Subordinate, HashMap::new());

        let resolved = resolver.resolve(&profile, Arc::new(crate::permission_gate::AlwaysAllowGate)).await;
        let names: Vec<String> = resolved.iter().map(|t| t.info().name).collect();
        assert_eq!(names, vec!["edit".to_string()]);
    }

    #[tokio::test]
    async fn manager_tools_are_available_to_primary_agents() {
        let local: Vec<Arc<dyn Tool>> = vec![Arc::new(FixedTool { name: "manager_spawn", class: ToolClass::Manager })];
        let resolver = ToolSetResolver::new(local, None);
        let profile = profile(AgentMode::Primary, HashMap::new());

        let resolved = resolver.resolve(&profile, Arc::new(crate::permission_gate::AlwaysAllowGate)).await;
        assert_eq!(resolved.len(), 1);
    }

    #[tokio::test]
    async fn structured_output_tool_is_emitted_when_profile_carries_a_schema() {
        let resolver = ToolSetResolver::new(vec![], None);
        let mut profile = profile(AgentMode::Subordinate, HashMap::new());
        profile.output_schema = Some(serde_json::json!({"type": "object"}));

        let resolved = resolver.resolve(&profile, Arc::new(crate::permission_gate::AlwaysAllowGate)).await;
        let names: Vec<String> = resolved.iter().map(|t| t.info().name).collect();
        assert_eq!(names, vec!["structured_output".to_string()]);
    }

    #[tokio::test]
    async fn structured_output_tool_is_absent_without_a_schema() {
        let resolver = ToolSetResolver::new(vec![], None);
        let profile = profile(AgentMode::Primary, HashMap::new());

        let resolved = resolver.resolve(&profile, Arc::new(crate::permission_gate::AlwaysAllowGate)).await;
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn explicit_disablement_removes_a_tool() {
        let local: Vec<Arc<dyn Tool>> = vec![Arc::new(FixedTool { name: "edit", class: ToolClass::Editor })];
        let resolver = ToolSetResolver::new(local, None);
        let mut tools = HashMap::new();
        tools.insert("edit".to_string(), false);
        let profile = profile(AgentMode::Primary, tools);

        let resolved = resolver.resolve(&profile, Arc::new(crate::permission_gate::AlwaysAllowGate)).await;
        assert!(resolved.is_empty());
    }
}
