//! Wraps a discovered MCP tool as an in-process [`Tool`], routing `run()`
//! through a permission check before the call reaches the server (spec §4.5).

use crate::permission_gate::PermissionGate;
use crate::tool::{Tool, ToolError, ToolInfo, ToolOutput};
use ac_mcp::McpRegistry;
use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, Tool as McpTool};
use std::sync::Arc;

pub struct McpToolAdapter {
    server_name: String,
    tool: McpTool,
    registry: Arc<McpRegistry>,
    gate: Arc<dyn PermissionGate>,
}

impl McpToolAdapter {
    pub fn new(
        server_name: String,
        tool: McpTool,
        registry: Arc<McpRegistry>,
        gate: Arc<dyn PermissionGate>,
    ) -> Self {
        Self { server_name, tool, registry, gate }
    }

    pub fn qualified_name(&self) -> String {
        format!("mcp__{}__{}", self.server_name, self.tool.name)
    }
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.qualified_name(),
            description: self.tool.description.clone().map(|d| d.to_string()).unwrap_or_default(),
            input_schema: serde_json::Value::Object((*self.tool.input_schema).clone()),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let input_str = input.to_string();
        if !self.gate.allow(&self.qualified_name(), &input_str) {
            return Err(ToolError::PermissionDenied(self.qualified_name()));
        }

        let arguments = input.as_object().cloned();
        let request = CallToolRequestParam { name: self.tool.name.clone(), arguments };

        let result = self
            .registry
            .call_tool(&self.server_name, request)
            .await
            .map_err(ToolError::Other)?;

        let text = result
            .content
            .into_iter()
            .filter_map(|c| c.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error.unwrap_or(false) {
            Err(ToolError::ExecutionFailed(text))
        } else {
            Ok(ToolOutput::from(text))
        }
    }
}
