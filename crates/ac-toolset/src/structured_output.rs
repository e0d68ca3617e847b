//! The structured-output tool (spec §3/§4.2): resolved only for agents that
//! carry an output schema, it gives the model a terminal call whose
//! arguments conform to that schema, used as the agent's canonical reply
//! (spec §6 glossary: "Structured output").

use crate::tool::{Tool, ToolClass, ToolError, ToolInfo, ToolOutput};
use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

pub const STRUCTURED_OUTPUT_TOOL_NAME: &str = "structured_output";

/// Emits the final reply as a single structured-output tool call instead of
/// free-form text. Its input schema is the agent's `output_schema`, with any
/// `$ref` pointing at a sibling file resolved relative to the agent's
/// markdown location (`origin`); built-in agents have no origin, so a `$ref`
/// there is left unresolved.
pub struct StructuredOutputTool {
    schema: serde_json::Value,
}

impl StructuredOutputTool {
    pub fn new(schema: serde_json::Value, origin: &str) -> Self {
        Self { schema: expand_refs(schema, origin) }
    }
}

#[async_trait]
impl Tool for StructuredOutputTool {
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: STRUCTURED_OUTPUT_TOOL_NAME.to_string(),
            description: "Submit the final reply conforming to this agent's output schema.".to_string(),
            input_schema: self.schema.clone(),
        }
    }

    fn class(&self) -> ToolClass {
        ToolClass::StructuredOutput
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let content = serde_json::to_string(&input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        Ok(ToolOutput { content, metadata: Default::default(), structured_output: true })
    }
}

fn expand_refs(value: serde_json::Value, origin: &str) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref") {
                if let Some(resolved) = resolve_ref(ref_path, origin) {
                    return resolved;
                }
            }
            serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, expand_refs(v, origin))).collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(|v| expand_refs(v, origin)).collect())
        }
        other => other,
    }
}

/// In-document fragment refs (`#/...`) and built-ins with no markdown
/// location are left unresolved; only a path relative to `origin`'s
/// directory is followed.
fn resolve_ref(ref_path: &str, origin: &str) -> Option<serde_json::Value> {
    if origin.is_empty() || ref_path.starts_with('#') {
        return None;
    }
    let base = Path::new(origin).parent()?;
    let target = base.join(ref_path);
    match std::fs::read_to_string(&target) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %target.display(), error = %err, "malformed $ref target in output schema, leaving unresolved");
                None
            }
        },
        Err(err) => {
            warn!(path = %target.display(), error = %err, "failed to read $ref target in output schema, leaving unresolved");
            None
        }
    }
}
