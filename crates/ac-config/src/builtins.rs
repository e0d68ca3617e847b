//! Hard-coded built-in agent profiles (spec §4.1): the coordinator, the
//! coder, the explorer, the workhorse, the summarizer, the descriptor.

use ac_core::{AgentMode, AgentProfile, ReasoningEffort};
use std::collections::HashMap;

fn builtin(
    id: &str,
    name: &str,
    description: &str,
    mode: AgentMode,
    model: &str,
    reasoning_effort: ReasoningEffort,
) -> AgentProfile {
    AgentProfile {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        mode,
        native: true,
        hidden: false,
        model: model.to_string(),
        max_output_tokens: None,
        reasoning_effort,
        system_prompt: String::new(),
        color: None,
        permission: HashMap::new(),
        tools: HashMap::new(),
        output_schema: None,
        origin: String::new(),
    }
}

/// Returns the six built-in agent profiles, in a stable order.
pub fn builtin_profiles() -> Vec<AgentProfile> {
    vec![
        builtin(
            "coordinator",
            "Coordinator",
            "Primary agent that plans work and delegates to subordinates.",
            AgentMode::Primary,
            "default-large",
            ReasoningEffort::Medium,
        ),
        builtin(
            "coder",
            "Coder",
            "Primary agent focused on writing and editing code directly.",
            AgentMode::Primary,
            "default-large",
            ReasoningEffort::Medium,
        ),
        builtin(
            "explorer",
            "Explorer",
            "Subordinate agent that searches and reads the codebase read-only.",
            AgentMode::Subordinate,
            "default-small",
            ReasoningEffort::Low,
        ),
        builtin(
            "workhorse",
            "Workhorse",
            "Subordinate agent that executes a well-specified task end to end.",
            AgentMode::Subordinate,
            "default-large",
            ReasoningEffort::Medium,
        ),
        builtin(
            "summarizer",
            "Summarizer",
            "Subordinate agent used internally to compact session history.",
            AgentMode::Subordinate,
            "default-small",
            ReasoningEffort::Low,
        ),
        builtin(
            "descriptor",
            "Descriptor",
            "Subordinate agent used internally to generate one-line session titles.",
            AgentMode::Subordinate,
            "default-small",
            ReasoningEffort::None,
        ),
    ]
}
