//! Bridges the permission evaluator into a per-call yes/no gate tools can
//! consult without depending on `ac-config` directly.

use ac_config::{evaluate, GlobalPermissions, AgentRegistry, ACTION_ALLOW};

pub trait PermissionGate: Send + Sync {
    /// Whether `tool` may run with `input` right now. "ask" resolves to
    /// denied here; the executor surfaces interactive confirmation at a
    /// higher layer before a tool call ever reaches this gate.
    fn allow(&self, tool: &str, input: &str) -> bool;
}

pub struct RegistryPermissionGate {
    registry: std::sync::Arc<AgentRegistry>,
    global: GlobalPermissions,
    agent_id: String,
}

impl RegistryPermissionGate {
    pub fn new(registry: std::sync::Arc<AgentRegistry>, global: GlobalPermissions, agent_id: String) -> Self {
        Self { registry, global, agent_id }
    }
}

impl PermissionGate for RegistryPermissionGate {
    fn allow(&self, tool: &str, input: &str) -> bool {
        evaluate(&self.registry, &self.global, &self.agent_id, tool, input) == ACTION_ALLOW
    }
}

/// Always-allow gate for contexts with no permission overlay (tests, or a
/// tool class exempt from permission checks).
pub struct AlwaysAllowGate;

impl PermissionGate for AlwaysAllowGate {
    fn allow(&self, _tool: &str, _input: &str) -> bool {
        true
    }
}
