//! Tool enablement evaluation (spec §4.1/§4.2): given an agent's `tools` map
//! and a tool name, decide whether the tool is enabled. An exact key wins;
//! failing that, the first matching glob pattern wins; failing that, the
//! tool defaults to enabled.

use crate::glob::match_wildcard;
use ac_core::ToolEnablement;

pub fn is_tool_enabled(tools: &ToolEnablement, tool_name: &str) -> bool {
    if let Some(enabled) = tools.get(tool_name) {
        return *enabled;
    }

    let mut patterns: Vec<(&String, &bool)> = tools.iter().filter(|(k, _)| k.contains('*')).collect();
    patterns.sort_by_key(|(k, _)| k.as_str());
    for (pattern, enabled) in patterns {
        if match_wildcard(pattern, tool_name) {
            return *enabled;
        }
    }

    true
}
