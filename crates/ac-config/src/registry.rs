//! `AgentRegistry` — the merged view of built-in, markdown-discovered, and
//! config-overlaid agent profiles (spec §4.1).

use crate::builtins::builtin_profiles;
use crate::markdown::{discover_markdown_profiles, MarkdownDiscoveryRoots};
use crate::merge::{merge_layers, ProfileOverlay};
use ac_core::{AgentMode, AgentProfile};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    profiles: HashMap<String, AgentProfile>,
}

impl AgentRegistry {
    /// Build a registry directly from a flat profile list, bypassing
    /// discovery. Primarily for tests.
    pub fn with_profiles(profiles: Vec<AgentProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Build the registry the way a running agent does: built-ins, then
    /// markdown-file discovery under the user and project agent directories,
    /// then config-file overlays, merged per [`crate::merge`]'s precedence
    /// rules.
    pub fn load(work_dir: &Path, config_overlays: Vec<ProfileOverlay>) -> Result<Self> {
        let roots = MarkdownDiscoveryRoots::standard(work_dir);
        let markdown = discover_markdown_profiles(&roots)?;
        let table = merge_layers(builtin_profiles(), markdown, config_overlays);
        Ok(Self { profiles: table })
    }

    pub fn get(&self, id: &str) -> Option<&AgentProfile> {
        self.profiles.get(id)
    }

    pub fn list(&self) -> Vec<&AgentProfile> {
        let mut profiles: Vec<&AgentProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        profiles
    }

    pub fn list_visible(&self) -> Vec<&AgentProfile> {
        self.list().into_iter().filter(|p| !p.hidden).collect()
    }

    pub fn list_by_mode(&self, mode: AgentMode) -> Vec<&AgentProfile> {
        self.list().into_iter().filter(|p| p.mode == mode).collect()
    }
}
