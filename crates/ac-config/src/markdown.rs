//! Discovery of agent profiles from markdown files with a TOML front-matter
//! block (spec §4.1). Each file is read as:
//!
//! ```text
//! ---
//! name = "Reviewer"
//! mode = "subagent"
//! ---
//! System prompt body goes here.
//! ```
//!
//! The front matter supplies the scalar/table fields; the body becomes the
//! profile's `system_prompt`. A file's stem (minus `.md`) is its agent id.

use crate::merge::ProfileOverlay;
use ac_core::{AgentMode, ReasoningEffort};
use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// The directories markdown agent profiles are discovered from, in
/// increasing precedence (later roots overlay earlier ones by id).
pub struct MarkdownDiscoveryRoots {
    pub roots: Vec<PathBuf>,
}

impl MarkdownDiscoveryRoots {
    /// `$HOME/.config/opencode/agents`, `$HOME/.agents/types`,
    /// `<work_dir>/.opencode/agents`, `<work_dir>/.agents/types`.
    pub fn standard(work_dir: &Path) -> Self {
        let mut roots = Vec::new();
        if let Some(base) = BaseDirs::new() {
            roots.push(base.home_dir().join(".config/opencode/agents"));
            roots.push(base.home_dir().join(".agents/types"));
        }
        roots.push(work_dir.join(".opencode/agents"));
        roots.push(work_dir.join(".agents/types"));
        Self { roots }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct FrontMatter {
    name: Option<String>,
    description: Option<String>,
    mode: Option<String>,
    hidden: Option<bool>,
    model: Option<String>,
    max_output_tokens: Option<u32>,
    reasoning_effort: Option<String>,
    color: Option<String>,
    #[serde(default)]
    permission: std::collections::HashMap<String, toml::Value>,
    #[serde(default)]
    tools: std::collections::HashMap<String, bool>,
    output: Option<OutputSection>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct OutputSection {
    schema: Option<toml::Value>,
}

fn split_front_matter(contents: &str) -> (Option<&str>, &str) {
    let rest = match contents.strip_prefix("---") {
        Some(rest) => rest,
        None => return (None, contents),
    };
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    match rest.find("\n---") {
        Some(end) => {
            let front = &rest[..end];
            let after = &rest[end + 4..];
            let body = after.strip_prefix('\n').unwrap_or(after);
            (Some(front), body)
        }
        None => (None, contents),
    }
}

fn toml_value_to_permission(value: toml::Value) -> Option<ac_core::PermissionValue> {
    match value {
        toml::Value::String(s) => Some(ac_core::PermissionValue::Single(s)),
        toml::Value::Table(table) => {
            let map = table
                .into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                .collect();
            Some(ac_core::PermissionValue::Patterned(map))
        }
        _ => None,
    }
}

fn parse_markdown_file(path: &Path, contents: &str) -> Result<ProfileOverlay> {
    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("agent markdown file has no stem")?
        .to_string();

    let (front, body) = split_front_matter(contents);
    let front: FrontMatter = match front {
        Some(front) => toml::from_str(front).with_context(|| format!("parsing front matter for {id}"))?,
        None => FrontMatter::default(),
    };

    let mode = front.mode.as_deref().and_then(|m| match m {
        "agent" => Some(AgentMode::Primary),
        "subagent" => Some(AgentMode::Subordinate),
        other => {
            warn!(agent = %id, mode = other, "unrecognized agent mode in front matter, ignoring");
            None
        }
    });

    let reasoning_effort = front.reasoning_effort.as_deref().and_then(|e| match e {
        "low" => Some(ReasoningEffort::Low),
        "medium" => Some(ReasoningEffort::Medium),
        "high" => Some(ReasoningEffort::High),
        "none" => Some(ReasoningEffort::None),
        other => {
            warn!(agent = %id, effort = other, "unrecognized reasoning effort in front matter, ignoring");
            None
        }
    });

    let permission = front
        .permission
        .into_iter()
        .filter_map(|(k, v)| toml_value_to_permission(v).map(|pv| (k, pv)))
        .collect();

    let output_schema = front.output.and_then(|o| o.schema).and_then(|schema| {
        serde_json::to_value(schema)
            .inspect_err(|err| warn!(agent = %id, error = %err, "malformed output.schema in front matter, ignoring"))
            .ok()
    });

    Ok(ProfileOverlay {
        id,
        name: front.name,
        description: front.description,
        mode,
        hidden: front.hidden,
        model: front.model,
        max_output_tokens: front.max_output_tokens,
        reasoning_effort,
        system_prompt: Some(body.trim().to_string()),
        color: front.color,
        permission,
        tools: front.tools,
        output_schema,
        origin: path.display().to_string(),
    })
}

/// Walk each discovery root (non-recursive, `*.md` files only) and parse
/// every file found. A root that doesn't exist is silently skipped; a file
/// that fails to parse is logged and skipped rather than aborting discovery.
pub fn discover_markdown_profiles(roots: &MarkdownDiscoveryRoots) -> Result<Vec<ProfileOverlay>> {
    let mut overlays = Vec::new();
    for root in &roots.roots {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to read agent markdown file");
                    continue;
                }
            };
            match parse_markdown_file(&path, &contents) {
                Ok(overlay) => overlays.push(overlay),
                Err(err) => warn!(path = %path.display(), error = %err, "failed to parse agent markdown file"),
            }
        }
    }
    Ok(overlays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_front_matter_and_body() {
        let contents = "---\nname = \"Reviewer\"\nmode = \"subagent\"\n---\nYou review diffs.\n";
        let overlay = parse_markdown_file(Path::new("/agents/reviewer.md"), contents).unwrap();
        assert_eq!(overlay.id, "reviewer");
        assert_eq!(overlay.name.as_deref(), Some("Reviewer"));
        assert_eq!(overlay.mode, Some(AgentMode::Subordinate));
        assert_eq!(overlay.system_prompt.as_deref(), Some("You review diffs."));
    }

    #[test]
    fn mode_agent_maps_to_primary() {
        let contents = "---\nmode = \"agent\"\n---\nBody\n";
        let overlay = parse_markdown_file(Path::new("/agents/coordinator.md"), contents).unwrap();
        assert_eq!(overlay.mode, Some(AgentMode::Primary));
    }

    #[test]
    fn parses_output_schema_from_front_matter() {
        let contents = "---\n[output.schema]\ntype = \"object\"\n\n[output.schema.properties.verdict]\ntype = \"string\"\n---\nBody\n";
        let overlay = parse_markdown_file(Path::new("/agents/judge.md"), contents).unwrap();
        let schema = overlay.output_schema.unwrap();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["verdict"]["type"], "string");
    }

    #[test]
    fn file_without_front_matter_still_parses_as_body_only() {
        let contents = "Just a plain prompt, no front matter.";
        let overlay = parse_markdown_file(Path::new("/agents/plain.md"), contents).unwrap();
        assert!(overlay.name.is_none());
        assert_eq!(overlay.system_prompt.as_deref(), Some(contents));
    }

    #[test]
    fn discover_skips_missing_roots_and_finds_existing_ones() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("reviewer.md"), "---\nname = \"Reviewer\"\n---\nBody\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let roots = MarkdownDiscoveryRoots {
            roots: vec![dir.path().to_path_buf(), dir.path().join("missing")],
        };
        let overlays = discover_markdown_profiles(&roots).unwrap();
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].id, "reviewer");
    }

    #[test]
    fn unrecognized_mode_is_ignored_rather_than_erroring() {
        let contents = "---\nmode = \"omniscient\"\n---\nBody\n";
        let overlay = parse_markdown_file(Path::new("/agents/weird.md"), contents).unwrap();
        assert!(overlay.mode.is_none());
    }
}
