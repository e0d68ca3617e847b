//! `FileHistoryEntry` and version ordering (spec §3, §4.6, §8).

use crate::ids::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHistoryEntry {
    pub id: Ulid,
    pub session_id: SessionId,
    pub path: String,
    pub content: String,
    /// Literal "initial" or "v<integer>".
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// "initial" -> -1, "v<N>" -> N, anything else -> -2 (spec §4.6, §8).
pub fn parse_version_num(version: &str) -> i64 {
    if version == "initial" {
        return -1;
    }
    match version.strip_prefix('v').and_then(|n| n.parse::<i64>().ok()) {
        Some(n) => n,
        None => -2,
    }
}

/// Given entries for a single path, return the one with the highest parsed
/// version number. Ties break on enumeration order (first one seen wins),
/// matching spec §4.6/§8 scenario 5 (out-of-order timestamps do not affect
/// the winner).
pub fn latest_by_version<'a>(entries: &'a [FileHistoryEntry]) -> Option<&'a FileHistoryEntry> {
    entries
        .iter()
        .max_by_key(|entry| parse_version_num(&entry.version))
}

/// Group entries by path and keep only the latest version of each.
pub fn latest_by_path(entries: &[FileHistoryEntry]) -> Vec<&FileHistoryEntry> {
    use std::collections::HashMap;
    let mut by_path: HashMap<&str, &FileHistoryEntry> = HashMap::new();
    for entry in entries {
        match by_path.get(entry.path.as_str()) {
            Some(current) if parse_version_num(&current.version) >= parse_version_num(&entry.version) => {}
            _ => {
                by_path.insert(&entry.path, entry);
            }
        }
    }
    by_path.into_values().collect()
}
