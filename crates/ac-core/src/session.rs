//! `Session` (spec §3).

use crate::ids::{MessageId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub project_id: String,
    /// Project-relative filesystem root; ambient plumbing, not in spec.md's
    /// data model but required by file-history/markdown discovery.
    pub project_root: std::path::PathBuf,
    pub parent_session_id: Option<SessionId>,
    pub root_session_id: SessionId,
    pub title: String,
    pub message_count: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub summary_message_id: Option<MessageId>,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new root session.
    pub fn new_root(project_id: impl Into<String>, project_root: std::path::PathBuf) -> Self {
        let id = SessionId::new();
        let now = Utc::now();
        Self {
            id,
            project_id: project_id.into(),
            project_root,
            parent_session_id: None,
            root_session_id: id,
            title: String::new(),
            message_count: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            summary_message_id: None,
            cost: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a child session under `parent`. `root_session_id` is the
    /// parent's root, or the parent's own id if the parent is itself a root
    /// (spec §3 invariant).
    pub fn new_child(parent: &Session, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            project_id: parent.project_id.clone(),
            project_root: parent.project_root.clone(),
            parent_session_id: Some(parent.id),
            root_session_id: parent.root_session_id,
            title: title.into(),
            message_count: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            summary_message_id: None,
            cost: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_session_id.is_none() && self.root_session_id == self.id
    }

    /// Cost must be monotonically non-decreasing within a session (spec §3,
    /// §8 "Cost monotonicity"). Negative deltas are a programming error.
    pub fn add_cost(&mut self, delta: f64) {
        debug_assert!(delta >= 0.0, "cost deltas must be non-negative");
        self.cost += delta.max(0.0);
        self.updated_at = Utc::now();
    }

    pub fn record_usage(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_session_is_its_own_root() {
        let session = Session::new_root("proj", "/tmp/proj".into());
        assert!(session.is_root());
        assert_eq!(session.root_session_id, session.id);
        assert!(session.parent_session_id.is_none());
    }

    #[test]
    fn child_session_inherits_root_from_parent() {
        let root = Session::new_root("proj", "/tmp/proj".into());
        let child = Session::new_child(&root, "child task");
        assert_eq!(child.root_session_id, root.id);
        assert_eq!(child.parent_session_id, Some(root.id));
        assert!(!child.is_root());
    }

    #[test]
    fn grandchild_inherits_root_from_ancestor_chain() {
        let root = Session::new_root("proj", "/tmp/proj".into());
        let child = Session::new_child(&root, "child");
        let grandchild = Session::new_child(&child, "grandchild");
        assert_eq!(grandchild.root_session_id, root.id);
    }

    #[test]
    fn cost_never_decreases() {
        let mut session = Session::new_root("proj", "/tmp/proj".into());
        session.add_cost(1.5);
        session.add_cost(0.25);
        assert_eq!(session.cost, 1.75);
    }
}
