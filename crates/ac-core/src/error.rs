//! Error taxonomy (spec §7). Errors that a model can usefully respond to
//! become tool-result content upstream; errors here are the ones callers of
//! the core need to match on.

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("session '{0}' is already busy")]
    SessionBusy(String),

    #[error("request was cancelled")]
    RequestCancelled,

    #[error("permission denied for tool '{0}'")]
    PermissionDenied(String),

    #[error("tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("agent '{0}' not found")]
    AgentNotFound(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(
        "agent '{requested}' is not a subordinate agent; valid subordinates: {valid:?}"
    )]
    NotSubordinate {
        requested: String,
        valid: Vec<String>,
    },
}

impl CoreError {
    /// Database errors on file-history insert are retried up to three times
    /// on a unique-constraint collision (spec §6); this distinguishes that
    /// case from a terminal database error.
    pub fn is_unique_constraint_collision(&self) -> bool {
        matches!(self, CoreError::DatabaseError(msg) if msg.contains("unique constraint"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_busy_message_includes_id() {
        let err = CoreError::SessionBusy("sess-1".into());
        assert_eq!(err.to_string(), "session 'sess-1' is already busy");
    }

    #[test]
    fn not_subordinate_lists_valid_choices() {
        let err = CoreError::NotSubordinate {
            requested: "coordinator".into(),
            valid: vec!["explorer".into(), "coder".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("coordinator"));
        assert!(msg.contains("explorer"));
    }

    #[test]
    fn unique_constraint_detection() {
        let collision = CoreError::DatabaseError("unique constraint failed: path".into());
        assert!(collision.is_unique_constraint_collision());
        let other = CoreError::DatabaseError("disk full".into());
        assert!(!other.is_unique_constraint_collision());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CoreError>();
    }
}
