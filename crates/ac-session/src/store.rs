//! Storage contracts consumed by the execution loop and delegation tool
//! (spec §6). The SQL-backed production implementation is out of scope here;
//! this crate defines the trait boundary and ships a file-backed reference
//! implementation good enough for a single-node agent process.

use ac_core::{CoreError, FileHistoryEntry, Message, MessageId, Session, SessionId};
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, CoreError>;

/// Per-session message log. Message persistence itself sits outside spec's
/// named store contracts (only session metadata and file-history are
/// specified there), but the turn loop persists after every streamed event,
/// so a trait boundary is needed here too — same shape as [`SessionStore`].
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: &Message) -> StoreResult<()>;

    /// Overwrite an already-persisted message (e.g. the streaming assistant
    /// sink, updated after every provider event).
    async fn update(&self, message: &Message) -> StoreResult<()>;

    async fn list(&self, session_id: &SessionId) -> StoreResult<Vec<Message>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> StoreResult<Session>;

    /// Create (or idempotently return) the child session that backs a single
    /// `task` tool call. Using the tool-call id as the session id makes a
    /// retried tool call resume the same child session rather than forking a
    /// new one.
    async fn create_task_session(
        &self,
        tool_call_id: &str,
        parent_id: &SessionId,
        title: &str,
    ) -> StoreResult<Session>;

    /// Create (or return) the session used for title generation, which is
    /// keyed off the parent session so at most one exists per parent.
    async fn create_title_session(&self, parent_id: &SessionId) -> StoreResult<Session>;

    async fn get(&self, id: &SessionId) -> StoreResult<Session>;

    async fn save(&self, session: &Session) -> StoreResult<()>;

    async fn delete(&self, id: &SessionId) -> StoreResult<()>;

    async fn list_children(&self, parent_id: &SessionId) -> StoreResult<Vec<Session>>;
}

#[async_trait]
pub trait FileHistoryStore: Send + Sync {
    /// Create the next version for `path` within `session_id`. Produces
    /// "initial" if no entry exists yet for the path, else "v<N>" for the
    /// next integer `N`. Retries up to 3 times on a unique-constraint
    /// collision (two writers racing for the same next version).
    async fn create(
        &self,
        session_id: &SessionId,
        path: &str,
        content: String,
    ) -> StoreResult<FileHistoryEntry>;

    async fn get_by_path_and_session(
        &self,
        session_id: &SessionId,
        path: &str,
    ) -> StoreResult<Option<FileHistoryEntry>>;

    async fn list_latest_session_files(&self, session_id: &SessionId) -> StoreResult<Vec<FileHistoryEntry>>;

    /// Latest file state visible to `session_id`, walking up through parent
    /// sessions so a child sees edits its ancestors made.
    async fn list_latest_session_tree_files(
        &self,
        session_id: &SessionId,
    ) -> StoreResult<Vec<FileHistoryEntry>>;
}

/// Identifies a session that owns an in-progress compaction summary, used by
/// the executor to avoid re-summarizing messages already folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryMarker {
    pub message_id: MessageId,
}
