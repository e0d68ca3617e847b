//! Session and file-history storage contracts, plus a file-backed reference
//! implementation (spec §6). The SQL-backed production store is out of
//! scope; consumers program against [`SessionStore`] and [`FileHistoryStore`].

pub mod file_history_store;
pub mod file_store;
pub mod genealogy;
pub mod message_store;
pub mod store;

pub use file_history_store::FileHistoryFileStore;
pub use file_store::FileSessionStore;
pub use message_store::FileMessageStore;
pub use store::{FileHistoryStore, MessageStore, SessionStore, StoreResult, SummaryMarker};
