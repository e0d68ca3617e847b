//! The agent execution loop (spec §4.3): single-flight busy tracking,
//! compaction policy, dangling tool-use repair, and the streaming turn
//! driver that ties them together.

pub mod busy;
pub mod compaction;
pub mod repair;
pub mod turn;

pub use busy::{summarize_key, BusyGuard, BusyMap};
pub use turn::{TurnDriver, TurnEvent, TurnRequest};
