//! The delegation ("task") tool (spec §4.4): spawns or resumes a subordinate
//! agent on a child session, running its turn to completion before handing
//! a reply back to the calling agent.

pub mod task_tool;

pub use task_tool::{TaskTool, TaskToolConfig};
