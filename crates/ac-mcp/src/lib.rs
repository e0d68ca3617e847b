//! MCP server configuration, client connections, and a TTL-cached tool
//! registry (spec §4.5).

pub mod cache;
pub mod client;
pub mod config;
pub mod registry;

pub use cache::{ToolCache, CACHE_TTL};
pub use client::McpClient;
pub use config::{McpServerConfig, McpTransport};
pub use registry::{DiscoveredTool, McpRegistry};
