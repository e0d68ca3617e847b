//! The MCP registry: one client plus one tool cache per configured server,
//! with a streaming enumerator over all servers' tools (spec §4.5).

use crate::cache::ToolCache;
use crate::client::McpClient;
use crate::config::McpServerConfig;
use anyhow::{anyhow, Result};
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

const LOAD_TOOLS_TIMEOUT: Duration = Duration::from_secs(30);

struct ServerEntry {
    config: McpServerConfig,
    client: Mutex<Option<Arc<McpClient>>>,
    cache: ToolCache<Tool>,
}

impl ServerEntry {
    async fn client(self: &Arc<Self>) -> Result<Arc<McpClient>> {
        let mut guard = self.client.lock().await;
        if let Some(client) = &*guard {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(McpClient::start(&self.config).await?);
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn cached_tools(self: &Arc<Self>) -> Result<Vec<Tool>> {
        let this = Arc::clone(self);
        self.cache
            .get_or_fetch(move || async move {
                let client = this.client().await?;
                client.list_tools().await
            })
            .await
    }
}

/// A tool discovered from a particular MCP server, tagged with the server
/// it came from so a call can be routed back to the right client.
#[derive(Debug, Clone)]
pub struct DiscoveredTool {
    pub server_name: String,
    pub tool: Tool,
}

pub struct McpRegistry {
    servers: RwLock<HashMap<String, Arc<ServerEntry>>>,
}

impl McpRegistry {
    pub fn new(configs: Vec<McpServerConfig>) -> Self {
        let servers = configs
            .into_iter()
            .map(|config| {
                let name = config.name.clone();
                let entry = Arc::new(ServerEntry {
                    config,
                    client: Mutex::new(None),
                    cache: ToolCache::default(),
                });
                (name, entry)
            })
            .collect();
        Self { servers: RwLock::new(servers) }
    }

    /// Enumerate tools across every configured server concurrently, one
    /// task per server bounded by [`LOAD_TOOLS_TIMEOUT`]. A server that
    /// fails or times out is logged and skipped rather than failing the
    /// whole load.
    pub async fn load_tools(&self) -> Vec<DiscoveredTool> {
        let servers: Vec<Arc<ServerEntry>> = self.servers.read().await.values().cloned().collect();
        let mut join_set = tokio::task::JoinSet::new();

        for entry in servers {
            let name = entry.config.name.clone();
            join_set.spawn(async move {
                let result = tokio::time::timeout(LOAD_TOOLS_TIMEOUT, entry.cached_tools()).await;
                (name, result)
            });
        }

        let mut discovered = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (name, result) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "MCP load-tools task panicked");
                    continue;
                }
            };
            match result {
                Ok(Ok(tools)) => {
                    discovered.extend(
                        tools.into_iter().map(|tool| DiscoveredTool { server_name: name.clone(), tool }),
                    );
                }
                Ok(Err(err)) => warn!(server = %name, error = %err, "failed to load MCP tools"),
                Err(_) => warn!(server = %name, "loading MCP tools timed out"),
            }
        }
        discovered
    }

    pub async fn call_tool(&self, server_name: &str, request: CallToolRequestParam) -> Result<CallToolResult> {
        let entry = {
            let servers = self.servers.read().await;
            servers
                .get(server_name)
                .cloned()
                .ok_or_else(|| anyhow!("unknown MCP server: {server_name}"))?
        };
        let client = entry.client().await?;
        client.call_tool(request).await
    }
}
