//! A single live connection to one MCP server (spec §4.5).

use crate::config::{McpServerConfig, McpTransport};
use anyhow::{anyhow, Context, Result};
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use rmcp::service::{RunningService, ServiceExt};
use rmcp::RoleClient;
use std::time::Duration;
use tokio::process::{Child, Command};

const START_TIMEOUT: Duration = Duration::from_secs(20);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// A live MCP connection. Dropped without an explicit `shutdown` call, the
/// child process (if any) is reclaimed when `child` is dropped.
pub struct McpClient {
    service: RunningService<RoleClient, ()>,
    child: Option<Child>,
}

impl McpClient {
    /// Connect to `config`, bounded by [`START_TIMEOUT`].
    pub async fn start(config: &McpServerConfig) -> Result<Self> {
        tokio::time::timeout(START_TIMEOUT, Self::connect(config))
            .await
            .map_err(|_| anyhow!("starting MCP server '{}' timed out after {:?}", config.name, START_TIMEOUT))?
    }

    async fn connect(config: &McpServerConfig) -> Result<Self> {
        match &config.transport {
            McpTransport::Stdio { command, args, env } => Self::connect_stdio(config, command, args, env).await,
            McpTransport::Sse { url } | McpTransport::StreamableHttp { url } => {
                Self::connect_http(config, url).await
            }
        }
    }

    async fn connect_stdio(
        config: &McpServerConfig,
        command: &str,
        args: &[String],
        env: &std::collections::HashMap<String, String>,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::null());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn MCP server '{}'", config.name))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to capture stdout for MCP server '{}'", config.name))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to capture stdin for MCP server '{}'", config.name))?;

        let service = ()
            .serve((stdout, stdin))
            .await
            .with_context(|| format!("failed to handshake with MCP server '{}'", config.name))?;

        Ok(Self { service, child: Some(child) })
    }

    async fn connect_http(config: &McpServerConfig, url: &str) -> Result<Self> {
        use rmcp::transport::StreamableHttpClientTransport;

        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let service: RunningService<RoleClient, ()> = ()
            .serve(transport)
            .await
            .with_context(|| format!("failed to connect to MCP server '{}' at {url}", config.name))?;

        Ok(Self { service, child: None })
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result = self.service.list_tools(None).await?;
        Ok(result.tools)
    }

    pub async fn call_tool(&self, request: CallToolRequestParam) -> Result<CallToolResult> {
        Ok(self.service.call_tool(request).await?)
    }

    pub async fn shutdown(mut self) {
        let _ = self.service.cancel().await;
        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    let _ = child.kill().await;
                }
            }
        }
    }
}
