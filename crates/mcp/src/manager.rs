//! Fleet-level registry of MCP servers: holds one [`Client`] per configured
//! server, drives connect/disconnect, and aggregates capabilities and routes
//! calls across the whole fleet.

use std::collections::HashMap;
use std::sync::Arc;

use mcp_types::{McpError, PromptDescriptor, ResourceDescriptor, ServerConfig, ToolDescriptor};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::client::Client;

/// Owns every configured server's [`Client`] behind a shared registry. Cheap
/// to clone: internal state lives behind `Arc`.
#[derive(Clone)]
pub struct Manager {
    clients: Arc<RwLock<HashMap<String, Arc<Client>>>>,
    host_name: String,
    host_version: String,
}

impl Manager {
    pub fn new(host_name: impl Into<String>, host_version: impl Into<String>) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            host_name: host_name.into(),
            host_version: host_version.into(),
        }
    }

    /// Registers `config` and, if `auto_start` is set, connects it immediately.
    /// Connecting a server that is already registered and connected is a no-op.
    pub async fn start(&self, config: ServerConfig) -> Result<(), McpError> {
        config.validate()?;
        let id = config.id.clone();
        let auto_start = config.auto_start;

        {
            let clients = self.clients.read().await;
            if clients.contains_key(&id) {
                return Ok(());
            }
        }

        let client = Arc::new(Client::new(config, self.host_name.clone(), self.host_version.clone())?);
        self.clients.write().await.insert(id.clone(), Arc::clone(&client));

        if auto_start {
            self.connect(&id).await?;
        }
        Ok(())
    }

    /// Registers an entire fleet in one call. For each config, `start` runs
    /// (register, then connect if `auto_start`); a failure on any single
    /// server — bad config or a failed handshake — is logged and skipped so
    /// the rest of the fleet still comes up (SPEC_FULL.md 4.6/7).
    pub async fn start_all(&self, configs: impl IntoIterator<Item = ServerConfig>) {
        for config in configs {
            let id = config.id.clone();
            if let Err(e) = self.start(config).await {
                tracing::warn!(server_id = %id, error = %e, "failed to start server, skipping");
            }
        }
    }

    /// Connects the named server. A server already in `Ready` state is left
    /// untouched rather than reconnected.
    pub async fn connect(&self, id: &str) -> Result<(), McpError> {
        let client = self.require_client(id).await?;
        if client.state() == crate::client::ClientState::Ready {
            return Ok(());
        }
        client.connect().await
    }

    /// Closes the named client and removes it from the registry entirely —
    /// a later `connect(id)` with the same id starts a fresh `Client` rather
    /// than resuming a closed one.
    pub async fn disconnect(&self, id: &str) -> Result<(), McpError> {
        let client = self.require_client(id).await?;
        let result = client.close().await;
        self.clients.write().await.remove(id);
        result
    }

    pub async fn stop(&self) -> Result<(), McpError> {
        let clients: Vec<Arc<Client>> = self.clients.read().await.values().cloned().collect();
        for client in clients {
            client.close().await?;
        }
        Ok(())
    }

    pub async fn status(&self, id: &str) -> Option<crate::client::ClientState> {
        let clients = self.clients.read().await;
        clients.get(id).map(|c| c.state())
    }

    pub async fn server_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn require_client(&self, id: &str) -> Result<Arc<Client>, McpError> {
        self.clients
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| McpError::NotConnected(id.to_string()))
    }

    /// Every tool across every connected server, tagged with its owning
    /// server id. Servers are visited in sorted id order for deterministic
    /// output.
    pub async fn all_tools(&self) -> Vec<(String, ToolDescriptor)> {
        let mut out = Vec::new();
        for id in self.server_ids().await {
            if let Ok(client) = self.require_client(&id).await {
                for tool in client.tools().await {
                    out.push((id.clone(), tool));
                }
            }
        }
        out
    }

    /// `(server_id, tool_name, input_schema)` triples across every connected
    /// server, in the same sorted-server order as `all_tools` — a thin
    /// projection for callers (e.g. a schema summary endpoint) that only
    /// need the schema, not the full descriptor.
    pub async fn tool_schemas(&self) -> Vec<(String, String, Value)> {
        self.all_tools()
            .await
            .into_iter()
            .map(|(server_id, tool)| (server_id, tool.name, tool.input_schema))
            .collect()
    }

    pub async fn all_resources(&self) -> Vec<(String, ResourceDescriptor)> {
        let mut out = Vec::new();
        for id in self.server_ids().await {
            if let Ok(client) = self.require_client(&id).await {
                for resource in client.resources().await {
                    out.push((id.clone(), resource));
                }
            }
        }
        out
    }

    pub async fn all_prompts(&self) -> Vec<(String, PromptDescriptor)> {
        let mut out = Vec::new();
        for id in self.server_ids().await {
            if let Ok(client) = self.require_client(&id).await {
                for prompt in client.prompts().await {
                    out.push((id.clone(), prompt));
                }
            }
        }
        out
    }

    /// Finds the first connected server advertising a tool named `tool_name`.
    pub async fn find_tool(&self, tool_name: &str) -> Option<(String, ToolDescriptor)> {
        for id in self.server_ids().await {
            if let Ok(client) = self.require_client(&id).await {
                if let Some(tool) = client.find_tool(tool_name).await {
                    return Some((id, tool));
                }
            }
        }
        None
    }

    pub async fn call_tool(&self, server_id: &str, tool_name: &str, arguments: Value) -> Result<Value, McpError> {
        self.require_client(server_id).await?.call_tool(tool_name, arguments).await
    }

    pub async fn read_resource(&self, server_id: &str, uri: &str) -> Result<Value, McpError> {
        self.require_client(server_id).await?.read_resource(uri).await
    }

    pub async fn get_prompt(&self, server_id: &str, prompt_name: &str, arguments: Value) -> Result<Value, McpError> {
        self.require_client(server_id).await?.get_prompt(prompt_name, arguments).await
    }

    pub async fn client(&self, id: &str) -> Option<Arc<Client>> {
        self.clients.read().await.get(id).cloned()
    }
}
