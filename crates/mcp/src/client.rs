//! Per-server MCP session: the `initialize` handshake, capability caches,
//! tool/resource/prompt calls, and the sampling dispatch loop.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcp_types::{
    McpError, PromptDescriptor, ResourceDescriptor, SamplingRequest, SamplingResponse, ServerConfig,
    ToolDescriptor,
};
use mcp_transport::{create_transport, RpcOutcome, Transport};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    New,
    Initializing,
    Ready,
    Closed,
}

impl ClientState {
    fn from_ordinal(value: u8) -> Self {
        match value {
            0 => ClientState::New,
            1 => ClientState::Initializing,
            2 => ClientState::Ready,
            _ => ClientState::Closed,
        }
    }

    fn ordinal(self) -> u8 {
        match self {
            ClientState::New => 0,
            ClientState::Initializing => 1,
            ClientState::Ready => 2,
            ClientState::Closed => 3,
        }
    }
}

/// Handles a server-initiated `sampling/createMessage` request on behalf of
/// the host. Registered once per client via [`Client::set_sampling_handler`].
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn handle(&self, request: SamplingRequest) -> Result<SamplingResponse, McpError>;
}

#[derive(Default)]
struct Capabilities {
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
    prompts: Vec<PromptDescriptor>,
}

pub struct Client {
    config: ServerConfig,
    transport: Arc<dyn Transport>,
    state: AtomicU8,
    capabilities: RwLock<Capabilities>,
    sampling_handler: Arc<RwLock<Option<Arc<dyn SamplingHandler>>>>,
    sampling_task: RwLock<Option<JoinHandle<()>>>,
    events: RwLock<Option<tokio::sync::mpsc::Receiver<Value>>>,
    host_name: String,
    host_version: String,
}

impl Client {
    pub fn new(config: ServerConfig, host_name: impl Into<String>, host_version: impl Into<String>) -> Result<Self, McpError> {
        let transport: Arc<dyn Transport> = Arc::from(create_transport(config.clone())?);
        Ok(Self {
            config,
            transport,
            state: AtomicU8::new(ClientState::New.ordinal()),
            capabilities: RwLock::new(Capabilities::default()),
            sampling_handler: Arc::new(RwLock::new(None)),
            sampling_task: RwLock::new(None),
            events: RwLock::new(None),
            host_name: host_name.into(),
            host_version: host_version.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_ordinal(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ClientState) {
        self.state.store(state.ordinal(), Ordering::SeqCst);
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Runs the full connect sequence: transport connect, `initialize`
    /// handshake, `notifications/initialized`, then `refresh_capabilities`.
    /// A handshake failure closes the transport and surfaces the error;
    /// a capability-refresh failure is best-effort (the client still
    /// reaches `Ready` with whatever caches populated successfully).
    pub async fn connect(&self) -> Result<(), McpError> {
        self.set_state(ClientState::Initializing);
        self.transport.connect().await?;

        let events_rx = self.transport.take_events();
        let requests_rx = self.transport.take_requests();

        let init_params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "roots": { "listChanged": true } },
            "clientInfo": { "name": self.host_name, "version": self.host_version },
        });

        let result = self.transport.call("initialize", Some(init_params), self.timeout()).await;
        let _server_info = match result {
            Ok(value) => value,
            Err(e) => {
                self.transport.close().await.ok();
                self.set_state(ClientState::Closed);
                return Err(McpError::InitializeFailure(e.to_string()));
            }
        };

        if let Err(e) = self.transport.notify("notifications/initialized", None).await {
            tracing::warn!(server_id = %self.config.id, error = %e, "notifications/initialized failed");
        }

        self.refresh_capabilities().await;
        self.set_state(ClientState::Ready);

        if let Some(requests_rx) = requests_rx {
            self.spawn_sampling_pump(requests_rx).await;
        }
        *self.events.write().await = events_rx;

        Ok(())
    }

    /// Takes ownership of the notification-dispatch channel for this server,
    /// so a host can observe any `method`-bearing message other than
    /// `sampling/createMessage` (per SPEC_FULL.md 4.3: "optional observation").
    /// Returns `None` if already taken or if `connect` hasn't run yet.
    pub async fn take_events(&self) -> Option<tokio::sync::mpsc::Receiver<Value>> {
        self.events.write().await.take()
    }

    /// Issues `tools/list`, `resources/list`, and `prompts/list`. Any
    /// individual failure leaves that cache untouched (stale-but-present,
    /// or empty on first connect) rather than failing the whole refresh.
    pub async fn refresh_capabilities(&self) {
        let mut caps = self.capabilities.write().await;

        match self.transport.call("tools/list", None, self.timeout()).await {
            Ok(value) => {
                if let Some(tools) = value.get("tools").and_then(|v| v.as_array()) {
                    caps.tools = tools
                        .iter()
                        .filter_map(|t| serde_json::from_value(t.clone()).ok())
                        .collect();
                }
            }
            Err(e) => tracing::debug!(server_id = %self.config.id, error = %e, "tools/list failed"),
        }

        match self.transport.call("resources/list", None, self.timeout()).await {
            Ok(value) => {
                if let Some(resources) = value.get("resources").and_then(|v| v.as_array()) {
                    caps.resources = resources
                        .iter()
                        .filter_map(|r| serde_json::from_value(r.clone()).ok())
                        .collect();
                }
            }
            Err(e) => tracing::debug!(server_id = %self.config.id, error = %e, "resources/list failed"),
        }

        match self.transport.call("prompts/list", None, self.timeout()).await {
            Ok(value) => {
                if let Some(prompts) = value.get("prompts").and_then(|v| v.as_array()) {
                    caps.prompts = prompts
                        .iter()
                        .filter_map(|p| serde_json::from_value(p.clone()).ok())
                        .collect();
                }
            }
            Err(e) => tracing::debug!(server_id = %self.config.id, error = %e, "prompts/list failed"),
        }
    }

    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.capabilities.read().await.tools.clone()
    }

    pub async fn resources(&self) -> Vec<ResourceDescriptor> {
        self.capabilities.read().await.resources.clone()
    }

    pub async fn prompts(&self) -> Vec<PromptDescriptor> {
        self.capabilities.read().await.prompts.clone()
    }

    pub async fn find_tool(&self, name: &str) -> Option<ToolDescriptor> {
        self.capabilities.read().await.tools.iter().find(|t| t.name == name).cloned()
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.transport.call("tools/call", Some(params), self.timeout()).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        let params = json!({ "uri": uri });
        self.transport.call("resources/read", Some(params), self.timeout()).await
    }

    pub async fn get_prompt(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.transport.call("prompts/get", Some(params), self.timeout()).await
    }

    /// Replaces the sampling handler observed by the running dispatch loop.
    /// Safe to call before or after `connect`; re-registration swaps the
    /// handler in place rather than spawning a second loop.
    pub async fn set_sampling_handler(&self, handler: Arc<dyn SamplingHandler>) {
        *self.sampling_handler.write().await = Some(handler);
    }

    async fn spawn_sampling_pump(&self, mut requests_rx: tokio::sync::mpsc::Receiver<Value>) {
        let transport = Arc::clone(&self.transport);
        let handler_slot = Arc::clone(&self.sampling_handler);
        let server_id = self.config.id.clone();
        let default_timeout = self.timeout();

        let task = tokio::spawn(async move {
            while let Some(message) = requests_rx.recv().await {
                let Some(method) = message.get("method").and_then(|m| m.as_str()) else { continue };
                if method != "sampling/createMessage" {
                    continue;
                }
                let Some(id) = message.get("id") else { continue };
                let id = mcp_types::RequestId::from(id);
                let params = message.get("params").cloned().unwrap_or(Value::Null);
                let transport = Arc::clone(&transport);
                let handler_slot = Arc::clone(&handler_slot);
                let server_id = server_id.clone();

                tokio::spawn(async move {
                    let outcome = tokio::time::timeout(
                        default_timeout,
                        handle_sampling_request(params, &handler_slot),
                    )
                    .await
                    .unwrap_or_else(|_| RpcOutcome::Error {
                        code: McpError::INTERNAL_ERROR,
                        message: "sampling handler timed out".into(),
                    });
                    if let Err(e) = transport.respond(&id, outcome).await {
                        tracing::warn!(server_id = %server_id, error = %e, "failed to respond to sampling request");
                    }
                });
            }
        });

        *self.sampling_task.write().await = Some(task);
    }

    pub async fn close(&self) -> Result<(), McpError> {
        self.set_state(ClientState::Closed);
        if let Some(task) = self.sampling_task.write().await.take() {
            task.abort();
        }
        self.transport.close().await
    }
}

async fn handle_sampling_request(
    params: Value,
    handler_slot: &RwLock<Option<Arc<dyn SamplingHandler>>>,
) -> RpcOutcome {
    let request: SamplingRequest = match serde_json::from_value(params) {
        Ok(req) => req,
        Err(e) => {
            return RpcOutcome::Error {
                code: McpError::INVALID_PARAMS,
                message: format!("invalid sampling params: {e}"),
            }
        }
    };

    let handler = handler_slot.read().await.clone();
    let Some(handler) = handler else {
        return RpcOutcome::Error {
            code: McpError::INTERNAL_ERROR,
            message: "no sampling handler registered".into(),
        };
    };

    match handler.handle(request).await {
        Ok(response) => match serde_json::to_value(response) {
            Ok(value) => RpcOutcome::Result(value),
            Err(e) => RpcOutcome::Error { code: McpError::INTERNAL_ERROR, message: e.to_string() },
        },
        Err(e) => RpcOutcome::Error { code: McpError::INTERNAL_ERROR, message: e.to_string() },
    }
}
