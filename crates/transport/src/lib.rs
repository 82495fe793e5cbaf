//! Transport layer for the MCP client runtime.
//!
//! Both the stdio transport (a child process speaking NDJSON) and the HTTP
//! transport (POST + SSE) implement the same [`Transport`] trait, so the
//! [`Client`](../mcp_client) layer above never has to know which one it is
//! talking to. [`factory::create_transport`] picks the concrete type from a
//! [`ServerConfig`](mcp_types::ServerConfig).

pub mod factory;
pub mod http;
pub mod stdio;

use std::time::Duration;

use async_trait::async_trait;
use mcp_types::{McpError, RequestId};
use serde_json::Value;
use tokio::sync::mpsc;

pub use factory::create_transport;
pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// Channel capacity for the `events`/`requests` dispatch channels. A slow
/// consumer drops rather than blocks the transport's single reader task —
/// see `Transport::take_events`/`take_requests`.
pub const DISPATCH_CHANNEL_CAPACITY: usize = 100;

/// Maximum number of in-flight `Call`s a stdio transport will track. Beyond
/// this, `Call` is rejected immediately rather than queued.
pub const MAX_PENDING_REQUESTS: usize = 1000;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome a caller hands to `Transport::respond` when answering a
/// server-initiated request (currently only `sampling/createMessage`).
#[derive(Debug, Clone)]
pub enum RpcOutcome {
    Result(Value),
    Error { code: i64, message: String },
}

/// Common capability set shared by the stdio and HTTP transports: connect,
/// close (idempotent), call (request/response), notify (fire-and-forget),
/// respond (answer a server-initiated request), and the two inbound dispatch
/// channels for notifications and server-initiated requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), McpError>;

    /// Idempotent: calling `close` on an already-closed transport returns `Ok(())`.
    async fn close(&self) -> Result<(), McpError>;

    async fn call(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value, McpError>;

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError>;

    async fn respond(&self, id: &RequestId, outcome: RpcOutcome) -> Result<(), McpError>;

    fn connected(&self) -> bool;

    /// Takes ownership of the notification-dispatch channel. Returns `None`
    /// if already taken — there is exactly one consumer per transport
    /// (the owning `Client`'s dispatch loop).
    fn take_events(&self) -> Option<mpsc::Receiver<Value>>;

    /// Takes ownership of the server-initiated-request dispatch channel.
    fn take_requests(&self) -> Option<mpsc::Receiver<Value>>;
}
