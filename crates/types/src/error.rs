use thiserror::Error;

/// The error currency for the whole MCP client runtime.
///
/// Every layer (transport, client, manager, bridge) returns `Result<T, McpError>`
/// rather than boxing into `anyhow::Error`, so callers can match on the kind of
/// failure instead of parsing a message.
#[derive(Debug, Error, Clone)]
pub enum McpError {
    #[error("invalid server config: {0}")]
    Config(String),

    #[error("server {0} is not connected")]
    NotConnected(String),

    #[error("wire error: {0}")]
    Wire(String),

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("call to {method} timed out after {elapsed_ms}ms")]
    Timeout { method: String, elapsed_ms: u64 },

    #[error("call cancelled")]
    Cancelled,

    #[error("transport closed")]
    TransportClosed,

    #[error("too many pending requests")]
    Backpressure,

    #[error("initialize failed: {0}")]
    InitializeFailure(String),

    #[error("sampling handler error: {0}")]
    SamplingHandler(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("http error: {0}")]
    Http(String),
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Wire(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Process(err.to_string())
    }
}

impl McpError {
    /// Standard JSON-RPC / MCP error codes used when constructing outbound
    /// error envelopes (e.g. responding to a server-initiated sampling request).
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const RESOURCE_NOT_FOUND: i64 = -32001;
    pub const TOOL_NOT_FOUND: i64 = -32002;
    pub const PROMPT_NOT_FOUND: i64 = -32003;
}
