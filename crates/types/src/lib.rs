//! Shared types for the MCP client runtime: wire protocol, capability
//! descriptors, server configuration, and the error taxonomy.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod protocol;

pub use capabilities::{
    ContentItem, PromptArgument, PromptDescriptor, ResourceDescriptor, SamplingMessage,
    SamplingRequest, SamplingResponse, ToolCallResult, ToolDescriptor,
};
pub use config::{HttpTransportConfig, ServerConfig, StdioTransportConfig, TransportKind};
pub use error::McpError;
pub use protocol::{JsonRpcError, Message, RequestId, JSONRPC_VERSION};
