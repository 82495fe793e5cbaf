//! Selects and constructs the concrete transport for a server's configured kind.

use mcp_types::{McpError, ServerConfig, TransportKind};

use crate::{HttpTransport, StdioTransport, Transport};

/// Validates `config` and builds the transport it names. Construction never
/// spawns a process or opens a connection — that happens in `Transport::connect`.
pub fn create_transport(config: ServerConfig) -> Result<Box<dyn Transport>, McpError> {
    config.validate()?;
    match config.transport {
        TransportKind::Stdio => Ok(Box::new(StdioTransport::new(config))),
        TransportKind::Http => Ok(Box::new(HttpTransport::new(config))),
    }
}
