//! Multi-server MCP client runtime: per-server sessions, a fleet manager,
//! and the bridge that exposes MCP tools under safe, host-unique names.

pub mod bridge;
pub mod client;
pub mod manager;
pub mod sanitize;

pub use bridge::{Bridge, BridgedTool};
pub use client::{Client, ClientState, SamplingHandler};
pub use manager::Manager;
pub use sanitize::safe_name;
