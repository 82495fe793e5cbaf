//! Per-server configuration and the validation rules that gate transport launch.
//!
//! Loading these values from a config file (YAML, TOML, whatever an embedder
//! prefers) is explicitly someone else's job; this module only defines the
//! shape and the `validate()` invariants a loader must satisfy before a
//! transport is allowed to start.

use std::collections::HashMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::McpError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Substrings disallowed in stdio command arguments; presence of any is
/// treated as a shell-metacharacter injection attempt.
const DANGEROUS_ARG_CHARS: &[&str] =
    &["$(", "${", "`", "&&", "||", ";", "|", ">", "<", "\n", "\r"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StdioTransportConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub workdir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpTransportConfig {
    pub url: String,
    pub headers: HashMap<String, String>,
}

/// Immutable per-server record. Unrecognized fields in the source document
/// are ignored rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub transport: TransportKind,
    #[serde(default)]
    pub stdio: StdioTransportConfig,
    #[serde(default)]
    pub http: HttpTransportConfig,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub auto_start: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates the invariants from the data model: non-empty id, no `..`
    /// traversal in the stdio command/workdir, no shell metacharacters in
    /// args, and an `http://`/`https://` URL for the http transport.
    pub fn validate(&self) -> Result<(), McpError> {
        if self.id.trim().is_empty() {
            return Err(McpError::Config("server id must not be empty".into()));
        }
        match self.transport {
            TransportKind::Stdio => self.validate_stdio(),
            TransportKind::Http => self.validate_http(),
        }
    }

    fn validate_stdio(&self) -> Result<(), McpError> {
        if self.stdio.command.trim().is_empty() {
            return Err(McpError::Config("stdio transport requires a command".into()));
        }
        if contains_path_traversal(&self.stdio.command) {
            return Err(McpError::Config(format!(
                "path traversal detected in command: {}",
                self.stdio.command
            )));
        }
        if let Some(workdir) = &self.stdio.workdir {
            if contains_path_traversal(workdir) {
                return Err(McpError::Config(format!(
                    "path traversal detected in workdir: {workdir}"
                )));
            }
        }
        for arg in &self.stdio.args {
            if let Some(pattern) = find_dangerous_arg_char(arg) {
                return Err(McpError::Config(format!(
                    "shell metacharacters detected in arg {arg:?} (found {pattern:?})"
                )));
            }
        }
        Ok(())
    }

    fn validate_http(&self) -> Result<(), McpError> {
        if !(self.http.url.starts_with("http://") || self.http.url.starts_with("https://")) {
            return Err(McpError::Config(format!(
                "http transport requires a url starting with http:// or https://, got {:?}",
                self.http.url
            )));
        }
        Ok(())
    }
}

fn contains_path_traversal(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

fn find_dangerous_arg_char(arg: &str) -> Option<&'static str> {
    DANGEROUS_ARG_CHARS.iter().find(|needle| arg.contains(*needle)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stdio_config(command: &str) -> ServerConfig {
        ServerConfig {
            id: "x".into(),
            name: String::new(),
            transport: TransportKind::Stdio,
            stdio: StdioTransportConfig { command: command.into(), ..Default::default() },
            http: HttpTransportConfig::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auto_start: false,
        }
    }

    #[test]
    fn rejects_empty_id() {
        let mut config = stdio_config("echo");
        config.id = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn rejects_path_traversal_in_command() {
        let config = stdio_config("../../../etc/passwd");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("path traversal"));
    }

    #[test]
    fn rejects_shell_metacharacters_in_args() {
        let mut config = stdio_config("echo");
        config.stdio.args = vec!["$(whoami)".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shell metacharacters"));
    }

    #[test]
    fn accepts_clean_stdio_config() {
        let mut config = stdio_config("echo");
        config.stdio.args = vec!["hello".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_http_url() {
        let config = ServerConfig {
            id: "x".into(),
            name: String::new(),
            transport: TransportKind::Http,
            stdio: StdioTransportConfig::default(),
            http: HttpTransportConfig { url: "ftp://example.com".into(), headers: HashMap::new() },
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auto_start: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_https_url() {
        let config = ServerConfig {
            id: "x".into(),
            name: String::new(),
            transport: TransportKind::Http,
            stdio: StdioTransportConfig::default(),
            http: HttpTransportConfig {
                url: "https://example.com/mcp".into(),
                headers: HashMap::new(),
            },
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auto_start: false,
        };
        assert!(config.validate().is_ok());
    }
}
