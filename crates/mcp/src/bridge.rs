//! Adapts every MCP tool (plus a synthesized set of resource/prompt
//! meta-tools) into host-callable [`BridgedTool`]s with deterministic,
//! collision-free names.

use std::collections::HashSet;
use std::sync::Arc;

use mcp_types::{ContentItem, McpError, ToolCallResult};
use serde_json::{json, Value};

use crate::manager::Manager;
use crate::sanitize::safe_name;

/// A single host-callable tool backed by one MCP server operation.
#[derive(Clone)]
pub struct BridgedTool {
    pub name: String,
    pub description: String,
    pub schema: Value,
    server_id: String,
    kind: ToolKind,
    manager: Manager,
}

#[derive(Clone)]
enum ToolKind {
    Call { tool_name: String },
    ResourcesList,
    ResourceRead,
    PromptsList,
    PromptGet,
}

/// Result of executing a bridged tool: text the host agent can feed straight
/// into a transcript, plus the MCP-reported error flag.
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub content: String,
    pub is_error: bool,
}

impl BridgedTool {
    pub async fn execute(&self, params: Value) -> Result<ExecuteResult, McpError> {
        let arguments = if params.is_null() { json!({}) } else { params };

        let raw = match &self.kind {
            ToolKind::Call { tool_name } => {
                self.manager.call_tool(&self.server_id, tool_name, arguments).await?
            }
            ToolKind::ResourcesList => {
                let resources = self.manager.all_resources().await;
                let relevant: Vec<_> =
                    resources.into_iter().filter(|(id, _)| id == &self.server_id).map(|(_, r)| r).collect();
                let content = serde_json::to_string(&relevant)?;
                return Ok(ExecuteResult { content, is_error: false });
            }
            ToolKind::ResourceRead => {
                let uri = arguments
                    .get("uri")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| McpError::Config("resource_read requires a \"uri\" argument".into()))?;
                self.manager.read_resource(&self.server_id, uri).await?
            }
            ToolKind::PromptsList => {
                let prompts = self.manager.all_prompts().await;
                let relevant: Vec<_> =
                    prompts.into_iter().filter(|(id, _)| id == &self.server_id).map(|(_, p)| p).collect();
                let content = serde_json::to_string(&relevant)?;
                return Ok(ExecuteResult { content, is_error: false });
            }
            ToolKind::PromptGet => {
                let name = arguments
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| McpError::Config("prompt_get requires a \"name\" argument".into()))?;
                let prompt_args = arguments.get("arguments").cloned().unwrap_or(json!({}));
                self.manager.get_prompt(&self.server_id, name, prompt_args).await?
            }
        };

        Ok(format_tool_call_result(raw))
    }
}

/// Joins text content with `\n` when every item is plain text; otherwise
/// falls back to the full JSON representation of the result.
pub fn format_tool_call_result(raw: Value) -> ExecuteResult {
    match serde_json::from_value::<ToolCallResult>(raw.clone()) {
        Ok(result) => {
            let all_text = result.content.iter().all(|c| matches!(c, ContentItem::Text { .. }));
            let joined = result
                .content
                .iter()
                .filter_map(|c| match c {
                    ContentItem::Text { text } if !text.is_empty() => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            if all_text && !joined.is_empty() {
                ExecuteResult { content: joined, is_error: result.is_error }
            } else {
                ExecuteResult { content: raw.to_string(), is_error: result.is_error }
            }
        }
        Err(_) => ExecuteResult { content: raw.to_string(), is_error: false },
    }
}

/// Builds the full set of bridged tools across every server currently known
/// to `manager`: one per MCP tool, plus four resource/prompt meta-tools per
/// server. Server IDs and tool names are enumerated in sorted order so the
/// same fleet configuration always yields the same set of safe names.
pub struct Bridge;

impl Bridge {
    pub async fn build(manager: &Manager) -> Vec<BridgedTool> {
        let mut used = HashSet::new();
        let mut out = Vec::new();

        let mut server_ids = manager.server_ids().await;
        server_ids.sort();

        for server_id in server_ids {
            let Some(client) = manager.client(&server_id).await else { continue };

            let mut tools = client.tools().await;
            tools.sort_by(|a, b| a.name.cmp(&b.name));

            for tool in tools {
                let name = safe_name(&server_id, &tool.name, &mut used);
                let description = match &tool.description {
                    Some(desc) if !desc.is_empty() => format!("MCP {server_id}.{}: {desc}", tool.name),
                    _ => format!("MCP {server_id}.{}", tool.name),
                };
                let schema = if tool.input_schema.is_null() { json!({ "type": "object" }) } else { tool.input_schema };
                out.push(BridgedTool {
                    name,
                    description,
                    schema,
                    server_id: server_id.clone(),
                    kind: ToolKind::Call { tool_name: tool.name },
                    manager: manager.clone(),
                });
            }

            out.push(meta_tool(
                &server_id,
                "resources_list",
                "List resources exposed by this MCP server",
                json!({ "type": "object" }),
                ToolKind::ResourcesList,
                manager,
                &mut used,
            ));
            out.push(meta_tool(
                &server_id,
                "resource_read",
                "Read a resource by URI from this MCP server",
                json!({ "type": "object", "properties": { "uri": { "type": "string" } }, "required": ["uri"] }),
                ToolKind::ResourceRead,
                manager,
                &mut used,
            ));
            out.push(meta_tool(
                &server_id,
                "prompts_list",
                "List prompts exposed by this MCP server",
                json!({ "type": "object" }),
                ToolKind::PromptsList,
                manager,
                &mut used,
            ));
            out.push(meta_tool(
                &server_id,
                "prompt_get",
                "Render a prompt by name from this MCP server",
                json!({
                    "type": "object",
                    "properties": { "name": { "type": "string" }, "arguments": { "type": "object" } },
                    "required": ["name"]
                }),
                ToolKind::PromptGet,
                manager,
                &mut used,
            ));
        }

        out
    }
}

fn meta_tool(
    server_id: &str,
    tool_name: &str,
    description: &str,
    schema: Value,
    kind: ToolKind,
    manager: &Manager,
    used: &mut HashSet<String>,
) -> BridgedTool {
    let name = safe_name(server_id, tool_name, used);
    BridgedTool {
        name,
        description: format!("MCP {server_id}.{tool_name}: {description}"),
        schema,
        server_id: server_id.to_string(),
        kind,
        manager: manager.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_bridge_execute_text() {
        let raw = json!({ "content": [{ "type": "text", "text": "ok" }], "isError": false });
        let result = format_tool_call_result(raw);
        assert_eq!(result.content, "ok");
        assert!(!result.is_error);
    }

    #[test]
    fn mixed_content_falls_back_to_json() {
        let raw = json!({
            "content": [
                { "type": "text", "text": "partial" },
                { "type": "resource", "resource": { "uri": "file:///x" } }
            ],
            "isError": false
        });
        let result = format_tool_call_result(raw.clone());
        assert_eq!(result.content, raw.to_string());
    }

    #[test]
    fn empty_text_items_are_skipped_when_joining() {
        let raw = json!({
            "content": [
                { "type": "text", "text": "" },
                { "type": "text", "text": "second" }
            ],
            "isError": false
        });
        let result = format_tool_call_result(raw);
        assert_eq!(result.content, "second");
    }

    #[test]
    fn all_empty_text_items_fall_back_to_json() {
        let raw = json!({
            "content": [{ "type": "text", "text": "" }],
            "isError": false
        });
        let result = format_tool_call_result(raw.clone());
        assert_eq!(result.content, raw.to_string());
    }

    #[test]
    fn error_flag_propagates() {
        let raw = json!({ "content": [{ "type": "text", "text": "boom" }], "isError": true });
        let result = format_tool_call_result(raw);
        assert!(result.is_error);
    }

    #[test]
    fn unparseable_result_falls_back_to_raw_json_without_erroring() {
        let raw = json!({ "unexpected": "shape" });
        let result = format_tool_call_result(raw.clone());
        assert_eq!(result.content, raw.to_string());
        assert!(!result.is_error);
    }
}
