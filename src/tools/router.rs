//! Tool routing and execution
//!
//! Defines the ToolRouter trait for executing tool calls and McpToolRouter,
//! which exposes every tool of every configured MCP connector.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::llm::{ToolCall, ToolDefinition, ToolResult};
use crate::mcp::McpConnector;

/// Trait for routing and executing tool calls
#[async_trait]
pub trait ToolRouter: Send + Sync {
    /// Tool definitions to advertise to the model
    async fn definitions(&self) -> Result<Vec<ToolDefinition>>;

    /// Execute a tool call; failures of the tool itself come back as error results
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Release any held resources
    async fn shutdown(&self) {}
}

#[derive(Debug, Default)]
struct ToolIndex {
    definitions: Vec<ToolDefinition>,
    owners: HashMap<String, usize>,
    /// Connectors whose tools are already in the index
    listed: HashSet<usize>,
}

/// Routes tool calls to the MCP connector that advertised the tool
///
/// A connector's listing is kept once it succeeds. Connectors that fail to
/// list are skipped with a warning and asked again on the next invocation.
pub struct McpToolRouter {
    connectors: Vec<McpConnector>,
    index: Mutex<ToolIndex>,
}

impl McpToolRouter {
    pub fn new(connectors: Vec<McpConnector>) -> Self {
        Self {
            connectors,
            index: Mutex::new(ToolIndex::default()),
        }
    }

    /// List tools from every connector not yet indexed
    async fn refresh(&self, index: &mut ToolIndex) {
        let mut added = 0;
        for (position, connector) in self.connectors.iter().enumerate() {
            if index.listed.contains(&position) {
                continue;
            }
            let tools = match connector.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    log::warn!("Skipping tools from MCP server {}: {}", connector.name(), e);
                    continue;
                }
            };
            index.listed.insert(position);

            for tool in tools {
                if let Some(&first) = index.owners.get(&tool.name) {
                    log::warn!(
                        "Tool {} from {} shadowed by {}",
                        tool.name,
                        connector.name(),
                        self.connectors[first].name()
                    );
                    continue;
                }
                index.owners.insert(tool.name.clone(), position);
                index.definitions.push(ToolDefinition::new(
                    tool.name,
                    tool.description.unwrap_or_default(),
                    tool.input_schema,
                ));
                added += 1;
            }
        }

        if added > 0 {
            log::info!(
                "Loaded {} tool(s), {} of {} MCP server(s) answering",
                index.definitions.len(),
                index.listed.len(),
                self.connectors.len()
            );
        }
    }
}

#[async_trait]
impl ToolRouter for McpToolRouter {
    async fn definitions(&self) -> Result<Vec<ToolDefinition>> {
        let mut index = self.index.lock().await;
        if index.listed.len() < self.connectors.len() {
            self.refresh(&mut index).await;
        }
        Ok(index.definitions.clone())
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let owner = self.index.lock().await.owners.get(&call.name).copied();
        let Some(position) = owner else {
            return Ok(ToolResult::error(&call.id, format!("Unknown tool: {}", call.name)));
        };
        let connector = &self.connectors[position];

        log::debug!("Calling {} on MCP server {}", call.name, connector.name());
        match connector.call_tool(&call.name, call.input.clone()).await {
            Ok(result) if result.is_error => Ok(ToolResult::error(&call.id, result.text())),
            Ok(result) => Ok(ToolResult::success(&call.id, result.text())),
            Err(e) => {
                log::warn!("Tool {} failed: {}", call.name, e);
                Ok(ToolResult::error(&call.id, e.to_string()))
            }
        }
    }

    async fn shutdown(&self) {
        for connector in &self.connectors {
            connector.close().await;
        }
    }
}
