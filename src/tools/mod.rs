//! Tool System - routing model tool calls to MCP servers

mod router;

pub use router::{McpToolRouter, ToolRouter};
