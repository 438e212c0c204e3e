//! MCP client layer - server registry, SSE sessions and connectors
//!
//! This module provides:
//! - Parsing of the `MCP_SERVERS` registry string
//! - JSON-RPC / MCP message types
//! - The HTTP+SSE session transport
//! - Lazily connected connectors and the factory that builds them

pub mod connector;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use connector::{McpConnector, SessionFactory, build_connectors, sse_session_factory};
pub use protocol::{CallToolResult, McpTool, ToolContent};
pub use registry::{ConnectorRegistry, ConnectorSpec, MCP_SERVERS_ENV, parse_registry};
pub use transport::{SessionSettings, SseSession};
