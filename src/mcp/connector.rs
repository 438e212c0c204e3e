//! MCP connectors built from the server registry
//!
//! A connector is cheap to build: no network traffic happens until the first
//! tool listing or tool call, so an unreachable server only fails the request
//! that tries to use it.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::error::{AgentError, Result};
use crate::mcp::protocol::{CallToolResult, ListToolsResult, McpTool};
use crate::mcp::registry::ConnectorRegistry;
use crate::mcp::transport::{SessionSettings, SseSession};

/// Opens a fresh session each time it is called
pub type SessionFactory = Box<dyn Fn() -> BoxFuture<'static, Result<SseSession>> + Send + Sync>;

/// Session factory for the HTTP+SSE transport
///
/// `name` and `endpoint` are moved into the closure, so every factory keeps
/// the values it was built with.
pub fn sse_session_factory(name: String, endpoint: String, settings: SessionSettings) -> SessionFactory {
    Box::new(move || {
        let name = name.clone();
        let endpoint = endpoint.clone();
        Box::pin(async move { SseSession::open(&name, &endpoint, settings).await })
    })
}

/// A lazily connected MCP client
pub struct McpConnector {
    name: String,
    endpoint: String,
    factory: SessionFactory,
    session: Mutex<Option<Arc<SseSession>>>,
}

impl McpConnector {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, factory: SessionFactory) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            factory,
            session: Mutex::new(None),
        }
    }

    /// Connector that talks MCP over SSE to `endpoint`
    pub fn sse(name: impl Into<String>, endpoint: impl Into<String>, settings: SessionSettings) -> Self {
        let name = name.into();
        let endpoint = endpoint.into();
        let factory = sse_session_factory(name.clone(), endpoint.clone(), settings);
        Self::new(name, endpoint, factory)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a live session is currently held
    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.is_closed())
    }

    /// Current session, opening one if none is live
    ///
    /// A failed connect is not remembered; the next call tries again.
    pub async fn session(&self) -> Result<Arc<SseSession>> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref()
            && !session.is_closed()
        {
            return Ok(session.clone());
        }

        log::info!("Connecting to MCP server {} at {}", self.name, self.endpoint);
        let session = Arc::new((self.factory)().await?);
        *guard = Some(session.clone());
        Ok(session)
    }

    /// All tools the server advertises, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let session = self.session().await?;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let value = session.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(value)
                .map_err(|e| AgentError::mcp(&self.name, format!("bad tools/list result: {}", e)))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        log::debug!("MCP server {} offers {} tool(s)", self.name, tools.len());
        Ok(tools)
    }

    /// Invoke one tool
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<CallToolResult> {
        let session = self.session().await?;
        let value = session
            .request("tools/call", Some(json!({ "name": tool, "arguments": arguments })))
            .await?;
        serde_json::from_value(value).map_err(|e| AgentError::mcp(&self.name, format!("bad tools/call result: {}", e)))
    }

    /// Drop the live session, if any
    pub async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.close();
            log::info!("Closed MCP session {}", self.name);
        }
    }
}

impl std::fmt::Debug for McpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnector")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// One connector per registry entry, in registry order
///
/// Never fails and never touches the network.
pub fn build_connectors(registry: &ConnectorRegistry, settings: SessionSettings) -> Vec<McpConnector> {
    registry
        .iter()
        .map(|spec| {
            let connector = McpConnector::sse(spec.name.clone(), spec.endpoint.clone(), settings);
            log::info!("Created MCP client: {} -> {}", spec.name, spec.endpoint);
            connector
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::parse_registry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_build_connectors_empty_registry() {
        let connectors = build_connectors(&parse_registry(None), SessionSettings::default());
        assert!(connectors.is_empty());
    }

    #[test]
    fn test_build_connectors_keeps_each_endpoint() {
        let registry = parse_registry(Some("a=http://a:1/sse,b=http://b:2/sse,c=http://c:3/sse"));
        let connectors = build_connectors(&registry, SessionSettings::default());

        assert_eq!(connectors.len(), 3);
        let bound: Vec<(&str, &str)> = connectors.iter().map(|c| (c.name(), c.endpoint())).collect();
        assert_eq!(
            bound,
            vec![("a", "http://a:1/sse"), ("b", "http://b:2/sse"), ("c", "http://c:3/sse")]
        );
    }

    #[tokio::test]
    async fn test_connector_starts_disconnected() {
        let connector = McpConnector::sse("prom", "http://127.0.0.1:9/sse", SessionSettings::default());
        assert!(!connector.is_connected().await);
        connector.close().await;
        assert!(!connector.is_connected().await);
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let factory: SessionFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(AgentError::mcp("flaky", "connection refused")) })
        });
        let connector = McpConnector::new("flaky", "http://flaky/sse", factory);

        assert!(connector.list_tools().await.is_err());
        assert!(connector.call_tool("x", json!({})).await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_error_names_connector() {
        let settings = SessionSettings {
            connect_timeout: std::time::Duration::from_secs(5),
            request_timeout: std::time::Duration::from_secs(5),
        };
        let connector = McpConnector::sse("kubernetes", "http://127.0.0.1:9/sse", settings);
        let err = connector.list_tools().await.unwrap_err();
        assert!(err.to_string().contains("kubernetes"));
    }
}
