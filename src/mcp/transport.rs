//! MCP client session over the HTTP+SSE transport
//!
//! The client opens a long-lived `GET` event stream. The server's first
//! `endpoint` event names the URL that JSON-RPC messages are POSTed to;
//! responses come back as `message` events on the stream and are matched to
//! callers by request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{AgentError, Result};
use crate::mcp::protocol::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, initialize_params};

/// Timeouts for MCP sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long to wait for the `endpoint` event after connecting
    pub connect_timeout: Duration,
    /// How long to wait for each JSON-RPC response
    pub request_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcMessage>>>>;

/// An initialized MCP session bound to one server
pub struct SseSession {
    server: String,
    http: Client,
    message_url: Url,
    next_id: AtomicU64,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    request_timeout: Duration,
}

impl SseSession {
    /// Connect, discover the message endpoint and run the `initialize` handshake
    pub async fn open(server: &str, endpoint: &str, settings: SessionSettings) -> Result<Self> {
        let sse_url = Url::parse(endpoint).map_err(|e| AgentError::mcp(server, format!("invalid endpoint {}: {}", endpoint, e)))?;
        let http = Client::new();

        let mut source = EventSource::new(http.get(sse_url.clone()).header(ACCEPT, "text/event-stream"))
            .map_err(|e| AgentError::mcp(server, format!("cannot build SSE request: {}", e)))?;

        let message_url = match tokio::time::timeout(settings.connect_timeout, wait_for_endpoint(&mut source, &sse_url)).await {
            Ok(Ok(url)) => url,
            Ok(Err(message)) => {
                source.close();
                return Err(AgentError::mcp(server, message));
            }
            Err(_) => {
                source.close();
                return Err(AgentError::mcp(
                    server,
                    format!("no endpoint event within {:?}", settings.connect_timeout),
                ));
            }
        };
        log::debug!("MCP server {} accepts messages at {}", server, message_url);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_messages(server.to_string(), source, pending.clone(), closed.clone()));

        let session = Self {
            server: server.to_string(),
            http,
            message_url,
            next_id: AtomicU64::new(1),
            pending,
            closed,
            reader,
            request_timeout: settings.request_timeout,
        };

        let info = session.request("initialize", Some(initialize_params())).await?;
        log::debug!(
            "MCP server {} initialized: {}",
            server,
            info.get("serverInfo").cloned().unwrap_or(Value::Null)
        );
        session.notify("notifications/initialized").await?;

        Ok(session)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for its response payload
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.is_closed() {
            return Err(AgentError::mcp(&self.server, "session closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id, tx);

        if let Err(e) = self.post(&JsonRpcRequest::new(id, method, params)).await {
            self.lock_pending().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(message)) => message
                .into_result()
                .map_err(|e| AgentError::mcp(&self.server, format!("{} failed: {}", method, e))),
            Ok(Err(_)) => Err(AgentError::mcp(&self.server, format!("session closed while waiting for {}", method))),
            Err(_) => {
                self.lock_pending().remove(&id);
                Err(AgentError::mcp(
                    &self.server,
                    format!("{} timed out after {:?}", method, self.request_timeout),
                ))
            }
        }
    }

    /// Send a notification; no response is expected
    pub async fn notify(&self, method: &str) -> Result<()> {
        self.post(&JsonRpcNotification::new(method)).await
    }

    /// Stop reading the event stream and fail any waiting requests
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.reader.abort();
        self.lock_pending().clear();
    }

    async fn post<T: serde::Serialize>(&self, body: &T) -> Result<()> {
        let response = self
            .http
            .post(self.message_url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::mcp(&self.server, format!("POST failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::mcp(&self.server, format!("POST returned {}: {}", status, text)));
        }
        Ok(())
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcMessage>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SseSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for SseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseSession")
            .field("server", &self.server)
            .field("message_url", &self.message_url.as_str())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Resolve the `endpoint` event payload against the SSE URL
///
/// Servers usually send a path such as `/messages/?session_id=abc`, but an
/// absolute URL is accepted as well.
pub fn resolve_message_url(sse_url: &Url, data: &str) -> std::result::Result<Url, url::ParseError> {
    sse_url.join(data.trim())
}

async fn wait_for_endpoint(source: &mut EventSource, sse_url: &Url) -> std::result::Result<Url, String> {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "endpoint" => {
                return resolve_message_url(sse_url, &message.data)
                    .map_err(|e| format!("bad endpoint event {:?}: {}", message.data, e));
            }
            Ok(Event::Message(message)) => {
                log::debug!("Ignoring {} event before endpoint", message.event);
            }
            Err(e) => return Err(format!("cannot connect: {}", e)),
        }
    }
    Err("event stream closed before endpoint event".to_string())
}

async fn read_messages(server: String, mut source: EventSource, pending: PendingMap, closed: Arc<AtomicBool>) {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "message" => {
                let parsed: JsonRpcMessage = match serde_json::from_str(&message.data) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        log::warn!("MCP server {} sent undecodable message: {}", server, e);
                        continue;
                    }
                };
                let Some(id) = parsed.response_id() else {
                    log::debug!("MCP server {} sent {:?}, ignoring", server, parsed.method);
                    continue;
                };
                let waiter = pending
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(parsed);
                    }
                    None => log::debug!("MCP server {} answered unknown request {}", server, id),
                }
            }
            Ok(Event::Message(_)) => {}
            Err(e) => {
                log::warn!("MCP server {} event stream ended: {}", server, e);
                break;
            }
        }
    }

    source.close();
    closed.store(true, Ordering::SeqCst);
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clear();
}
