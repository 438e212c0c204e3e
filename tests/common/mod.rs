//! Fake MCP server speaking the HTTP+SSE transport

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Clone, Default)]
pub struct FakeMcp {
    outbox: Arc<Mutex<Option<mpsc::UnboundedSender<Value>>>>,
    methods: Arc<Mutex<Vec<String>>>,
    sessions: Arc<Mutex<usize>>,
}

impl FakeMcp {
    /// JSON-RPC methods received, in order
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    /// Number of SSE connections opened
    pub fn sessions(&self) -> usize {
        *self.sessions.lock().unwrap()
    }
}

/// Start a fake server on an ephemeral port; returns its SSE endpoint
pub async fn spawn_fake_mcp() -> (String, FakeMcp) {
    let state = FakeMcp::default();
    let app = Router::new()
        .route("/sse", get(sse))
        .route("/messages", post(messages))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/sse", addr), state)
}

async fn sse(State(state): State<FakeMcp>) -> impl IntoResponse {
    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    *state.outbox.lock().unwrap() = Some(tx);
    *state.sessions.lock().unwrap() += 1;

    let endpoint = futures::stream::once(async {
        Ok::<_, Infallible>(Event::default().event("endpoint").data("/messages?session_id=fake"))
    });
    let replies = UnboundedReceiverStream::new(rx)
        .map(|message| Ok::<_, Infallible>(Event::default().event("message").data(message.to_string())));

    Sse::new(endpoint.chain(replies))
}

async fn messages(State(state): State<FakeMcp>, Json(body): Json<Value>) -> StatusCode {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    state.methods.lock().unwrap().push(method.clone());

    let Some(id) = body.get("id").cloned() else {
        return StatusCode::ACCEPTED;
    };

    let reply = match method.as_str() {
        "initialize" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake-prometheus", "version": "0.0.1"}
            }
        }),
        "tools/list" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "tools": [{
                    "name": "query_prometheus",
                    "description": "Run a PromQL query",
                    "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
                }]
            }
        }),
        "tools/call" => {
            let query = body["params"]["arguments"]["query"].as_str().unwrap_or_default();
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [{"type": "text", "text": format!("{} => 0.12", query)}],
                    "isError": false
                }
            })
        }
        _ => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": "Method not found"}
        }),
    };

    if let Some(outbox) = state.outbox.lock().unwrap().as_ref() {
        let _ = outbox.send(reply);
    }
    StatusCode::ACCEPTED
}
