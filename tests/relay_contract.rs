mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use futures::StreamExt;
use mlopt_agent::agent::{Agent, AgentEvent, AgentResult, AgentRuntime, AgentSettings, AgentStream};
use mlopt_agent::chat::AgentClient;
use mlopt_agent::error::AgentError;
use mlopt_agent::llm::{CompletionResponse, MockLlmClient, StopReason, ToolCall, Usage};
use mlopt_agent::mcp::{SessionSettings, build_connectors, parse_registry};
use mlopt_agent::server::{self, AppContext, RelayEvent, router};
use mlopt_agent::tools::McpToolRouter;
use serde_json::json;
use tower::ServiceExt;

use common::spawn_fake_mcp;

/// Replays a fixed script of events for every prompt
struct Scripted {
    script: Vec<Result<AgentEvent, String>>,
}

impl AgentRuntime for Scripted {
    fn stream_async(&self, _prompt: String) -> AgentStream {
        let items: Vec<_> = self
            .script
            .iter()
            .cloned()
            .map(|item| item.map_err(AgentError::Server))
            .collect();
        futures::stream::iter(items).boxed()
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

async fn post_prompt(runtime: impl AgentRuntime + 'static, prompt: &str) -> (StatusCode, Vec<RelayEvent>) {
    let ctx = Arc::new(AppContext::new(Arc::new(runtime), vec![]));
    let request = Request::post("/prompt")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "prompt": prompt }).to_string()))
        .unwrap();

    let response = router(ctx).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();

    let frames = body
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            let data = frame.strip_prefix("data: ").expect("frame starts with data:");
            serde_json::from_str(data).unwrap()
        })
        .collect();
    (status, frames)
}

#[tokio::test]
async fn test_k_text_events_then_done() {
    let script = (0..4).map(|i| Ok(AgentEvent::TextDelta(format!("t{}", i)))).collect();
    let (status, frames) = post_prompt(Scripted { script }, "Hi").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(frames.len(), 5);
    for (i, frame) in frames[..4].iter().enumerate() {
        assert_eq!(
            *frame,
            RelayEvent::Text {
                content: format!("t{}", i)
            }
        );
    }
    assert_eq!(frames[4], RelayEvent::Done);
}

#[tokio::test]
async fn test_failure_before_any_event_is_single_error() {
    let script = vec![Err("model unavailable".to_string())];
    let (status, frames) = post_prompt(Scripted { script }, "Hi").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        frames,
        vec![RelayEvent::Error {
            content: "Server error: model unavailable".to_string()
        }]
    );
}

#[tokio::test]
async fn test_mixed_events_keep_order() {
    let script = vec![
        Ok(AgentEvent::TurnStart { turn: 1 }),
        Ok(AgentEvent::TextDelta("Checking".to_string())),
        Ok(AgentEvent::ToolUse {
            current_tool_use: json!({"toolUseId": "t1", "name": "query_prometheus", "input": ""}),
        }),
        Ok(AgentEvent::MessageStop {
            stop_reason: StopReason::ToolUse,
        }),
        Ok(AgentEvent::Result(AgentResult {
            message: "GPU is idle".to_string(),
            ..Default::default()
        })),
    ];
    let (_, frames) = post_prompt(Scripted { script }, "Hi").await;

    let kinds: Vec<&str> = frames
        .iter()
        .map(|frame| match frame {
            RelayEvent::Text { .. } => "text",
            RelayEvent::Tool { .. } => "tool",
            RelayEvent::Result { .. } => "result",
            RelayEvent::Done => "done",
            RelayEvent::Error { .. } => "error",
        })
        .collect();
    assert_eq!(kinds, vec!["text", "tool", "result", "done"]);
}

#[tokio::test]
async fn test_error_after_partial_output() {
    let script = vec![
        Ok(AgentEvent::TextDelta("partial".to_string())),
        Err("tool server went away".to_string()),
    ];
    let (_, frames) = post_prompt(Scripted { script }, "Hi").await;

    assert_eq!(frames.len(), 2);
    assert!(matches!(frames[0], RelayEvent::Text { .. }));
    assert!(matches!(frames[1], RelayEvent::Error { .. }));
}

#[tokio::test]
async fn test_health_lists_servers_in_registry_order() {
    let registry = parse_registry(Some("prometheus=http://a/sse,kubernetes=http://b/sse,opencost=http://c/sse"));
    let ctx = Arc::new(AppContext::new(
        Arc::new(Scripted { script: vec![] }),
        registry.names(),
    ));

    let response = router(ctx)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(
        json,
        json!({"status": "healthy", "model": "scripted", "mcp_servers": ["prometheus", "kubernetes", "opencost"]})
    );
}

#[tokio::test]
async fn test_agent_with_mcp_tools_over_http() {
    let (endpoint, fake) = spawn_fake_mcp().await;
    let registry = parse_registry(Some(&format!("prometheus={}", endpoint)));
    let settings = SessionSettings {
        connect_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
    };
    let tools = Arc::new(McpToolRouter::new(build_connectors(&registry, settings)));

    let llm = Arc::new(
        MockLlmClient::new()
            .with_response(CompletionResponse {
                tool_calls: vec![ToolCall::new(
                    "tu_1",
                    "query_prometheus",
                    json!({"query": "DCGM_FI_DEV_GPU_UTIL"}),
                )],
                stop_reason: StopReason::ToolUse,
                usage: Usage::new(100, 20),
                ..Default::default()
            })
            .with_response(CompletionResponse {
                content: "GPU utilization is 12% ".to_string(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::new(150, 30),
                ..Default::default()
            }),
    );
    let agent = Agent::new(llm.clone(), tools, AgentSettings::new("mock-model", "sys"));
    let ctx = Arc::new(AppContext::new(Arc::new(agent), registry.names()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, ctx, async move {
        let _ = stop_rx.await;
    }));

    let client = AgentClient::new(&format!("http://{}", addr)).unwrap();
    let health = client.health().await.unwrap();
    assert_eq!(health.mcp_servers, vec!["prometheus"]);

    let mut frames = Vec::new();
    let outcome = client
        .send_prompt("Is my trainer wasting GPU?", |frame| frames.push(frame.clone()))
        .await
        .unwrap();

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.text, "GPU utilization is 12% ");
    assert!(frames.iter().any(|f| matches!(f, RelayEvent::Tool { name, .. } if name == "query_prometheus")));
    assert!(matches!(frames.last(), Some(RelayEvent::Done)));

    // the tool result went back to the model
    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].messages[2].is_tool_result());
    assert!(fake.methods().contains(&"tools/call".to_string()));

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_agent_answers_with_one_dead_mcp_server() {
    let (endpoint, _fake) = spawn_fake_mcp().await;
    let registry = parse_registry(Some(&format!("prometheus={},dead=http://127.0.0.1:9/sse", endpoint)));
    let settings = SessionSettings {
        connect_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
    };
    let tools = Arc::new(McpToolRouter::new(build_connectors(&registry, settings)));
    let llm = Arc::new(MockLlmClient::new().with_response(CompletionResponse {
        content: "Prometheus is reachable".to_string(),
        stop_reason: StopReason::EndTurn,
        usage: Usage::new(10, 5),
        ..Default::default()
    }));
    let agent = Agent::new(llm.clone(), tools, AgentSettings::new("mock-model", "sys"));

    let (status, frames) = post_prompt(agent, "check the cluster").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!frames.iter().any(|f| matches!(f, RelayEvent::Error { .. })));
    assert_eq!(frames.last(), Some(&RelayEvent::Done));

    let requests = llm.requests();
    let advertised: Vec<_> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(advertised, vec!["query_prometheus"]);
}
