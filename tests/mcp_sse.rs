mod common;

use std::time::Duration;

use mlopt_agent::llm::ToolCall;
use mlopt_agent::mcp::{ConnectorRegistry, SessionSettings, SseSession, build_connectors, parse_registry};
use mlopt_agent::tools::{McpToolRouter, ToolRouter};
use serde_json::json;

use common::spawn_fake_mcp;

fn fast_settings() -> SessionSettings {
    SessionSettings {
        connect_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_session_handshake() {
    let (endpoint, fake) = spawn_fake_mcp().await;

    let session = SseSession::open("prometheus", &endpoint, fast_settings()).await.unwrap();
    assert!(!session.is_closed());
    assert_eq!(fake.methods(), vec!["initialize", "notifications/initialized"]);

    session.close();
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_unknown_method_is_error() {
    let (endpoint, _fake) = spawn_fake_mcp().await;
    let session = SseSession::open("prometheus", &endpoint, fast_settings()).await.unwrap();

    let err = session.request("resources/list", None).await.unwrap_err();
    assert!(err.to_string().contains("Method not found"));
    assert!(err.to_string().contains("prometheus"));
}

#[tokio::test]
async fn test_connector_lists_and_calls_tools() {
    let (endpoint, fake) = spawn_fake_mcp().await;
    let registry = parse_registry(Some(&format!("prometheus={}", endpoint)));
    let connectors = build_connectors(&registry, fast_settings());
    assert_eq!(connectors.len(), 1);
    assert!(!connectors[0].is_connected().await);

    let tools = connectors[0].list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "query_prometheus");
    assert!(connectors[0].is_connected().await);

    let result = connectors[0]
        .call_tool("query_prometheus", json!({"query": "DCGM_FI_DEV_GPU_UTIL"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.text(), "DCGM_FI_DEV_GPU_UTIL => 0.12");

    // one lazily opened session serves every call
    assert_eq!(fake.sessions(), 1);

    connectors[0].close().await;
    assert!(!connectors[0].is_connected().await);
}

#[tokio::test]
async fn test_router_aggregates_and_routes() {
    let (live, _fake) = spawn_fake_mcp().await;
    let mut registry = ConnectorRegistry::default();
    registry.insert("prometheus", live);
    let router = McpToolRouter::new(build_connectors(&registry, fast_settings()));

    let definitions = router.definitions().await.unwrap();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].description, "Run a PromQL query");

    let call = ToolCall::new("tu_1", "query_prometheus", json!({"query": "up"}));
    let result = router.execute(&call).await.unwrap();
    assert!(!result.is_error);
    assert_eq!(result.tool_use_id, "tu_1");
    assert_eq!(result.content, "up => 0.12");

    let missing = router
        .execute(&ToolCall::new("tu_2", "delete_cluster", json!({})))
        .await
        .unwrap();
    assert!(missing.is_error);

    router.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_connector_fails_on_first_use() {
    let registry = parse_registry(Some("dead=http://127.0.0.1:9/sse"));
    let connectors = build_connectors(&registry, fast_settings());
    assert_eq!(connectors.len(), 1);

    let err = connectors[0].list_tools().await.unwrap_err();
    assert!(err.to_string().contains("dead"));
}

#[tokio::test]
async fn test_router_skips_dead_connector() {
    let (live, fake) = spawn_fake_mcp().await;
    let registry = parse_registry(Some(&format!("prometheus={},dead=http://127.0.0.1:9/sse", live)));
    let router = McpToolRouter::new(build_connectors(&registry, fast_settings()));

    let definitions = router.definitions().await.unwrap();
    let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["query_prometheus"]);

    let result = router
        .execute(&ToolCall::new("tu_1", "query_prometheus", json!({"query": "up"})))
        .await
        .unwrap();
    assert_eq!(result.content, "up => 0.12");

    // the live server is listed once even though the dead one is retried
    router.definitions().await.unwrap();
    let listings = fake.methods().iter().filter(|m| *m == "tools/list").count();
    assert_eq!(listings, 1);

    router.shutdown().await;
}

#[tokio::test]
async fn test_each_connector_reaches_its_own_server() {
    let (prometheus, prometheus_fake) = spawn_fake_mcp().await;
    let (kubernetes, kubernetes_fake) = spawn_fake_mcp().await;
    let registry = parse_registry(Some(&format!("prometheus={},kubernetes={}", prometheus, kubernetes)));
    let connectors = build_connectors(&registry, fast_settings());
    assert_eq!(connectors.len(), 2);

    for connector in &connectors {
        connector.list_tools().await.unwrap();
    }

    assert_eq!(prometheus_fake.sessions(), 1);
    assert_eq!(kubernetes_fake.sessions(), 1);
    assert!(prometheus_fake.methods().contains(&"tools/list".to_string()));
    assert!(kubernetes_fake.methods().contains(&"tools/list".to_string()));

    for connector in &connectors {
        connector.close().await;
    }
}
