//! HTTP routes: `POST /prompt` and `GET /health`

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION};
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::server::context::{AppContext, HealthStatus};
use crate::server::relay::relay;

/// Body of `POST /prompt`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/prompt", post(prompt))
        .route("/health", get(health))
        .with_state(ctx)
}

async fn prompt(State(ctx): State<Arc<AppContext>>, Json(request): Json<PromptRequest>) -> impl IntoResponse {
    log::info!("Prompt received ({} chars)", request.prompt.len());

    let frames = relay(ctx.agent.stream_async(request.prompt)).map(|frame| Ok::<_, Infallible>(frame.to_sse()));

    (
        [(CACHE_CONTROL, "no-cache"), (CONNECTION, "keep-alive")],
        Sse::new(frames),
    )
}

async fn health(State(ctx): State<Arc<AppContext>>) -> Json<HealthStatus> {
    Json(ctx.health())
}
