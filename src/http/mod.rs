//! REST surface (spec §6): seven JSON/SSE endpoints over one `Agent`.
//!
//! ```text
//! POST /api/v1/threads
//! GET  /api/v1/threads/:id
//! POST /api/v1/runs            (async — returns immediately, status "queued")
//! POST /api/v1/runs/wait       (sync — blocks until completed/failed)
//! POST /api/v1/runs/stream     (SSE)
//! GET  /api/v1/runs/:id
//! POST /api/v1/runs/:id/cancel
//! GET  /api/v1/health
//! ```

pub mod sse;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::agent::Agent;
use crate::error::RuntimeError;
use crate::model::{CreateRunInput, Run, Thread, ThreadSummary};

pub fn build_router(agent: Arc<Agent>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/threads", post(create_thread))
        .route("/api/v1/threads/:id", get(get_thread))
        .route("/api/v1/runs", post(async_run))
        .route("/api/v1/runs/wait", post(sync_run))
        .route("/api/v1/runs/stream", post(sse::stream_run))
        .route("/api/v1/runs/:id", get(get_run))
        .route("/api/v1/runs/:id/cancel", post(cancel_run))
        .layer(TraceLayer::new_for_http())
        .with_state(agent)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn create_thread(
    State(agent): State<Arc<Agent>>,
) -> Result<Json<ThreadSummary>, RuntimeError> {
    Ok(Json(agent.create_thread().await?))
}

async fn get_thread(
    State(agent): State<Arc<Agent>>,
    Path(id): Path<String>,
) -> Result<Json<Thread>, RuntimeError> {
    Ok(Json(agent.get_thread(&id).await?))
}

async fn sync_run(
    State(agent): State<Arc<Agent>>,
    Json(input): Json<CreateRunInput>,
) -> Result<Json<Run>, RuntimeError> {
    Ok(Json(agent.sync_run(input).await?))
}

async fn async_run(
    State(agent): State<Arc<Agent>>,
    Json(input): Json<CreateRunInput>,
) -> Result<Json<Run>, RuntimeError> {
    Ok(Json(agent.async_run(input).await?))
}

async fn get_run(
    State(agent): State<Arc<Agent>>,
    Path(id): Path<String>,
) -> Result<Json<Run>, RuntimeError> {
    Ok(Json(agent.get_run(&id).await?))
}

async fn cancel_run(
    State(agent): State<Arc<Agent>>,
    Path(id): Path<String>,
) -> Result<Json<Run>, RuntimeError> {
    Ok(Json(agent.cancel_run(&id).await?))
}
