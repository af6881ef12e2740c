//! Black-box HTTP surface tests, in the teacher's `tests/health.rs` style:
//! a throwaway agent built on a `TempDir`-backed store, driven through the
//! real Axum `Router` via `tower::ServiceExt::oneshot` rather than a bound
//! socket.

use std::sync::Arc;
use std::time::Duration;

use agent_runtime_core::agent::Agent;
use agent_runtime_core::demo_agent::EchoAgent;
use agent_runtime_core::exec::{CancelToken, ChunkStream, ExecRun};
use agent_runtime_core::http;
use agent_runtime_core::model::{InputMessage, RawContent};
use agent_runtime_core::store::file_store::FileStore;
use agent_runtime_core::stream_adapter::{Chunk, ChunkMessage, ChunkUsage};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_agent() -> (TempDir, Arc<Agent>) {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let agent = Agent::builder(EchoAgent)
        .with_store(store)
        .build()
        .await
        .unwrap();
    (dir, Arc::new(agent))
}

async fn send_json(
    router: axum::Router,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

// S1 — sync happy path.
#[tokio::test]
async fn sync_run_happy_path_creates_thread_and_completes() {
    let (_dir, agent) = test_agent().await;
    let router = http::build_router(agent);

    let payload = json!({
        "input": { "messages": [{ "role": "user", "content": "Hi" }] }
    });
    let (status, run) = send_json(router.clone(), "POST", "/api/v1/runs/wait", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "completed");
    assert!(run["id"].as_str().unwrap().starts_with("run_"));
    let thread_id = run["thread_id"].as_str().unwrap().to_string();
    assert!(thread_id.starts_with("thread_"));

    let output_text = run["output"][0]["content"][0]["text"]["value"]
        .as_str()
        .unwrap();
    assert_eq!(output_text, "Hi ");
    assert_eq!(run["usage"]["total_tokens"], 2);

    let (status, thread) = send_json(
        router,
        "GET",
        &format!("/api/v1/threads/{thread_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = thread["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

// S3 — async background completion.
#[tokio::test]
async fn async_run_completes_in_background() {
    let (_dir, agent) = test_agent().await;
    let router = http::build_router(agent);

    let payload = json!({
        "input": { "messages": [{ "role": "user", "content": "hello there" }] }
    });
    let (status, run) = send_json(router.clone(), "POST", "/api/v1/runs", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "queued");
    let run_id = run["id"].as_str().unwrap().to_string();

    let mut completed = None;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (_, fetched) = send_json(router.clone(), "GET", &format!("/api/v1/runs/{run_id}"), None).await;
        if fetched["status"] == "completed" {
            completed = Some(fetched);
            break;
        }
    }
    let run = completed.expect("run did not complete within the bounded wait");
    assert_eq!(run["status"], "completed");
    assert!(run["output"].as_array().unwrap().len() >= 1);
}

// S6 — not found.
#[tokio::test]
async fn unknown_ids_report_not_found() {
    let (_dir, agent) = test_agent().await;
    let router = http::build_router(agent);

    let (status, _) = send_json(router.clone(), "GET", "/api/v1/threads/thread_nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(router, "GET", "/api/v1/runs/run_nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// S7 — metadata passthrough.
#[tokio::test]
async fn metadata_round_trips_through_sync_run() {
    let (_dir, agent) = test_agent().await;
    let router = http::build_router(agent);

    let payload = json!({
        "input": { "messages": [{ "role": "user", "content": "hi" }] },
        "metadata": { "user_id": "u1" }
    });
    let (status, run) = send_json(router.clone(), "POST", "/api/v1/runs/wait", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["metadata"], json!({ "user_id": "u1" }));

    let run_id = run["id"].as_str().unwrap();
    let (_, fetched) = send_json(router, "GET", &format!("/api/v1/runs/{run_id}"), None).await;
    assert_eq!(fetched["metadata"], json!({ "user_id": "u1" }));
}

// S5 — cancelling a terminal run raises IllegalState.
#[tokio::test]
async fn cancel_on_completed_run_is_illegal_state() {
    let (_dir, agent) = test_agent().await;
    let router = http::build_router(agent);

    let payload = json!({
        "input": { "messages": [{ "role": "user", "content": "hi" }] }
    });
    let (_, run) = send_json(router.clone(), "POST", "/api/v1/runs/wait", Some(payload)).await;
    let run_id = run["id"].as_str().unwrap();

    let (status, _) = send_json(
        router,
        "POST",
        &format!("/api/v1/runs/{run_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

/// A slow `ExecRun` used only by `cancel_while_running_stops_before_final_chunk`:
/// yields one chunk, then sleeps 5s honoring cancellation, then yields a
/// final chunk that must never be observed once cancelled.
struct SlowAgent;

impl ExecRun for SlowAgent {
    fn exec_run(&self, _input: Vec<InputMessage>, cancel: CancelToken) -> ChunkStream {
        Box::pin(async_stream::stream! {
            yield Ok(Chunk {
                kind: "assistant".into(),
                message: Some(ChunkMessage {
                    role: Some("assistant".into()),
                    content: RawContent::Text("first".into()),
                }),
                usage: None,
                extra: Default::default(),
            });

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                _ = cancel.cancelled() => { return; }
            }

            yield Ok(Chunk {
                kind: "assistant".into(),
                message: Some(ChunkMessage {
                    role: Some("assistant".into()),
                    content: RawContent::Text("final".into()),
                }),
                usage: Some(ChunkUsage { prompt_tokens: Some(1), completion_tokens: Some(1) }),
                extra: Default::default(),
            });
        })
    }
}

// S4 — cancel while running.
#[tokio::test]
async fn cancel_while_running_stops_before_final_chunk() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let agent = Agent::builder(SlowAgent).with_store(store).build().await.unwrap();
    let router = http::build_router(Arc::new(agent));

    let payload = json!({
        "input": { "messages": [{ "role": "user", "content": "hi" }] }
    });
    let (_, run) = send_json(router.clone(), "POST", "/api/v1/runs", Some(payload)).await;
    let run_id = run["id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, cancelled) = send_json(
        router.clone(),
        "POST",
        &format!("/api/v1/runs/{run_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert!(cancelled["cancelled_at"].is_i64());
    assert!(cancelled["completed_at"].is_null());

    let (_, fetched) = send_json(router, "GET", &format!("/api/v1/runs/{run_id}"), None).await;
    assert_eq!(fetched["status"], "cancelled");
    let output = fetched["output"].as_array();
    if let Some(output) = output {
        for message in output {
            for block in message["content"].as_array().unwrap() {
                assert_ne!(block["text"]["value"], "final");
            }
        }
    }
}

// S2 — stream framing.
#[tokio::test]
async fn stream_run_emits_frames_in_spec_order() {
    let (_dir, agent) = test_agent().await;
    let router = http::build_router(agent);

    let payload = json!({
        "input": { "messages": [{ "role": "user", "content": "Hi" }] }
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/runs/stream")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();

    let mut events = Vec::new();
    for frame in body.split("\n\n") {
        if frame.trim().is_empty() {
            continue;
        }
        let event_line = frame
            .lines()
            .find(|l| l.starts_with("event:"))
            .map(|l| l.trim_start_matches("event:").trim().to_string());
        if let Some(event) = event_line {
            events.push(event);
        }
    }

    assert!(events.len() >= 7, "expected at least 7 frames, got {events:?}");
    assert_eq!(events[0], "thread.run.created");
    assert_eq!(events[1], "thread.run.in_progress");
    assert_eq!(events[2], "thread.message.created");
    assert_eq!(events[events.len() - 3], "thread.message.completed");
    assert_eq!(events[events.len() - 2], "thread.run.completed");
    assert_eq!(events.last().unwrap(), "done");
    for middle in &events[3..events.len() - 3] {
        assert_eq!(middle, "thread.message.delta");
    }
}

// Invariant 5 — round-trip of createThread.
#[tokio::test]
async fn get_thread_round_trips_creation() {
    let (_dir, agent) = test_agent().await;
    let router = http::build_router(agent);

    let (status, created) = send_json(router.clone(), "POST", "/api/v1/threads", None).await;
    assert_eq!(status, StatusCode::OK);
    let thread_id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send_json(
        router,
        "GET",
        &format!("/api/v1/threads/{thread_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["created_at"], created["created_at"]);
    assert_eq!(fetched["metadata"], created["metadata"]);
    assert_eq!(fetched["messages"].as_array().unwrap().len(), 0);
}
