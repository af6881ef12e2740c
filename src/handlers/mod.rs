//! C3 — Default Handlers: the seven operations, composed around the
//! `ExecRun` capability (spec §4.3). Each operation is its own single-method
//! trait so C4's builder can override any one of them independently (spec
//! §9's "capability-composition ... with optional user-supplied overrides
//! injected by a small builder").

pub mod default;

use crate::error::RuntimeError;
use crate::exec::{CancelToken, ExecRun};
use crate::model::{CreateRunInput, Run, Thread, ThreadSummary};
use crate::stream_adapter::Chunk;
use async_trait::async_trait;
use futures_util::StreamExt;

/// One SSE frame: `event: <event>\ndata: <data>\n\n`.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub event: &'static str,
    pub data: String,
}

pub type SseSink = tokio::sync::mpsc::UnboundedSender<SseFrame>;

fn send_frame<T: serde::Serialize>(sink: &SseSink, event: &'static str, data: &T) -> bool {
    let payload = serde_json::to_string(data).unwrap_or_else(|_| "null".to_string());
    sink.send(SseFrame { event, data: payload }).is_ok()
}

#[async_trait]
pub trait OpCreateThread: Send + Sync {
    async fn call(&self) -> Result<ThreadSummary, RuntimeError>;
}

#[async_trait]
pub trait OpGetThread: Send + Sync {
    async fn call(&self, thread_id: &str) -> Result<Thread, RuntimeError>;
}

#[async_trait]
pub trait OpSyncRun: Send + Sync {
    async fn call(&self, input: CreateRunInput) -> Result<Run, RuntimeError>;
}

#[async_trait]
pub trait OpAsyncRun: Send + Sync {
    async fn call(&self, input: CreateRunInput) -> Result<Run, RuntimeError>;
}

#[async_trait]
pub trait OpStreamRun: Send + Sync {
    /// `cancel` is owned by the HTTP adapter (spec §9: "all host-framework
    /// coupling is confined to that adapter") — it signals the moment the
    /// client disconnects, independent of whether a chunk is currently
    /// being sent.
    async fn call(&self, input: CreateRunInput, sink: SseSink, cancel: CancelToken) -> Result<(), RuntimeError>;
}

#[async_trait]
pub trait OpGetRun: Send + Sync {
    async fn call(&self, run_id: &str) -> Result<Run, RuntimeError>;
}

#[async_trait]
pub trait OpCancelRun: Send + Sync {
    async fn call(&self, run_id: &str) -> Result<Run, RuntimeError>;
}

/// Outcome of draining `exec_run` to completion, failure, or cancellation.
pub(crate) enum DrainOutcome {
    Completed(Vec<Chunk>),
    Failed(String),
    Aborted,
}

/// Shared drain loop used by all three run-executing handlers. `on_chunk` is
/// invoked synchronously for each chunk as it arrives — callers that need to
/// write to the wire as chunks are produced (streamRun) do so from inside
/// the callback; callers that only need the final collection (sync/async)
/// pass a no-op.
pub(crate) async fn drain(
    exec: &dyn ExecRun,
    input: Vec<crate::model::InputMessage>,
    cancel: CancelToken,
    mut on_chunk: impl FnMut(&Chunk),
) -> DrainOutcome {
    let mut stream = exec.exec_run(input, cancel.clone());
    let mut chunks = Vec::new();
    loop {
        if cancel.is_cancelled() {
            return DrainOutcome::Aborted;
        }
        match stream.next().await {
            Some(Ok(chunk)) => {
                on_chunk(&chunk);
                chunks.push(chunk);
            }
            Some(Err(e)) => return DrainOutcome::Failed(e),
            // The stream can end here *because* cancellation made the
            // producer return early (its only path to EOF before yielding a
            // natural final chunk) — re-check rather than assume a clean
            // finish, or a cancelled run races finalize_success to `completed`.
            None => {
                return if cancel.is_cancelled() {
                    DrainOutcome::Aborted
                } else {
                    DrainOutcome::Completed(chunks)
                };
            }
        }
    }
}
