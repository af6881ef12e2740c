//! The default implementation of all seven operations, bound to a concrete
//! store + exec + in-flight registry. Installed by the `AgentBuilder` (C4)
//! wherever the user did not supply an override.

use super::{drain, send_frame, DrainOutcome, OpAsyncRun, OpCancelRun, OpCreateThread, OpGetRun,
            OpGetThread, OpStreamRun, OpSyncRun, SseSink};
use crate::error::RuntimeError;
use crate::exec::{CancelToken, ExecRun};
use crate::ids::{new_id, now_secs};
use crate::model::{
    drop_system_messages, input_message_to_history, ContentBlock, CreateRunInput, InputMessage,
    LastError, Message, MessageStatus, Role, Run, RunPatch, RunStatus, Thread, ThreadSummary,
};
use crate::registry::InFlightTasks;
use crate::store::RecordStore;
use crate::stream_adapter::{accumulate_usage, collect, to_content_blocks_for_chunk, Chunk};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone)]
pub struct DefaultHandlers {
    pub store: Arc<dyn RecordStore>,
    pub exec: Arc<dyn ExecRun>,
    pub tasks: Arc<InFlightTasks>,
}

impl DefaultHandlers {
    pub fn new(store: Arc<dyn RecordStore>, exec: Arc<dyn ExecRun>, tasks: Arc<InFlightTasks>) -> Self {
        DefaultHandlers { store, exec, tasks }
    }

    async fn resolve_thread_id(&self, thread_id: Option<String>) -> Result<String, RuntimeError> {
        match thread_id {
            Some(id) => Ok(id),
            None => Ok(self.store.create_thread(None).await?.id),
        }
    }

    /// Persist the completed run and append its history (shared by
    /// `syncRun` and the `asyncRun` background task — spec §4.3 steps 5).
    async fn finalize_success(
        &self,
        thread_id: &str,
        run_id: &str,
        input: &[InputMessage],
        output: Vec<Message>,
        usage: Option<crate::model::Usage>,
    ) -> Result<Run, RuntimeError> {
        let updated = self
            .store
            .update_run(
                run_id,
                RunPatch {
                    status: Some(RunStatus::Completed),
                    output: Some(output.clone()),
                    usage,
                    completed_at: Some(now_secs()),
                    ..Default::default()
                },
            )
            .await?;

        let mut history: Vec<Message> = drop_system_messages(input)
            .iter()
            .map(input_message_to_history)
            .collect();
        history.extend(output);
        self.store.append_messages(thread_id, history).await?;
        Ok(updated)
    }
}

#[async_trait]
impl OpCreateThread for DefaultHandlers {
    async fn call(&self) -> Result<ThreadSummary, RuntimeError> {
        Ok(self.store.create_thread(None).await?.to_summary())
    }
}

#[async_trait]
impl OpGetThread for DefaultHandlers {
    async fn call(&self, thread_id: &str) -> Result<Thread, RuntimeError> {
        self.store.get_thread(thread_id).await
    }
}

#[async_trait]
impl OpSyncRun for DefaultHandlers {
    async fn call(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        let thread_id = self.resolve_thread_id(input.thread_id).await?;
        let run = self
            .store
            .create_run(input.input.messages, Some(thread_id.clone()), input.config, input.metadata)
            .await?;
        self.store
            .update_run(
                &run.id,
                RunPatch {
                    status: Some(RunStatus::InProgress),
                    started_at: Some(now_secs()),
                    ..Default::default()
                },
            )
            .await?;

        let cancel = CancelToken::new();
        match drain(self.exec.as_ref(), run.input.clone(), cancel, |_| {}).await {
            DrainOutcome::Completed(chunks) => {
                let collected = collect(&chunks, &run.id);
                self.finalize_success(&thread_id, &run.id, &run.input, collected.output, collected.usage)
                    .await
            }
            DrainOutcome::Failed(message) => {
                self.store
                    .update_run(
                        &run.id,
                        RunPatch {
                            status: Some(RunStatus::Failed),
                            last_error: Some(LastError {
                                code: "EXEC_ERROR".into(),
                                message: message.clone(),
                            }),
                            failed_at: Some(now_secs()),
                            ..Default::default()
                        },
                    )
                    .await?;
                Err(RuntimeError::ExecError(message))
            }
            DrainOutcome::Aborted => Err(RuntimeError::IllegalState(
                "run aborted before completion".into(),
            )),
        }
    }
}

/// Background execution launched by `asyncRun`. Removes its own registry
/// entry in every exit path (spec §4.3's "finalization step").
///
/// Waits on `registered` before touching the store or the registry: without
/// this gate a task fast enough to finish before its caller's
/// `tasks.insert()` completes would call `tasks.remove()` on an entry that
/// doesn't exist yet, then have `insert()` land afterwards and leak a
/// registry entry for a run that already reached a terminal state —
/// violating the "registry contains exactly the in-flight runs" invariant
/// (spec §3 invariant 7).
async fn run_in_background(
    store: Arc<dyn RecordStore>,
    exec: Arc<dyn ExecRun>,
    tasks: Arc<InFlightTasks>,
    thread_id: String,
    run_id: String,
    input: Vec<InputMessage>,
    cancel: CancelToken,
    registered: tokio::sync::oneshot::Receiver<()>,
) {
    let _ = registered.await;

    let _ = store
        .update_run(
            &run_id,
            RunPatch {
                status: Some(RunStatus::InProgress),
                started_at: Some(now_secs()),
                ..Default::default()
            },
        )
        .await;

    match drain(exec.as_ref(), input.clone(), cancel.clone(), |_| {}).await {
        DrainOutcome::Completed(chunks) => {
            let collected = collect(&chunks, &run_id);
            let handlers = DefaultHandlers {
                store: store.clone(),
                exec,
                tasks: tasks.clone(),
            };
            let _ = handlers
                .finalize_success(&thread_id, &run_id, &input, collected.output, collected.usage)
                .await;
        }
        DrainOutcome::Failed(message) => {
            // Cancel owns the terminal write; don't race it.
            if !cancel.is_cancelled() {
                let _ = store
                    .update_run(
                        &run_id,
                        RunPatch {
                            status: Some(RunStatus::Failed),
                            last_error: Some(LastError {
                                code: "EXEC_ERROR".into(),
                                message,
                            }),
                            failed_at: Some(now_secs()),
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }
        DrainOutcome::Aborted => {
            // cancelRun owns the terminal write.
        }
    }

    tasks.remove(&run_id).await;
}

#[async_trait]
impl OpAsyncRun for DefaultHandlers {
    async fn call(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        let thread_id = self.resolve_thread_id(input.thread_id).await?;
        let run = self
            .store
            .create_run(input.input.messages, Some(thread_id.clone()), input.config, input.metadata)
            .await?;

        let cancel = CancelToken::new();
        let store = self.store.clone();
        let exec = self.exec.clone();
        let tasks = self.tasks.clone();
        let run_id = run.id.clone();
        let run_input = run.input.clone();
        let cancel_bg = cancel.clone();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(run_in_background(
            store, exec, tasks, thread_id, run_id, run_input, cancel_bg, ready_rx,
        ));
        self.tasks.insert(run.id.clone(), cancel, handle).await;
        let _ = ready_tx.send(());

        Ok(run)
    }
}

/// Sends the terminal `done` frame exactly once, on drop, regardless of
/// which exit path `streamRun` takes — mirrors a `finally` block.
struct DoneGuard {
    sink: SseSink,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.sink.send(super::SseFrame {
            event: "done",
            data: "[DONE]".to_string(),
        });
    }
}

#[async_trait]
impl OpStreamRun for DefaultHandlers {
    async fn call(&self, input: CreateRunInput, sink: SseSink, cancel: CancelToken) -> Result<(), RuntimeError> {
        let thread_id = self.resolve_thread_id(input.thread_id).await?;
        let run = self
            .store
            .create_run(input.input.messages, Some(thread_id.clone()), input.config, input.metadata)
            .await?;

        if !send_frame(&sink, "thread.run.created", &run) {
            return Ok(()); // client gone before we started; nothing to drain.
        }
        let _done_guard = DoneGuard { sink: sink.clone() };

        let run = self
            .store
            .update_run(
                &run.id,
                RunPatch {
                    status: Some(RunStatus::InProgress),
                    started_at: Some(now_secs()),
                    ..Default::default()
                },
            )
            .await?;
        if !send_frame(&sink, "thread.run.in_progress", &run) {
            return Ok(());
        }

        let message_id = new_id("msg");
        let mut message = Message {
            id: message_id.clone(),
            object: "thread.message",
            created_at: now_secs(),
            thread_id: Some(thread_id.clone()),
            run_id: Some(run.id.clone()),
            role: Role::Assistant,
            status: MessageStatus::InProgress,
            content: Vec::new(),
            metadata: None,
        };
        if !send_frame(&sink, "thread.message.created", &message) {
            return Ok(());
        }

        let mut disconnected = false;
        let mut message_content: Vec<ContentBlock> = Vec::new();
        let sink_for_chunks = sink.clone();

        let outcome = drain(self.exec.as_ref(), run.input.clone(), cancel.clone(), |chunk: &Chunk| {
            if disconnected || chunk.message.is_none() {
                return;
            }
            let blocks = to_content_blocks_for_chunk(chunk.message.as_ref());
            message_content.extend(blocks.clone());
            let delta = serde_json::json!({
                "id": message_id,
                "object": "thread.message.delta",
                "delta": { "content": blocks },
            });
            let sent = sink_for_chunks
                .send(super::SseFrame {
                    event: "thread.message.delta",
                    data: delta.to_string(),
                })
                .is_ok();
            if !sent {
                disconnected = true;
                cancel.cancel();
            }
        })
        .await;

        match outcome {
            DrainOutcome::Completed(chunks) => {
                message.content = message_content;
                message.status = MessageStatus::Completed;
                let usage = accumulate_usage(&chunks);
                let output = if message.content.is_empty() {
                    Vec::new()
                } else {
                    vec![message.clone()]
                };
                let updated = self
                    .store
                    .update_run(
                        &run.id,
                        RunPatch {
                            status: Some(RunStatus::Completed),
                            completed_at: Some(now_secs()),
                            usage,
                            output: Some(output.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                if !disconnected {
                    send_frame(&sink, "thread.message.completed", &message);
                    send_frame(&sink, "thread.run.completed", &updated);
                }
                let mut history: Vec<Message> = drop_system_messages(&run.input)
                    .iter()
                    .map(input_message_to_history)
                    .collect();
                history.extend(output);
                self.store.append_messages(&thread_id, history).await?;
            }
            DrainOutcome::Failed(exec_message) => {
                let now = now_secs();
                let last_error = LastError {
                    code: "EXEC_ERROR".into(),
                    message: exec_message,
                };
                let patch = RunPatch {
                    status: Some(RunStatus::Failed),
                    failed_at: Some(now),
                    last_error: Some(last_error.clone()),
                    ..Default::default()
                };
                // A store failure while persisting the failure must not mask
                // the original exec error (spec §7) — fall back to an
                // in-memory projection for the frame if the write itself fails.
                let run_for_frame = match self.store.update_run(&run.id, patch).await {
                    Ok(r) => r,
                    Err(_) => {
                        let mut r = run.clone();
                        r.status = RunStatus::Failed;
                        r.failed_at = Some(now);
                        r.last_error = Some(last_error);
                        r
                    }
                };
                if !disconnected {
                    send_frame(&sink, "thread.run.failed", &run_for_frame);
                }
            }
            DrainOutcome::Aborted => {
                // Client disconnected mid-stream; `exec_run` was already
                // signalled via `cancel`. No further frames, no store write —
                // the run is left `in_progress`; a later cancelRun call
                // (finding no in-flight registry entry, since streamRun
                // never registers one) will mark it `cancelled` directly.
            }
        }

        Ok(())
    }
}

#[async_trait]
impl OpGetRun for DefaultHandlers {
    async fn call(&self, run_id: &str) -> Result<Run, RuntimeError> {
        self.store.get_run(run_id).await
    }
}

#[async_trait]
impl OpCancelRun for DefaultHandlers {
    async fn call(&self, run_id: &str) -> Result<Run, RuntimeError> {
        self.tasks.cancel_and_wait(run_id).await;

        let run = self.store.get_run(run_id).await?;
        if run.status.is_terminal() {
            return Err(RuntimeError::IllegalState(run.status.as_str().to_string()));
        }

        self.store
            .update_run(
                run_id,
                RunPatch {
                    status: Some(RunStatus::Cancelled),
                    cancelled_at: Some(now_secs()),
                    ..Default::default()
                },
            )
            .await
    }
}
