//! C1 — Record Store (spec §4.1): a persistent mapping from thread-id →
//! Thread and run-id → Run, with atomic writes. `RecordStore` is the
//! substitution point; `file_store::FileStore` is the default, single-process
//! implementation.

pub mod file_store;

use crate::error::RuntimeError;
use crate::model::{AgentRunConfig, InputMessage, Message, Run, RunPatch, Thread};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Idempotent: create on-disk layout (or equivalent) if absent.
    async fn init(&self) -> Result<(), RuntimeError>;

    /// Optional teardown; default is a no-op.
    async fn destroy(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn create_thread(&self, metadata: Option<Value>) -> Result<Thread, RuntimeError>;

    async fn get_thread(&self, id: &str) -> Result<Thread, RuntimeError>;

    /// Read-modify-write append. No concurrency control: concurrent appends
    /// to the same thread may lose messages (documented limitation, spec
    /// §4.1 — production stores are expected to add locking).
    async fn append_messages(&self, id: &str, msgs: Vec<Message>) -> Result<(), RuntimeError>;

    async fn create_run(
        &self,
        input: Vec<InputMessage>,
        thread_id: Option<String>,
        config: Option<AgentRunConfig>,
        metadata: Option<Value>,
    ) -> Result<Run, RuntimeError>;

    async fn get_run(&self, id: &str) -> Result<Run, RuntimeError>;

    /// Read, shallow-merge `patch`, write. `patch` must not (and structurally
    /// cannot, via `RunPatch`) alter `id`, `object`, `created_at`, or `input`.
    async fn update_run(&self, id: &str, patch: RunPatch) -> Result<Run, RuntimeError>;
}
