//! C4 — Agent Enhancer: the public entry point. Wires a `RecordStore`, an
//! `ExecRun`, and the in-flight registry into `DefaultHandlers`, then lets
//! callers override any one of the seven operations independently before
//! `build()` freezes the composition (spec §9).

use std::sync::Arc;

use crate::error::RuntimeError;
use crate::exec::{CancelToken, ExecRun};
use crate::handlers::default::DefaultHandlers;
use crate::handlers::{
    OpAsyncRun, OpCancelRun, OpCreateThread, OpGetRun, OpGetThread, OpStreamRun, OpSyncRun, SseSink,
};
use crate::model::{CreateRunInput, Run, Thread, ThreadSummary};
use crate::registry::InFlightTasks;
use crate::store::file_store::{default_data_dir, FileStore};
use crate::store::RecordStore;

/// A fully composed runtime: seven operations, each either the default
/// file-store-backed implementation or a caller-supplied override.
pub struct Agent {
    create_thread: Arc<dyn OpCreateThread>,
    get_thread: Arc<dyn OpGetThread>,
    sync_run: Arc<dyn OpSyncRun>,
    async_run: Arc<dyn OpAsyncRun>,
    stream_run: Arc<dyn OpStreamRun>,
    get_run: Arc<dyn OpGetRun>,
    cancel_run: Arc<dyn OpCancelRun>,
    store: Arc<dyn RecordStore>,
    tasks: Arc<InFlightTasks>,
}

impl Agent {
    pub fn builder(exec: impl ExecRun + 'static) -> AgentBuilder {
        AgentBuilder::new(exec)
    }

    pub async fn create_thread(&self) -> Result<ThreadSummary, RuntimeError> {
        self.create_thread.call().await
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread, RuntimeError> {
        self.get_thread.call(thread_id).await
    }

    pub async fn sync_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        self.sync_run.call(input).await
    }

    pub async fn async_run(&self, input: CreateRunInput) -> Result<Run, RuntimeError> {
        self.async_run.call(input).await
    }

    pub async fn stream_run(
        &self,
        input: CreateRunInput,
        sink: SseSink,
        cancel: CancelToken,
    ) -> Result<(), RuntimeError> {
        self.stream_run.call(input, sink, cancel).await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Run, RuntimeError> {
        self.get_run.call(run_id).await
    }

    pub async fn cancel_run(&self, run_id: &str) -> Result<Run, RuntimeError> {
        self.cancel_run.call(run_id).await
    }

    /// Enhancer teardown (spec §4.4): let every in-flight background run
    /// settle, then tear down the store. Never called automatically — the
    /// host binary decides when shutdown begins.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.tasks.join_all().await;
        self.store.destroy().await
    }
}

/// Builds an `Agent`. The store defaults to `FileStore` rooted at
/// `$TEGG_AGENT_DATA_DIR` (falling back to `<cwd>/.agent-data`, spec §6);
/// every operation defaults to `DefaultHandlers` and can be overridden
/// independently.
pub struct AgentBuilder {
    exec: Arc<dyn ExecRun>,
    store: Option<Arc<dyn RecordStore>>,
    create_thread: Option<Arc<dyn OpCreateThread>>,
    get_thread: Option<Arc<dyn OpGetThread>>,
    sync_run: Option<Arc<dyn OpSyncRun>>,
    async_run: Option<Arc<dyn OpAsyncRun>>,
    stream_run: Option<Arc<dyn OpStreamRun>>,
    get_run: Option<Arc<dyn OpGetRun>>,
    cancel_run: Option<Arc<dyn OpCancelRun>>,
}

impl AgentBuilder {
    pub fn new(exec: impl ExecRun + 'static) -> Self {
        AgentBuilder {
            exec: Arc::new(exec),
            store: None,
            create_thread: None,
            get_thread: None,
            sync_run: None,
            async_run: None,
            stream_run: None,
            get_run: None,
            cancel_run: None,
        }
    }

    pub fn with_store(mut self, store: impl RecordStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn with_create_thread(mut self, op: impl OpCreateThread + 'static) -> Self {
        self.create_thread = Some(Arc::new(op));
        self
    }

    pub fn with_get_thread(mut self, op: impl OpGetThread + 'static) -> Self {
        self.get_thread = Some(Arc::new(op));
        self
    }

    pub fn with_sync_run(mut self, op: impl OpSyncRun + 'static) -> Self {
        self.sync_run = Some(Arc::new(op));
        self
    }

    pub fn with_async_run(mut self, op: impl OpAsyncRun + 'static) -> Self {
        self.async_run = Some(Arc::new(op));
        self
    }

    pub fn with_stream_run(mut self, op: impl OpStreamRun + 'static) -> Self {
        self.stream_run = Some(Arc::new(op));
        self
    }

    pub fn with_get_run(mut self, op: impl OpGetRun + 'static) -> Self {
        self.get_run = Some(Arc::new(op));
        self
    }

    pub fn with_cancel_run(mut self, op: impl OpCancelRun + 'static) -> Self {
        self.cancel_run = Some(Arc::new(op));
        self
    }

    /// Initialize the store (creating its on-disk layout if needed) and
    /// freeze the composition.
    pub async fn build(self) -> Result<Agent, RuntimeError> {
        let store = match self.store {
            Some(s) => s,
            None => Arc::new(FileStore::new(default_data_dir())),
        };
        store.init().await?;

        let tasks = Arc::new(InFlightTasks::new());
        let defaults = DefaultHandlers::new(store.clone(), self.exec.clone(), tasks.clone());

        Ok(Agent {
            create_thread: self.create_thread.unwrap_or_else(|| Arc::new(defaults.clone())),
            get_thread: self.get_thread.unwrap_or_else(|| Arc::new(defaults.clone())),
            sync_run: self.sync_run.unwrap_or_else(|| Arc::new(defaults.clone())),
            async_run: self.async_run.unwrap_or_else(|| Arc::new(defaults.clone())),
            stream_run: self.stream_run.unwrap_or_else(|| Arc::new(defaults.clone())),
            get_run: self.get_run.unwrap_or_else(|| Arc::new(defaults.clone())),
            cancel_run: self.cancel_run.unwrap_or_else(|| Arc::new(defaults.clone())),
            store,
            tasks,
        })
    }
}
