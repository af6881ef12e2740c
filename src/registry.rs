//! In-flight task registry (spec §9): a mapping from run-id to
//! `{completion-future, cancel-handle}`, guarded by a mutex (spec's own
//! recommended "simplest discipline").
//!
//! `cancel_and_wait` removes the entry before awaiting its handle, so the
//! background drainer can never be "found" again once cancellation has
//! started — this is what makes the `abort → await → update` sequence in
//! `cancelRun` race-free against the background finalizer (spec §5).

use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::exec::CancelToken;

struct TaskEntry {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

pub struct InFlightTasks {
    inner: Mutex<HashMap<String, TaskEntry>>,
}

impl InFlightTasks {
    pub fn new() -> Self {
        InFlightTasks {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, run_id: String, cancel: CancelToken, handle: JoinHandle<()>) {
        self.inner
            .lock()
            .await
            .insert(run_id, TaskEntry { cancel, handle });
    }

    /// Finalization step: remove this run's entry, if still present. A no-op
    /// if `cancel_and_wait` already removed it.
    pub async fn remove(&self, run_id: &str) {
        self.inner.lock().await.remove(run_id);
    }

    /// Signal cancellation and await the background task's completion.
    /// Returns `true` if a task was in flight for this run, `false` if it
    /// had already completed (or never existed).
    pub async fn cancel_and_wait(&self, run_id: &str) -> bool {
        let entry = self.inner.lock().await.remove(run_id);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                let _ = entry.handle.await;
                true
            }
            None => false,
        }
    }

    /// Enhancer teardown (spec §4.4): await all in-flight tasks to settle,
    /// success or failure, never rethrowing.
    pub async fn join_all(&self) {
        let entries: Vec<TaskEntry> = {
            let mut guard = self.inner.lock().await;
            guard.drain().map(|(_, v)| v).collect()
        };
        for entry in entries {
            let _ = entry.handle.await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl Default for InFlightTasks {
    fn default() -> Self {
        Self::new()
    }
}
