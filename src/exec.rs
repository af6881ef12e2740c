//! The user-supplied generator abstraction (spec §9 Design Notes).
//!
//! Modeled as an iterator-style trait parameterized by a cancel token: the
//! user returns a `Stream` of chunks; dropping that stream (the consumer
//! side) must abort whatever I/O the producer has in flight. Using a
//! `futures_util::Stream` gives us that for free — a stream that isn't
//! polled to completion is simply dropped, and well-behaved implementations
//! (e.g. ones built on `async-stream` or on mpsc channels) tear down their
//! background work on drop.

use crate::model::InputMessage;
use crate::stream_adapter::Chunk;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, String>> + Send>>;

/// A one-shot cooperative cancellation signal, shared between the handler's
/// inter-chunk drain loop and the user's `exec_run` implementation.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called (or immediately if it
    /// already has been). Useful inside a user `exec_run` implementation
    /// that wants to race cancellation against its own I/O.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The single operation a user agent must implement: a lazy, cancellable,
/// restartable-per-invocation producer of chunks (spec §9).
pub trait ExecRun: Send + Sync {
    fn exec_run(&self, input: Vec<InputMessage>, cancel: CancelToken) -> ChunkStream;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_pending_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        assert!(!token.is_cancelled());
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
            .await
            .expect("cancelled() should resolve immediately");
    }

    #[test]
    fn double_cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}
