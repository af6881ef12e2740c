//! `POST /api/v1/runs/stream` — bridges `OpStreamRun`'s `SseSink` into an
//! axum `Sse` response. Grounded on the teacher's `rest::sse::session_events_sse`
//! keep-alive + `Event` construction, swapped from a broadcast subscription
//! to the one-shot `mpsc` channel `streamRun` writes its frames to.
//!
//! Two things the teacher's SSE route doesn't need but spec §4.3 requires
//! here: explicit `Cache-Control`/`Connection` headers, and a close-listener
//! that aborts the run's `CancelToken` the moment the client goes away —
//! not just the next time a chunk send happens to fail.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures_util::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::agent::Agent;
use crate::exec::CancelToken;
use crate::model::CreateRunInput;

/// Wraps the frame stream so that whenever it is dropped — the client
/// disconnected and axum dropped the response body, regardless of whether a
/// chunk was in flight at the time — `cancel` is signalled. This is the
/// "close-listener" spec §4.3 asks for: detection doesn't depend on a chunk
/// send failing first.
struct CancelOnDrop<S> {
    inner: S,
    cancel: CancelToken,
}

impl<S: Stream + Unpin> Stream for CancelOnDrop<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl<S> Drop for CancelOnDrop<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub async fn stream_run(
    State(agent): State<Arc<Agent>>,
    Json(input): Json<CreateRunInput>,
) -> impl IntoResponse {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let cancel = CancelToken::new();
    let cancel_for_run = cancel.clone();

    tokio::spawn(async move {
        if let Err(e) = agent.stream_run(input, tx, cancel_for_run).await {
            tracing::warn!(err = %e, "streamRun failed before emitting its error frame");
        }
    });

    let frames = UnboundedReceiverStream::new(rx)
        .map(|frame| Ok::<Event, Infallible>(Event::default().event(frame.event).data(frame.data)));
    let stream = CancelOnDrop { inner: frames, cancel };

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    );

    let mut response = sse.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
