//! Response body relay.
//!
//! Wraps the backend body so that chunks reach the caller as they arrive and
//! the end of the exchange is observed exactly once: completed, failed, or
//! cancelled because the caller went away.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{BodyDataStream, Bytes};
use futures_util::Stream;
use tokio::sync::OwnedSemaphorePermit;
use tracing::Span;

use crate::capture::{PendingCapture, ResponseOutcome};
use crate::observability::RequestSummary;

/// Backend response body on its way to the caller.
///
/// Holds a connection permit until the body ends or is dropped.
pub struct RelayStream {
    inner: BodyDataStream,
    summary: Option<RequestSummary>,
    capture: Option<PendingCapture>,
    span: Span,
    start: Instant,
    bytes: u64,
    chunks: u64,
    done: bool,
    _permit: OwnedSemaphorePermit,
}

impl RelayStream {
    pub fn new(
        inner: BodyDataStream,
        permit: OwnedSemaphorePermit,
        summary: Option<RequestSummary>,
        capture: Option<PendingCapture>,
        span: Span,
    ) -> Self {
        Self {
            inner,
            summary,
            capture,
            span,
            start: Instant::now(),
            bytes: 0,
            chunks: 0,
            done: false,
            _permit: permit,
        }
    }

    fn complete(&mut self) {
        self.done = true;
        let span = self.span.clone();
        let _entered = span.enter();
        tracing::info!(
            bytes = self.bytes,
            chunks = self.chunks,
            "Stream done in {:.2}s, {} bytes",
            self.start.elapsed().as_secs_f64(),
            self.bytes
        );
        if let Some(summary) = self.summary.take() {
            summary.emit();
        }
        self.finish_capture(ResponseOutcome::Completed);
    }

    fn fail(&mut self, err: &axum::Error) {
        self.done = true;
        let span = self.span.clone();
        let _entered = span.enter();
        tracing::warn!(error = %err, bytes = self.bytes, "Backend response failed mid-stream");
        self.finish_capture(ResponseOutcome::Failed);
    }

    fn finish_capture(&mut self, outcome: ResponseOutcome) {
        if let Some(capture) = self.capture.take() {
            capture.finish(outcome, self.bytes, self.chunks);
        }
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.len() as u64;
                this.chunks += 1;
                if let Some(capture) = &mut this.capture {
                    capture.observe(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.fail(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let span = self.span.clone();
        let _entered = span.enter();
        if self.summary.is_some() {
            tracing::info!(bytes = self.bytes, "Request cancelled before the response completed");
        } else {
            tracing::debug!(bytes = self.bytes, "Response dropped before completion");
        }
        self.finish_capture(ResponseOutcome::Cancelled);
    }
}
