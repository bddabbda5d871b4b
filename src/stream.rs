//! Push-based result streams
//!
//! A [`ResultSink`] is the producing half: it pushes items and recoverable
//! errors, then finishes with exactly one [`close`](ResultSink::close) or
//! [`error`](ResultSink::error). Both consume the sink, so nothing can be
//! pushed afterwards.
//!
//! The consuming half, [`ResultStream`], is a [`Stream`] of `Result<T>`.
//! Items are buffered until the consumer polls for them, so it may
//! attach at any time without missing anything, and the producer never
//! waits on the consumer.

use crate::error::{Error, Result};
use futures::Stream;
use futures::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::trace;

/// Create a connected sink/stream pair.
#[must_use]
pub fn channel<T>() -> (ResultSink<T>, ResultStream<'static, T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ResultSink { tx },
        ResultStream {
            items: rx,
            driver: None,
        },
    )
}

/// Producing half of a [`ResultStream`].
#[derive(Debug)]
pub struct ResultSink<T> {
    tx: mpsc::UnboundedSender<Result<T>>,
}

impl<T> ResultSink<T> {
    /// Push one item. Returns `false` once the consumer is gone.
    pub fn push(&self, item: T) -> bool {
        self.send(Ok(item))
    }

    /// Push a recoverable error; the stream keeps going.
    pub fn push_error(&self, err: Error) -> bool {
        debug_assert!(!err.is_fatal(), "fatal errors must end the stream");
        self.send(Err(err))
    }

    /// End the stream normally.
    pub fn close(self) {
        trace!("Result stream closed");
    }

    /// End the stream with a terminal error.
    pub fn error(self, err: Error) {
        trace!(%err, "Result stream failed");
        self.send(Err(err));
    }

    /// Whether the consuming half has been dropped.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, item: Result<T>) -> bool {
        self.tx.send(item).is_ok()
    }
}

/// Consuming half of a result channel.
///
/// A stream may carry the future that produces its items (see
/// [`driven_by`](ResultStream::driven_by)); that future is polled
/// whenever the stream is, so results flow while the producer is still
/// running, and dropping the stream drops the producer.
pub struct ResultStream<'a, T> {
    items: mpsc::UnboundedReceiver<Result<T>>,
    driver: Option<BoxFuture<'a, ()>>,
}

impl<T> ResultStream<'_, T> {
    /// Attach the producer that feeds this stream.
    pub fn driven_by<'a, F>(self, driver: F) -> ResultStream<'a, T>
    where
        F: Future<Output = ()> + Send + 'a,
    {
        ResultStream {
            items: self.items,
            driver: Some(Box::pin(driver)),
        }
    }
}

impl<T> Stream for ResultStream<'_, T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(driver) = this.driver.as_mut() {
            if driver.as_mut().poll(cx).is_ready() {
                // Drops the producer's sink along with it.
                this.driver = None;
            }
        }
        this.items.poll_recv(cx)
    }
}

impl<T> std::fmt::Debug for ResultStream<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("driven", &self.driver.is_some())
            .finish_non_exhaustive()
    }
}
