//! Backpressure-aware row streams.
//!
//! A producer task pushes rows into a [`RowSink`]; the consumer pulls them from a
//! [`RowStream`]. The channel is bounded, and `pause()` on the stream is propagated to the
//! producer, which stops pulling from the database until `resume()`. Dropping or cancelling
//! the stream stops the producer.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use crate::error::MysqlMiddlewareError;
use crate::types::RowObject;

/// Rows buffered between producer and consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

type Item = Result<RowObject, MysqlMiddlewareError>;
type Mapper<T> = Box<dyn FnMut(RowObject) -> Result<T, MysqlMiddlewareError> + Send>;

/// Consumer side of a row stream.
pub struct RowStream<T = RowObject> {
    rx: mpsc::Receiver<Item>,
    mapper: Mapper<T>,
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
}

/// Producer side of a row stream.
pub struct RowSink {
    tx: mpsc::Sender<Item>,
    paused: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl RowStream<RowObject> {
    /// Create a connected sink/stream pair buffering up to `capacity` rows.
    #[must_use]
    pub fn channel(capacity: usize) -> (RowSink, RowStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (paused_tx, paused_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let sink = RowSink {
            tx,
            paused: paused_rx,
            cancel: cancel.clone(),
        };
        let stream = RowStream {
            rx,
            mapper: Box::new(Ok),
            paused: paused_tx,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
        };
        (sink, stream)
    }

    /// A stream that yields nothing.
    #[must_use]
    pub fn empty() -> RowStream {
        let (_sink, stream) = RowStream::channel(1);
        stream
    }

    /// A stream over rows that are already in memory.
    #[must_use]
    pub fn from_rows(rows: Vec<RowObject>) -> RowStream {
        let (sink, stream) = RowStream::channel(rows.len());
        for row in rows {
            // capacity covers every row
            let _ = sink.tx.try_send(Ok(row));
        }
        stream
    }
}

impl<T> RowStream<T> {
    /// Next row, or `None` once the producer finished or the stream was cancelled.
    pub async fn next(&mut self) -> Option<Result<T, MysqlMiddlewareError>> {
        let item = self.rx.recv().await?;
        Some(item.and_then(|row| (self.mapper)(row)))
    }

    /// Transform every row on the way out; pause and cancellation still reach the producer.
    #[must_use]
    pub fn map<U, F>(self, mut f: F) -> RowStream<U>
    where
        T: 'static,
        F: FnMut(T) -> Result<U, MysqlMiddlewareError> + Send + 'static,
    {
        let mut inner = self.mapper;
        RowStream {
            rx: self.rx,
            mapper: Box::new(move |row| inner(row).and_then(&mut f)),
            paused: self.paused,
            cancel: self.cancel,
            _cancel_on_drop: self._cancel_on_drop,
        }
    }

    /// Ask the producer to stop reading rows. Rows already buffered are still delivered.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Stop the producer and refuse further rows. Already-buffered rows may still be yielded.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    /// Drain the stream, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first error produced by the row source or the mapper.
    pub async fn try_collect(mut self) -> Result<Vec<T>, MysqlMiddlewareError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("paused", &self.is_paused())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl RowSink {
    /// Wait until the consumer is not paused. Returns `false` if the stream was cancelled or
    /// dropped in the meantime.
    pub async fn wait_resumed(&mut self) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if !*self.paused.borrow_and_update() {
                return true;
            }
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return false,
                changed = self.paused.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Deliver one item, honoring pause. Returns `false` once the consumer is gone.
    pub async fn send(&mut self, item: Item) -> bool {
        if !self.wait_resumed().await {
            return false;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the consumer cancels or drops the stream.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}
