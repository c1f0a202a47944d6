//! Fan-in of independently paced streams.
//!
//! Each input runs in its own task and forwards items through a bounded
//! channel, so an input is only polled again once its previous item has been
//! taken off the channel. The merged stream yields items in the order they
//! arrive and ends when every input is exhausted.

use futures::stream::{SelectAll, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Merged view over several streams, each driven by a spawned task.
///
/// Dropping the merge signals every task to stop. Use [`StreamMerge::close`]
/// to also wait until they have.
pub struct StreamMerge<T> {
    outputs: SelectAll<ReceiverStream<T>>,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> StreamMerge<T> {
    /// Spawn one forwarding task per input. Must be called inside a tokio
    /// runtime.
    pub fn new<I, St>(inputs: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = St>,
        St: Stream<Item = T> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let mut outputs = SelectAll::new();
        let mut tasks = Vec::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            tasks.push(tokio::spawn(forward(index, input, tx, cancel.clone())));
            outputs.push(ReceiverStream::new(rx));
        }
        log::debug!("merging {} streams", tasks.len());
        Self {
            outputs,
            tasks,
            cancel,
        }
    }

    /// Number of inputs that have not finished delivering.
    pub fn active_inputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Signal every input to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop every input and wait for its task to finish. Inputs are dropped
    /// inside their tasks, which settles any fetch they had in flight.
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.outputs = SelectAll::new();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await
                && e.is_panic()
            {
                log::warn!("merge input panicked: {}", e);
            }
        }
    }
}

async fn forward<T, St>(index: usize, input: St, tx: mpsc::Sender<T>, cancel: CancellationToken)
where
    St: Stream<Item = T>,
{
    tokio::pin!(input);
    let mut forwarded = 0usize;
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = input.next() => item,
        };
        let Some(item) = item else {
            break;
        };
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(item) => sent,
        };
        if sent.is_err() {
            // receiver gone
            break;
        }
        forwarded += 1;
    }
    log::debug!("merge input {} stopped after {} items", index, forwarded);
}

impl<T> Stream for StreamMerge<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.outputs.poll_next_unpin(cx)
    }
}

impl<T> Drop for StreamMerge<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
