//! Background producer with a bounded rendezvous queue
//!
//! Runs a producer on its own thread feeding a small bounded queue with
//! backpressure on both sides: the producer blocks on a full queue, the
//! consumer blocks on an empty one. This is the single place the core
//! crosses threads; plain evaluation stays on the caller's thread.
//!
//! Dropping or closing the consumer side disconnects the queue; the
//! producer's next send fails and the producer thread winds down, so
//! `close` never abandons a running thread for long.

use crate::error::Result;
use crate::exec::QueryResults;
use crate::solution::Solution;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;
use tracing::debug;

/// Consumer side of a background producer.
pub struct ProducerIter<T> {
    rx: Option<Receiver<T>>,
    handle: Option<JoinHandle<()>>,
}

/// Spawn `produce` on its own thread, feeding a queue of the given
/// capacity. The closure must stop promptly when a send fails (the
/// consumer closed).
pub fn spawn_producer<T, F>(capacity: usize, produce: F) -> ProducerIter<T>
where
    T: Send + 'static,
    F: FnOnce(&SyncSender<T>) + Send + 'static,
{
    let (tx, rx) = sync_channel(capacity.max(1));
    let handle = std::thread::spawn(move || {
        produce(&tx);
        debug!("background producer finished");
    });
    ProducerIter {
        rx: Some(rx),
        handle: Some(handle),
    }
}

impl<T> ProducerIter<T> {
    /// Disconnect the queue and join the producer thread. Idempotent.
    pub fn close(&mut self) {
        // Dropping the receiver makes the producer's sends fail.
        self.rx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<T> Iterator for ProducerIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.rx.as_ref()?.recv().ok();
        if item.is_none() {
            // Producer finished; reap the thread.
            self.close();
        }
        item
    }
}

impl<T> Drop for ProducerIter<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Query results streamed from a background evaluation thread.
pub struct BackgroundResults {
    names: Vec<std::sync::Arc<str>>,
    iter: ProducerIter<Result<Solution>>,
}

impl BackgroundResults {
    /// Move a prepared evaluation onto a producer thread with the
    /// configured queue capacity.
    pub fn spawn(mut results: QueryResults) -> Self {
        let names = results.binding_names().to_vec();
        let capacity = results.queue_capacity();
        let iter = spawn_producer(capacity, move |tx| {
            while let Some(item) = results.next_solution() {
                let failed = item.is_err();
                if tx.send(item).is_err() {
                    break;
                }
                if failed {
                    break;
                }
            }
            results.close();
        });
        Self { names, iter }
    }

    /// The declared binding names, in order.
    pub fn binding_names(&self) -> &[std::sync::Arc<str>] {
        &self.names
    }

    /// Disconnect and join the producer. Idempotent.
    pub fn close(&mut self) {
        self.iter.close();
    }
}

impl Iterator for BackgroundResults {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}
