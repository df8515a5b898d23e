use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

/// Stands in for the original's `Queue.join()` drain-wait: an mpsc channel
/// plus an explicit in-flight counter, since `mpsc::Receiver` alone has no
/// notion of "empty and nothing being worked on right now".
#[derive(Clone)]
pub struct ProcessingQueue {
    tx: mpsc::Sender<PathBuf>,
    in_flight: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

pub struct ProcessingQueueReceiver {
    rx: mpsc::Receiver<PathBuf>,
    in_flight: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl ProcessingQueue {
    pub fn new() -> (Self, ProcessingQueueReceiver) {
        let (tx, rx) = mpsc::channel(1024);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let drained = Arc::new(Notify::new());
        (
            Self {
                tx,
                in_flight: in_flight.clone(),
                drained: drained.clone(),
            },
            ProcessingQueueReceiver {
                rx,
                in_flight,
                drained,
            },
        )
    }

    /// The same filename may be enqueued repeatedly (periodic scan plus
    /// explicit enqueue points); de-duplication happens at processing time
    /// via a file-existence check, not here.
    pub async fn enqueue(&self, path: PathBuf) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(path).await.is_err() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Block until every enqueued item has been dequeued and processed.
    ///
    /// Registers as a waiter before re-checking the counter, per `Notify`'s
    /// documented pattern — checking first and awaiting second would miss a
    /// `notify_waiters()` that lands in between.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl ProcessingQueueReceiver {
    pub async fn recv(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }

    /// Call once the dequeued item has been fully processed (whether or not
    /// it was skipped because the file no longer existed).
    pub fn mark_done(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}
