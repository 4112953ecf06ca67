//! Execution queues for the capture pipeline
//!
//! `SerialQueue` runs jobs one at a time in submission order (render work).
//! `ConcurrentQueue` runs jobs on a bounded set of blocking workers with no
//! ordering between them (writer appends).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify, Semaphore};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Barrier(oneshot::Sender<()>),
}

/// Single-worker FIFO queue
pub struct SerialQueue {
    label: &'static str,
    tx: mpsc::UnboundedSender<Message>,
}

impl SerialQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn new(label: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    Message::Run(job) => {
                        if let Err(e) = tokio::task::spawn_blocking(job).await {
                            tracing::error!("{} job panicked: {}", label, e);
                        }
                    }
                    Message::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!("{} worker exited", label);
        });

        Self { label, tx }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Enqueue a job. Never blocks.
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Message::Run(Box::new(job))).is_ok()
    }

    /// Wait until every job enqueued before this call has finished
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Barrier(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Unordered queue backed by a bounded pool of blocking workers
pub struct ConcurrentQueue {
    label: &'static str,
    workers: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl ConcurrentQueue {
    pub fn new(label: &'static str, max_workers: usize) -> Self {
        Self {
            label,
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Enqueue a job. Never blocks; must be called from within a tokio runtime.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            idle: self.idle.clone(),
        };
        let workers = self.workers.clone();
        let label = self.label;

        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            if let Err(e) = tokio::task::spawn_blocking(job).await {
                tracing::error!("{} job panicked: {}", label, e);
            }
        });
    }

    /// Jobs dispatched and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no job is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_serial_queue_preserves_order() {
        let queue = SerialQueue::new("render");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let seen = seen.clone();
            assert!(queue.dispatch(move || {
                if i % 3 == 0 {
                    std::thread::sleep(Duration::from_millis(2));
                }
                seen.lock().push(i);
            }));
        }
        queue.flush().await;

        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrent_queue_wait_idle() {
        let queue = ConcurrentQueue::new("append", 4);
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..16 {
            let done = done.clone();
            queue.dispatch(move || {
                std::thread::sleep(Duration::from_millis((16 - i) as u64));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        queue.wait_idle().await;

        assert_eq!(done.load(Ordering::SeqCst), 16);
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_queue_returns() {
        let queue = ConcurrentQueue::new("append", 1);
        queue.wait_idle().await;
    }
}
