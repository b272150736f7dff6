#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **grove-queue** – Bounded worker pool serializing mutating requests.
//!
//! All operations that may mutate forest state funnel through a single
//! bounded FIFO queue served by a fixed set of worker tasks. The queue
//! bound provides back-pressure: a full queue suspends the submitter
//! until a worker dequeues. Each request carries an operation label, a
//! closure over the shared state and a oneshot reply channel; results
//! come back on the reply channel.
//!
//! Shutdown is cooperative: signal, let workers drain queued requests,
//! and wait for every worker task to exit.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default number of worker tasks.
pub const DEFAULT_WORKERS: usize = 5;

/// Default request queue capacity.
pub const DEFAULT_CAPACITY: usize = 64;

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Failures of the queue itself (never of the submitted operation).
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueueError {
    /// The pool is shutting down and no longer accepts requests.
    #[error("worker pool is shut down")]
    Closed,
    /// The worker dropped the reply channel without answering.
    #[error("worker dropped request for operation {0}")]
    Dropped(String),
}

//─────────────────────────────
//  Requests
//─────────────────────────────

type Job<T> = Box<dyn FnOnce(T) -> BoxFuture<'static, ()> + Send>;

struct Request<T> {
    operation: String,
    job: Job<T>,
}

/// Cloneable submission handle onto the pool's queue.
pub struct QueueClient<T> {
    tx: mpsc::Sender<Request<T>>,
}

impl<T> Clone for QueueClient<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> std::fmt::Debug for QueueClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> QueueClient<T> {
    /// Enqueue `f` and wait for its result.
    ///
    /// Requests execute FIFO, one at a time per worker. The call
    /// suspends while the queue is full.
    pub async fn submit<R, F, Fut>(&self, operation: &str, f: F) -> Result<R, QueueError>
    where
        R: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = R> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<T> = Box::new(move |state| {
            Box::pin(async move {
                let result = f(state).await;
                let _ = reply_tx.send(result);
            })
        });

        self.tx
            .send(Request { operation: operation.to_owned(), job })
            .await
            .map_err(|_| QueueError::Closed)?;

        reply_rx
            .await
            .map_err(|_| QueueError::Dropped(operation.to_owned()))
    }
}

//─────────────────────────────
//  Worker pool
//─────────────────────────────

/// The pool: owns the worker tasks and the shutdown signal.
pub struct WorkerPool<T> {
    client: QueueClient<T>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl<T> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> WorkerPool<T> {
    /// Spawn `workers` tasks over a queue of `capacity` slots, each
    /// request receiving a clone of `state`.
    pub fn new(state: T, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Request<T>>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let state = state.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(worker_loop(worker_id, rx, state, shutdown_rx))
            })
            .collect();

        Self {
            client: QueueClient { tx },
            shutdown_tx,
            workers: handles,
        }
    }

    /// Pool with the default worker count and capacity.
    pub fn with_defaults(state: T) -> Self {
        Self::new(state, DEFAULT_WORKERS, DEFAULT_CAPACITY)
    }

    /// A submission handle. Handles stay valid until shutdown completes.
    pub fn client(&self) -> QueueClient<T> {
        self.client.clone()
    }

    /// Signal shutdown, drain queued requests and wait for all workers.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        drop(self.client);
        for handle in self.workers {
            let _ = handle.await;
        }
        debug!("worker pool drained and stopped");
    }
}

async fn worker_loop<T: Clone + Send + Sync + 'static>(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Request<T>>>>,
    state: T,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        // Dequeue with the receiver lock held, run with it released so
        // the other workers keep draining.
        let request = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                request = rx.recv() => request,
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    // Queued requests still drain before the worker exits.
                    match rx.try_recv() {
                        Ok(request) => Some(request),
                        Err(_) => None,
                    }
                }
            }
        };

        match request {
            Some(request) => {
                trace!(worker_id, operation = %request.operation, "executing request");
                (request.job)(state.clone()).await;
            }
            None => {
                trace!(worker_id, "worker exiting");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Counter(Arc<AtomicUsize>);

    #[tokio::test]
    async fn submit_returns_the_operation_result() {
        let pool = WorkerPool::new((), 2, 8);
        let client = pool.client();

        let answer = client.submit("add", |_| async { 40 + 2 }).await.unwrap();
        assert_eq!(answer, 42);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn single_worker_preserves_fifo_order() {
        let log: Arc<Mutex<Vec<usize>>> = Arc::default();
        let pool = WorkerPool::new(Arc::clone(&log), 1, 16);
        let client = pool.client();

        let mut pending = Vec::new();
        for i in 0..8 {
            let client = client.clone();
            pending.push(tokio::spawn(async move {
                client
                    .submit("record", move |log: Arc<Mutex<Vec<usize>>>| async move {
                        log.lock().await.push(i);
                    })
                    .await
                    .unwrap();
            }));
        }
        // Submissions above race; serialize them instead.
        for task in pending {
            task.await.unwrap();
        }

        let recorded = log.lock().await.clone();
        assert_eq!(recorded.len(), 8);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn sequential_submissions_run_in_order() {
        let log: Arc<Mutex<Vec<usize>>> = Arc::default();
        let pool = WorkerPool::new(Arc::clone(&log), 1, 4);
        let client = pool.client();

        for i in 0..6 {
            client
                .submit("record", move |log: Arc<Mutex<Vec<usize>>>| async move {
                    log.lock().await.push(i);
                })
                .await
                .unwrap();
        }

        assert_eq!(*log.lock().await, vec![0, 1, 2, 3, 4, 5]);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn small_capacity_still_completes_everything() {
        let counter = Counter::default();
        let pool = WorkerPool::new(counter.clone(), 2, 1);
        let client = pool.client();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move {
                    client
                        .submit("bump", |c: Counter| async move {
                            c.0.fetch_add(1, Ordering::SeqCst);
                        })
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(counter.0.load(Ordering::SeqCst), 20);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_work() {
        let counter = Counter::default();
        let pool = WorkerPool::new(counter.clone(), 2, 8);
        let client = pool.client();

        let slow = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .submit("slow", |c: Counter| async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        c.0.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            })
        };
        // Give the worker a chance to dequeue before shutting down.
        tokio::time::sleep(Duration::from_millis(10)).await;

        pool.shutdown().await;
        slow.await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_closed() {
        let pool = WorkerPool::new((), 1, 4);
        let client = pool.client();
        pool.shutdown().await;

        let err = client.submit("late", |_| async {}).await.unwrap_err();
        assert_eq!(err, QueueError::Closed);
    }
}
