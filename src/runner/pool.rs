//! Bounded worker pool with an unbounded queue.
//!
//! `min_workers` core workers live for the whole life of the pool. When
//! queued work outnumbers idle workers an overflow worker is added, up to
//! `max_workers`; overflow workers retire after `worker_keep_alive` without
//! work. Submissions are never rejected for capacity, they queue instead.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::RunnerConfig;
use crate::error::PoolError;

/// A unit of work queued on the pool.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerKind {
    Core,
    Overflow,
}

struct PoolInner {
    max_workers: usize,
    keep_alive: Duration,
    queue_tx: mpsc::UnboundedSender<Job>,
    queue_rx: Mutex<mpsc::UnboundedReceiver<Job>>,
    queued: AtomicUsize,
    live: AtomicUsize,
    idle: AtomicUsize,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    runtime: Handle,
}

/// Shared pool of async workers.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create the pool and start its core workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &RunnerConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let min_workers = config.min_workers.max(1);

        let pool = Self {
            inner: Arc::new(PoolInner {
                max_workers: config.max_workers.max(min_workers),
                keep_alive: config.worker_keep_alive,
                queue_tx,
                queue_rx: Mutex::new(queue_rx),
                queued: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
                runtime: Handle::current(),
            }),
        };

        for _ in 0..min_workers {
            pool.inner.live.fetch_add(1, Ordering::AcqRel);
            pool.spawn_worker(WorkerKind::Core);
        }

        tracing::debug!(
            min_workers,
            max_workers = pool.inner.max_workers,
            "Worker pool started"
        );
        pool
    }

    /// Queue a job. Never blocks.
    pub fn execute(&self, job: Job) -> Result<(), PoolError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(PoolError::ShutDown);
        }

        self.inner.queued.fetch_add(1, Ordering::AcqRel);
        if self.inner.queue_tx.send(job).is_err() {
            self.inner.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::ShutDown);
        }

        self.maybe_grow();
        Ok(())
    }

    /// Stop intake, drop queued jobs and interrupt running ones.
    ///
    /// Returns the number of queued jobs that will never run.
    pub fn shutdown_now(&self) -> usize {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();

        let abandoned = self.inner.queued.swap(0, Ordering::AcqRel);
        if let Ok(mut rx) = self.inner.queue_rx.try_lock() {
            rx.close();
            while rx.try_recv().is_ok() {}
        }

        tracing::info!(abandoned, "Worker pool shut down");
        abandoned
    }

    /// Wait until every worker has exited. Only resolves after shutdown.
    pub async fn wait(&self) {
        self.inner.tracker.wait().await
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn live_workers(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    pub fn queued_jobs(&self) -> usize {
        self.inner.queued.load(Ordering::Acquire)
    }

    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Add an overflow worker if queued work outnumbers idle workers.
    fn maybe_grow(&self) {
        let inner = &self.inner;
        loop {
            let live = inner.live.load(Ordering::Acquire);
            if live >= inner.max_workers {
                return;
            }
            if inner.queued.load(Ordering::Acquire) <= inner.idle.load(Ordering::Acquire) {
                return;
            }
            if inner
                .live
                .compare_exchange(live, live + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                tracing::debug!(workers = live + 1, "Adding overflow worker");
                self.spawn_worker(WorkerKind::Overflow);
                return;
            }
        }
    }

    /// Spawn a worker. The caller has already counted it in `live`.
    fn spawn_worker(&self, kind: WorkerKind) {
        let inner = Arc::clone(&self.inner);
        self.inner
            .tracker
            .spawn_on(worker_loop(inner, kind), &self.inner.runtime);
    }
}

impl PoolInner {
    async fn next_job(&self, kind: WorkerKind) -> Option<Job> {
        let recv = async { self.queue_rx.lock().await.recv().await };
        match kind {
            WorkerKind::Core => recv.await,
            WorkerKind::Overflow => tokio::time::timeout(self.keep_alive, recv)
                .await
                .ok()
                .flatten(),
        }
    }
}

async fn worker_loop(inner: Arc<PoolInner>, kind: WorkerKind) {
    loop {
        inner.idle.fetch_add(1, Ordering::AcqRel);
        let next = tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => None,
            job = inner.next_job(kind) => job,
        };
        inner.idle.fetch_sub(1, Ordering::AcqRel);

        let Some(job) = next else {
            break;
        };
        // Saturating: shutdown may already have zeroed the counter.
        let _ = inner
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => {
                tracing::debug!("Interrupted running job on shutdown");
                break;
            }
            outcome = AssertUnwindSafe(job).catch_unwind() => {
                if outcome.is_err() {
                    tracing::error!("Job panicked on worker");
                }
            }
        }
    }

    inner.live.fetch_sub(1, Ordering::AcqRel);
    if kind == WorkerKind::Overflow && !inner.shutdown.is_cancelled() {
        tracing::debug!("Overflow worker retired");
    }
}
