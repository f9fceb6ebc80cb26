use crate::task::Probe;
use futures::FutureExt;
use std::{
    num::NonZeroUsize,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, error, info};

/// Runs a fixed batch of probes with at most `concurrency` of them in flight.
///
/// Every task is handed to exactly one worker exactly once. [`WorkerPool::run`]
/// resolves only after the last `execute` call has returned, and gives the
/// tasks back in completion order.
pub struct WorkerPool<T: Probe> {
    tasks: Vec<T>,
    concurrency: NonZeroUsize,
}

impl<T: Probe> WorkerPool<T> {
    pub fn new(tasks: Vec<T>, concurrency: NonZeroUsize) -> Self {
        Self { tasks, concurrency }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub async fn run(self) -> Vec<T> {
        if self.is_empty() {
            return Vec::new();
        }
        let total = self.tasks.len();

        let workers = self.concurrency.get();
        let start = Instant::now();
        info!(tasks = total, workers, "worker pool started");

        // Sized to the whole batch, so filling it never waits on a consumer.
        let (tx, rx) = mpsc::channel::<T>(total);
        for task in self.tasks {
            if let Err(e) = tx.try_send(task) {
                let task = e.into_inner();
                error!(host = task.target(), "task queue rejected a task");
            }
        }
        drop(tx);

        let queue = Arc::new(AsyncMutex::new(rx));
        let completed = Arc::new(Mutex::new(Vec::with_capacity(total)));

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let completed = Arc::clone(&completed);
                tokio::spawn(worker(id, queue, completed))
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "worker terminated abnormally");
            }
        }

        let completed = match Arc::try_unwrap(completed) {
            Ok(completed) => completed.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => std::mem::take(&mut *shared.lock().unwrap_or_else(PoisonError::into_inner)),
        };

        info!(
            tasks = completed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "worker pool finished"
        );
        completed
    }
}

async fn worker<T: Probe>(
    id: usize,
    queue: Arc<AsyncMutex<mpsc::Receiver<T>>>,
    completed: Arc<Mutex<Vec<T>>>,
) {
    let mut processed = 0usize;
    loop {
        let next = queue.lock().await.recv().await;
        let Some(mut task) = next else {
            break;
        };

        debug!(worker = id, host = task.target(), "executing probe");
        let outcome = AssertUnwindSafe(task.execute()).catch_unwind().await;
        processed += 1;

        // The task's state is unknown after a panic; drop it and keep draining.
        if outcome.is_err() {
            error!(worker = id, host = task.target(), "task panicked, dropped");
            continue;
        }

        completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }
    debug!(worker = id, processed, "worker exiting");
}
