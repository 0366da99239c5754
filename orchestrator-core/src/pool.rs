use std::sync::Arc;

use tokio::sync::Semaphore;

/// Bounded dispatcher for the blocking provider calls (`start_vm`,
/// `stop_vm`, `refresh`) the reconciliation loop must never await inline
/// (spec §5, §9 "Async dispatch"). The source used a
/// `multiprocessing.dummy.Pool(threads)` with `apply_async`; here a
/// `Semaphore` of `capacity` permits gates a set of `tokio::spawn` tasks,
/// which is the natural Rust analogue the spec itself suggests.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
        }
    }

    /// Dispatches `task` onto the pool without waiting for it to finish.
    /// The reconciliation loop calls this and moves on to the next cycle
    /// step immediately; completion becomes visible whenever the task next
    /// mutates shared state (via the command channel), not before.
    pub fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("worker pool semaphore closed");
            task.await;
        });
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(8)
    }
}
