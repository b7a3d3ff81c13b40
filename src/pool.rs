//! Fixed-size worker pool fed through a bounded queue.

use crate::constants::QUEUE_DEPTH_PER_WORKER;
use crate::error::{CompressionError, Result};
use crossbeam_channel::bounded;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_queue_capacity(workers, workers * QUEUE_DEPTH_PER_WORKER)
    }

    pub fn with_queue_capacity(workers: usize, queue_capacity: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("img-fit-worker-{}", i))
            .build()
            .map_err(|e| CompressionError::ThreadPool(e.to_string()))?;

        Ok(Self {
            pool,
            workers,
            queue_capacity: queue_capacity.max(1),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process `items` on the pool's workers.
    ///
    /// The calling thread feeds the bounded queue, so at most
    /// `queue_capacity` items wait at any time. `work` runs once per item
    /// taken off the queue and `on_done` receives its result. Once `cancel`
    /// is set, feeding stops and queued items are dropped unprocessed.
    /// Returns the number of items processed.
    pub fn run<T, R, W, D>(&self, items: Vec<T>, cancel: &AtomicBool, work: W, on_done: D) -> usize
    where
        T: Send,
        W: Fn(T) -> R + Sync,
        D: Fn(R) + Sync,
    {
        let (task_tx, task_rx) = bounded::<T>(self.queue_capacity);
        let processed = AtomicUsize::new(0);

        self.pool.in_place_scope(|scope| {
            for _ in 0..self.workers {
                let task_rx = task_rx.clone();
                let (work, on_done, processed) = (&work, &on_done, &processed);
                scope.spawn(move |_| {
                    while let Ok(item) = task_rx.recv() {
                        if cancel.load(Ordering::Relaxed) {
                            continue;
                        }
                        on_done(work(item));
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
            drop(task_rx);

            for item in items {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                if task_tx.send(item).is_err() {
                    break;
                }
            }
            drop(task_tx);
        });

        processed.into_inner()
    }
}
