//! Bounded worker pool for one round of jobs.
//!
//! A `WorkerPool` runs a batch of jobs on at most `size` OS threads and blocks
//! the caller until the batch is drained: this is the round barrier both the
//! task scheduler and the subtask engine are built on. Threads are scoped to
//! the batch, so jobs may borrow from the caller.

use crossbeam_channel::unbounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// A fixed-capacity pool of threads, spawned per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// Create a pool running up to `size` jobs at once (at least 1).
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    /// Maximum number of concurrently running jobs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run every job and wait for all of them.
    ///
    /// Returns `(job_index, result)` pairs in completion order.
    pub fn run_batch<J, R, F>(&self, jobs: Vec<J>, f: F) -> Vec<(usize, R)>
    where
        J: Send,
        R: Send,
        F: Fn(J) -> R + Sync,
    {
        self.run_batch_until(jobs, f, |_| false)
    }

    /// Run jobs until one result satisfies `stop`, then start no new ones.
    ///
    /// Jobs already running when `stop` trips are still waited for and
    /// reported. Jobs that never started are absent from the returned pairs.
    pub fn run_batch_until<J, R, F, S>(&self, jobs: Vec<J>, f: F, stop: S) -> Vec<(usize, R)>
    where
        J: Send,
        R: Send,
        F: Fn(J) -> R + Sync,
        S: Fn(&R) -> bool + Sync,
    {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = unbounded::<(usize, J)>();
        for job in jobs.into_iter().enumerate() {
            // The receiver is alive until the scope below ends.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<(usize, R)>();
        let halted = AtomicBool::new(false);
        let threads = self.size.min(total);

        thread::scope(|scope| {
            for _ in 0..threads {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let (f, stop, halted) = (&f, &stop, &halted);
                scope.spawn(move || {
                    for (index, job) in job_rx.iter() {
                        if halted.load(Ordering::SeqCst) {
                            break;
                        }
                        let result = f(job);
                        if stop(&result) {
                            halted.store(true, Ordering::SeqCst);
                        }
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            // Barrier: ends once every thread has dropped its sender.
            result_rx.iter().collect()
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(1)
    }
}
