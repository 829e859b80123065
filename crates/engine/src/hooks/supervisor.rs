//! Supervisor for detached hooks
//!
//! Async hooks run on a dedicated thread pool so they never block the
//! firing action. The supervisor only tracks how many tasks are in flight;
//! tasks report their outcome to the audit log themselves.

use actledger_core::{Error, Result};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn increment(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Decrements the in-flight count even when a task panics
struct TaskGuard(Arc<InFlight>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Thread pool running detached hook invocations
pub struct Supervisor {
    pool: rayon::ThreadPool,
    in_flight: Arc<InFlight>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("workers", &self.pool.current_num_threads())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Supervisor {
    /// Start a supervisor with `workers` threads
    ///
    /// # Errors
    ///
    /// Returns an error if `workers` is zero or the pool cannot be created
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Supervisor(
                "at least one worker thread is required".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("actledger-hook-{i}"))
            .panic_handler(|_| tracing::error!("Detached hook task panicked"))
            .build()
            .map_err(|e| Error::Supervisor(e.to_string()))?;

        Ok(Self {
            pool,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Run `task` detached from the caller
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.increment();
        let guard = TaskGuard(Arc::clone(&self.in_flight));
        self.pool.spawn(move || {
            let _guard = guard;
            task();
        });
    }

    /// Number of tasks not yet finished
    #[must_use]
    pub fn in_flight(&self) -> usize {
        *self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every spawned task has finished
    pub fn wait_idle(&self) {
        let mut count = self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .in_flight
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until idle or `timeout` elapses; returns whether idle was reached
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let count = self
            .in_flight
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self
            .in_flight
            .idle
            .wait_timeout_while(count, timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Supervisor::new(0).is_err());
    }

    #[test]
    fn test_wait_idle_waits_for_all_tasks() {
        let supervisor = Supervisor::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = Arc::clone(&done);
            supervisor.spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        supervisor.wait_idle();
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(supervisor.in_flight(), 0);
    }

    #[test]
    fn test_panicking_task_still_counted_down() {
        let supervisor = Supervisor::new(1).unwrap();
        supervisor.spawn(|| panic!("boom"));
        assert!(supervisor.wait_idle_timeout(Duration::from_secs(5)));
    }
}
