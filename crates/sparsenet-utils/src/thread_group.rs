//! Reusable barrier-style worker pool

use crossbeam::thread;

/// A fixed-size group of workers driven in lock-step.
///
/// Every call to [`ThreadGroup::start_and_block`] hands the same job to
/// `thread_count` workers, each receiving its worker index in
/// `[0, thread_count)`, and returns only when every worker has finished.
/// Jobs are expected to self-partition their work by worker index; the group
/// performs no work stealing of its own.
///
/// Workers are scoped to the call, so a job may freely borrow from the
/// caller's stack.
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    thread_count: usize,
}

impl ThreadGroup {
    /// Create a group dispatching to the given number of workers.
    ///
    /// # Panics
    /// Panics if `thread_count` is zero.
    pub fn new(thread_count: usize) -> Self {
        assert!(thread_count > 0, "a thread group needs at least one worker");
        Self { thread_count }
    }

    /// Number of workers the group dispatches to.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Run `job` on every worker and block until all of them return.
    pub fn start_and_block<F>(&self, job: F)
    where
        F: Fn(usize) + Send + Sync,
    {
        if self.thread_count == 1 {
            job(0);
            return;
        }
        let job = &job;
        thread::scope(|scope| {
            for index in 0..self.thread_count {
                scope.spawn(move |_| job(index));
            }
        })
        .expect("a thread group worker panicked");
    }
}
