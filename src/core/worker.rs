//! Runs blocking SDK calls off the event-loop thread.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::thread;

/// A unit of background work. Reports back by sending an event.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes jobs away from the event loop.
pub trait Worker {
    fn execute(&self, job: Job);
}

/// One OS thread per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadWorker;

impl Worker for ThreadWorker {
    fn execute(&self, job: Job) {
        thread::spawn(job);
    }
}

/// Holds jobs until [`QueuedWorker::run_pending`] is called.
///
/// Lets a host (or a test) decide exactly when background work happens
/// relative to other events.
#[derive(Default)]
pub struct QueuedWorker {
    jobs: Mutex<VecDeque<Job>>,
}

impl QueuedWorker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs queued jobs in FIFO order, including jobs queued while running.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self
                .jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Worker for QueuedWorker {
    fn execute(&self, job: Job) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
    }
}

impl<W: Worker + ?Sized> Worker for std::sync::Arc<W> {
    fn execute(&self, job: Job) {
        (**self).execute(job);
    }
}
