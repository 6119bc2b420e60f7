//! Bounded worker pool over a growable FIFO.
//!
//! Workers run cooperatively on the calling task; all concurrency comes from
//! jobs awaiting I/O. A job may push more jobs onto the queue it came from, and
//! the pool only returns once the queue is empty and no job is in flight.
//! A failing job is recorded and the pool keeps draining.

use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use futures::future::join_all;
use tokio::sync::Notify;

struct QueueState<J> {
    jobs: VecDeque<J>,
    in_flight: usize,
}

pub struct JobQueue<J> {
    state: Mutex<QueueState<J>>,
    changed: Notify,
}

impl<J> Default for JobQueue<J> {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                in_flight: 0,
            }),
            changed: Notify::new(),
        }
    }
}

impl<J> FromIterator<J> for JobQueue<J> {
    fn from_iter<I: IntoIterator<Item = J>>(iter: I) -> Self {
        let queue = Self::default();
        queue.lock().jobs.extend(iter);
        queue
    }
}

impl<J> JobQueue<J> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<J>> {
        // Never held across an await, so a poisoned lock still has a consistent queue.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, job: J) {
        self.lock().jobs.push_back(job);
        self.changed.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self) -> Take<J> {
        let mut state = self.lock();
        match state.jobs.pop_front() {
            Some(job) => {
                state.in_flight += 1;
                Take::Job(job)
            }
            None if state.in_flight == 0 => Take::Drained,
            None => Take::Wait,
        }
    }

    fn finish(&self) {
        self.lock().in_flight -= 1;
        self.changed.notify_waiters();
    }
}

enum Take<J> {
    Job(J),
    Wait,
    Drained,
}

/// What a pool run did.
#[derive(Debug)]
pub struct PoolReport<E> {
    pub completed: usize,
    pub errors: Vec<E>,
}

impl<E> PoolReport<E> {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Drains `queue` with at most `limit` jobs running at once.
pub async fn run_workers<J, E, F, Fut>(queue: &JobQueue<J>, limit: usize, task: F) -> PoolReport<E>
where
    F: Fn(J) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let limit = limit.max(1);
    let task = &task;
    let workers = (0..limit).map(|worker_id| worker(worker_id, queue, task));

    let mut report = PoolReport {
        completed: 0,
        errors: Vec::new(),
    };
    for (completed, errors) in join_all(workers).await {
        report.completed += completed;
        report.errors.extend(errors);
    }
    report
}

async fn worker<J, E, F, Fut>(worker_id: usize, queue: &JobQueue<J>, task: &F) -> (usize, Vec<E>)
where
    F: Fn(J) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut completed = 0;
    let mut errors = Vec::new();
    loop {
        let changed = queue.changed.notified();
        tokio::pin!(changed);
        changed.as_mut().enable();

        match queue.take() {
            Take::Job(job) => {
                let outcome = task(job).await;
                queue.finish();
                completed += 1;
                if let Err(err) = outcome {
                    log::warn!("Worker {} job failed: {}", worker_id, err);
                    errors.push(err);
                }
            }
            Take::Wait => changed.await,
            Take::Drained => return (completed, errors),
        }
    }
}
