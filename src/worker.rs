//! Background jobs: one worker thread per operation
//!
//! The caller does not block. The job reports through its callback when it
//! ends, and through an event channel for whoever watches progress. Jobs
//! cannot be cancelled and have no timeout.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use crossbeam::channel::{self, Receiver};
use crate::Result;

#[derive(Debug)]
pub enum JobOutcome<T> {
    Completed(T),
    Failed(crate::Error),
}

impl<T> JobOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    Started { job: String },
    Completed { job: String },
    Failed { job: String, error: String },
}

pub struct JobHandle {
    name: String,
    events: Receiver<JobEvent>,
    handle: thread::JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return every event it sent
    pub fn join(self) -> Vec<JobEvent> {
        if self.handle.join().is_err() {
            tracing::error!("Worker thread of job {} panicked", self.name);
        }
        self.events.try_iter().collect()
    }
}

/// Run `job` on its own thread; `callback` runs on that thread once the job ends
pub fn spawn_job<T, J, C>(name: &str, job: J, callback: C) -> Result<JobHandle>
where
    T: Send + 'static,
    J: FnOnce() -> Result<T> + Send + 'static,
    C: FnOnce(JobOutcome<T>) + Send + 'static,
{
    let (tx, rx) = channel::unbounded::<JobEvent>();
    let job_name = name.to_string();

    let handle = thread::Builder::new()
        .name(format!("job-{}", name))
        .spawn(move || {
            tracing::info!("Job {} started", job_name);
            tx.send(JobEvent::Started { job: job_name.clone() }).ok();

            let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(value)) => JobOutcome::Completed(value),
                Ok(Err(e)) => JobOutcome::Failed(e),
                Err(_) => JobOutcome::Failed(crate::Error::Job(job_name.clone())),
            };

            let event = match &outcome {
                JobOutcome::Completed(_) => {
                    tracing::info!("Job {} completed", job_name);
                    JobEvent::Completed { job: job_name.clone() }
                }
                JobOutcome::Failed(e) => {
                    tracing::error!("Job {} failed: {}", job_name, e);
                    JobEvent::Failed {
                        job: job_name.clone(),
                        error: e.to_string(),
                    }
                }
            };
            callback(outcome);
            tx.send(event).ok();
        })?;

    Ok(JobHandle {
        name: name.to_string(),
        events: rx,
        handle,
    })
}
