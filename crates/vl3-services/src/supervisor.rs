//! Supervised set of formation tasks.
//!
//! Requests spawn formation work here instead of detaching it, so shutdown
//! and tests can wait for all of it and see panics rather than lose them.
//! Between drains only counters and the most recent reports are kept.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::{JoinError, JoinSet};

use crate::formation::FormationReport;

/// Reports kept for the next drain; older ones are dropped.
pub const RECENT_REPORTS: usize = 64;

/// Everything that finished since the last drain.
#[derive(Debug, Default)]
pub struct DrainSummary {
    /// Most recent reports, oldest first, at most `RECENT_REPORTS`.
    pub reports: Vec<FormationReport>,
    /// Tasks that ran to completion, including ones whose report was dropped.
    pub completed: usize,
    pub panicked: usize,
}

#[derive(Default)]
struct Finished {
    reports: VecDeque<FormationReport>,
    completed: usize,
    panicked: usize,
}

impl Finished {
    fn take(&mut self) -> DrainSummary {
        let done = std::mem::take(self);
        DrainSummary {
            reports: done.reports.into(),
            completed: done.completed,
            panicked: done.panicked,
        }
    }
}

#[derive(Default)]
struct Tasks {
    running: JoinSet<FormationReport>,
    finished: Finished,
}

impl Tasks {
    fn record(&mut self, joined: Result<FormationReport, JoinError>) {
        match joined {
            Ok(report) => {
                let finished = &mut self.finished;
                finished.completed += 1;
                if finished.reports.len() == RECENT_REPORTS {
                    finished.reports.pop_front();
                }
                finished.reports.push_back(report);
            }
            Err(e) if e.is_panic() => {
                tracing::error!(error = %e, "formation task panicked");
                self.finished.panicked += 1;
            }
            Err(e) => tracing::warn!(error = %e, "formation task aborted"),
        }
    }

    /// Move already finished tasks out of the running set.
    fn reap(&mut self) {
        while let Some(joined) = self.running.try_join_next() {
            self.record(joined);
        }
    }
}

#[derive(Clone, Default)]
pub struct FormationSupervisor {
    tasks: Arc<Mutex<Tasks>>,
    /// Serializes drains so a second caller also waits for in-flight work.
    draining: Arc<tokio::sync::Mutex<()>>,
}

impl FormationSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a formation task on the current runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = FormationReport> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.reap();
        tasks.running.spawn(task);
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.reap();
        tasks.running.len()
    }

    /// Wait for every spawned task, including ones spawned while waiting.
    ///
    /// Concurrent callers queue up; each returns only once nothing is
    /// running, and finished work goes to whichever caller drains it first.
    pub async fn drain(&self) -> DrainSummary {
        let _draining = self.draining.lock().await;
        loop {
            let mut running = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                if tasks.running.is_empty() {
                    return tasks.finished.take();
                }
                std::mem::take(&mut tasks.running)
            };

            let mut joined = Vec::new();
            while let Some(r) = running.join_next().await {
                joined.push(r);
            }

            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            for r in joined {
                tasks.record(r);
            }
        }
    }

    /// Abort everything still running.
    pub fn abort_all(&self) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
            .abort_all();
    }
}
