//! Job Poller: a cancellable periodic task that refreshes every non-terminal
//! training run in one batched request per tick.

use crate::core::{JobRun, JobStatus, Severity};
use crate::error::Result;
use crate::services::backend::Backend;
use crate::state::{ActivityStore, JobStore, NotificationCenter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

struct PollWorker<B> {
    backend: Arc<B>,
    jobs: JobStore,
    notifications: NotificationCenter,
    activity: ActivityStore,
    snapshots: watch::Sender<Vec<JobRun>>,
}

impl<B> Clone for PollWorker<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            jobs: self.jobs.clone(),
            notifications: self.notifications.clone(),
            activity: self.activity.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<B: Backend> PollWorker<B> {
    async fn poll_once(&self) -> Result<Vec<JobRun>> {
        let ids = self.jobs.active_ids();
        if ids.is_empty() {
            tracing::trace!("No active runs, skipping poll");
            return Ok(Vec::new());
        }
        tracing::debug!("Polling {} active runs", ids.len());
        let snapshots = match self.backend.fetch_runs(&ids).await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                tracing::debug!("Poll failed, retrying next tick: {}", err);
                return Err(err);
            }
        };

        let finished = self.jobs.apply_snapshots(snapshots);
        for run in &finished {
            self.announce(run);
        }
        self.snapshots.send_replace(self.jobs.runs());
        Ok(finished)
    }

    fn announce(&self, run: &JobRun) {
        self.activity.record(run.label.clone());
        match run.status {
            JobStatus::Completed => {
                self.notifications.add_toast(
                    format!("Training run #{} ({}) completed", run.id, run.label),
                    Severity::Success,
                );
            }
            _ => {
                let reason = run
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("Training run #{} failed", run.id));
                self.notifications.add_toast(reason, Severity::Error);
            }
        }
    }
}

/// Owns the polling loop of one view.
///
/// `start` replaces any running loop; `stop` is idempotent and also runs on
/// drop, so a torn-down view never leaves a timer behind.
pub struct JobPoller<B> {
    worker: PollWorker<B>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl<B: Backend> JobPoller<B> {
    pub fn new(
        backend: Arc<B>,
        jobs: JobStore,
        notifications: NotificationCenter,
        activity: ActivityStore,
    ) -> Self {
        let (snapshots, _) = watch::channel(jobs.runs());
        Self {
            worker: PollWorker {
                backend,
                jobs,
                notifications,
                activity,
                snapshots,
            },
            cancel: Mutex::new(None),
        }
    }

    /// Run list after every tick
    pub fn subscribe(&self) -> watch::Receiver<Vec<JobRun>> {
        self.worker.snapshots.subscribe()
    }

    /// Begin polling every `interval`. Must be called inside a tokio runtime.
    pub fn start(&self, interval: Duration) {
        let token = CancellationToken::new();
        let previous = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let worker = self.worker.clone();
        tracing::debug!("Job poller started, every {:?}", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = worker.poll_once() => {}
                }
            }
            tracing::debug!("Job poller stopped");
        });
    }

    /// Cancel the loop. Safe to call any number of times.
    pub fn stop(&self) {
        let token = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    /// One poll outside the timer. Returns the runs that just finished.
    pub async fn poll_once(&self) -> Result<Vec<JobRun>> {
        self.worker.poll_once().await
    }
}

impl<B> Drop for JobPoller<B> {
    fn drop(&mut self) {
        if let Some(token) = self
            .cancel
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }
}
