use crate::core::{JobRun, JobStatus, RunId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Process-wide list of tracked training runs, newest first.
///
/// Runs only move forward through their lifecycle: a snapshot that would
/// move a run backwards (or out of a terminal state) is ignored, and
/// progress never decreases.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    runs: Arc<Mutex<Vec<JobRun>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JobRun>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a backend listing into the tracked runs. Runs already tracked
    /// follow the same forward-only rules as `upsert`; tracked runs the
    /// listing does not mention are kept, since the listing may predate them.
    pub fn load(&self, listing: Vec<JobRun>) {
        let mut runs = self.lock();
        for snapshot in listing {
            match runs.iter_mut().find(|r| r.id == snapshot.id) {
                Some(current) => {
                    merge(current, snapshot);
                }
                None => runs.push(snapshot),
            }
        }
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }

    /// Drop every tracked run
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Start tracking a newly submitted run
    pub fn track(&self, run: JobRun) {
        let mut runs = self.lock();
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(current) => {
                merge(current, run);
            }
            None => runs.insert(0, run),
        }
    }

    /// Merge one backend snapshot. Returns the run when this snapshot moved
    /// it into a terminal state.
    pub fn upsert(&self, snapshot: JobRun) -> Option<JobRun> {
        let mut runs = self.lock();
        let Some(current) = runs.iter_mut().find(|r| r.id == snapshot.id) else {
            tracing::debug!("Run {} was not tracked, ignoring snapshot", snapshot.id);
            return None;
        };
        if merge(current, snapshot) && current.status.is_terminal() {
            tracing::info!("Run {} finished as {}", current.id, current.status);
            Some(current.clone())
        } else {
            None
        }
    }

    /// Merge a batch of snapshots, returning the runs that just finished
    pub fn apply_snapshots(&self, snapshots: Vec<JobRun>) -> Vec<JobRun> {
        snapshots.into_iter().filter_map(|s| self.upsert(s)).collect()
    }

    pub fn remove(&self, id: RunId) -> Option<JobRun> {
        let mut runs = self.lock();
        let pos = runs.iter().position(|r| r.id == id)?;
        Some(runs.remove(pos))
    }

    /// Ids of every run that still needs polling
    pub fn active_ids(&self) -> Vec<RunId> {
        self.lock()
            .iter()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.id)
            .collect()
    }

    pub fn get(&self, id: RunId) -> Option<JobRun> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn runs(&self) -> Vec<JobRun> {
        self.lock().clone()
    }

    pub fn count_with(&self, status: JobStatus) -> usize {
        self.lock().iter().filter(|r| r.status == status).count()
    }
}

/// Apply a snapshot to a tracked run. Returns false when the snapshot would
/// move the run backwards and was ignored.
fn merge(current: &mut JobRun, snapshot: JobRun) -> bool {
    if !current.status.can_become(snapshot.status) {
        tracing::debug!(
            "Ignoring snapshot moving run {} from {} to {}",
            current.id,
            current.status,
            snapshot.status
        );
        return false;
    }
    let progress = current.progress.max(snapshot.progress);
    *current = JobRun { progress, ..snapshot };
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::Map;

    fn run(id: i64, status: JobStatus, progress: u8) -> JobRun {
        JobRun {
            id: RunId(id),
            label: "rf_classifier".into(),
            target_column: Some("y".into()),
            feature_columns: None,
            status,
            progress,
            stage: None,
            metrics: None,
            detailed_report: None,
            logs: Vec::new(),
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .and_then(|d| d.and_hms_opt(10, 0, id as u32))
                .unwrap(),
            error_message: None,
        }
    }

    #[test]
    fn test_terminal_runs_are_frozen() {
        let store = JobStore::new();
        store.track(run(1, JobStatus::Pending, 0));
        assert!(store.upsert(run(1, JobStatus::Running, 30)).is_none());

        let mut done = run(1, JobStatus::Completed, 100);
        done.metrics = Some(Map::new());
        assert!(store.upsert(done).is_some());

        assert!(store.upsert(run(1, JobStatus::Running, 50)).is_none());
        assert_eq!(store.get(RunId(1)).unwrap().status, JobStatus::Completed);
        assert!(store.active_ids().is_empty());
        assert_eq!(store.runs().len(), 1);
    }

    #[test]
    fn test_progress_never_decreases() {
        let store = JobStore::new();
        store.track(run(2, JobStatus::Running, 60));
        store.upsert(run(2, JobStatus::Running, 40));
        assert_eq!(store.get(RunId(2)).unwrap().progress, 60);
    }

    #[test]
    fn test_backwards_status_is_ignored() {
        let store = JobStore::new();
        store.track(run(3, JobStatus::Running, 10));
        store.upsert(run(3, JobStatus::Pending, 0));
        assert_eq!(store.get(RunId(3)).unwrap().status, JobStatus::Running);
    }

    #[test]
    fn test_load_orders_newest_first_and_lists_active() {
        let store = JobStore::new();
        store.load(vec![
            run(1, JobStatus::Completed, 100),
            run(3, JobStatus::Running, 20),
            run(2, JobStatus::Pending, 0),
        ]);
        let ids: Vec<RunId> = store.runs().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RunId(3), RunId(2), RunId(1)]);
        assert_eq!(store.active_ids(), vec![RunId(3), RunId(2)]);
        assert!(store.remove(RunId(3)).is_some());
        assert_eq!(store.count_with(JobStatus::Running), 0);
    }

    #[test]
    fn test_stale_listing_keeps_terminal_runs() {
        let store = JobStore::new();
        store.track(run(1, JobStatus::Running, 30));
        assert!(store.upsert(run(1, JobStatus::Completed, 100)).is_some());

        store.load(vec![run(1, JobStatus::Running, 50)]);
        let kept = store.get(RunId(1)).unwrap();
        assert_eq!(kept.status, JobStatus::Completed);
        assert_eq!(kept.progress, 100);
        assert!(store.active_ids().is_empty());
    }

    #[test]
    fn test_listing_without_tracked_run_keeps_it() {
        let store = JobStore::new();
        store.track(run(7, JobStatus::Pending, 0));
        store.load(Vec::new());
        assert_eq!(store.get(RunId(7)).unwrap().status, JobStatus::Pending);

        store.load(vec![run(4, JobStatus::Running, 20), run(7, JobStatus::Running, 40)]);
        let ids: Vec<RunId> = store.runs().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RunId(7), RunId(4)]);
        assert_eq!(store.get(RunId(7)).unwrap().progress, 40);

        store.clear();
        assert!(store.runs().is_empty());
    }
}
