//! Process-wide stores, each owned by exactly one container and shared
//! through [`AppContext`].

pub mod activity;
pub mod jobs;
pub mod notifications;
pub mod selection;
pub mod staging;

pub use activity::{ActivityEntry, ActivityLog};
pub use jobs::JobStore;
pub use notifications::{Confirmation, ConfirmationPrompt, NotificationCenter, Toast};
pub use selection::{ApplyOutcome, Effect, SelectionState, Ticket};
pub use staging::{CellUpdate, StagingBuffer};

use crate::core::{Catalog, Pipeline};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared handle to one screen's [`SelectionState`]
#[derive(Debug, Clone)]
pub struct SelectionStore {
    inner: Arc<Mutex<SelectionState>>,
}

impl SelectionStore {
    pub fn new(pipeline: Pipeline, catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SelectionState::new(pipeline, catalog))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one setter (or several, in order) under the store lock
    pub fn update<R>(&self, f: impl FnOnce(&mut SelectionState) -> R) -> R {
        f(&mut *self.lock())
    }

    /// Read without copying the whole selection
    pub fn read<R>(&self, f: impl FnOnce(&SelectionState) -> R) -> R {
        f(&*self.lock())
    }

    pub fn snapshot(&self) -> SelectionState {
        self.lock().clone()
    }
}

/// Shared handle to the activity log
#[derive(Debug, Clone, Default)]
pub struct ActivityStore {
    inner: Arc<Mutex<ActivityLog>>,
}

impl ActivityStore {
    pub fn record(&self, operation_id: impl Into<String>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(ActivityEntry::now(operation_id));
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).entries()
    }
}

/// Every store a view needs, injected instead of reached through globals.
///
/// Cloning shares the stores. Tests build one per case for isolation.
#[derive(Clone)]
pub struct AppContext {
    pub selection: SelectionStore,
    pub jobs: JobStore,
    pub notifications: NotificationCenter,
    pub activity: ActivityStore,
}

impl AppContext {
    pub fn new(pipeline: Pipeline, toast_duration: Duration) -> Self {
        Self {
            selection: SelectionStore::new(pipeline, Catalog::new()),
            jobs: JobStore::new(),
            notifications: NotificationCenter::new(toast_duration),
            activity: ActivityStore::default(),
        }
    }
}
