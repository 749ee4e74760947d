use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

pub const ACTIVITY_CAPACITY: usize = 5;

/// Short audit record of an applied operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub operation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn now(operation_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_id: operation_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Most-recent-first log bounded to [`ACTIVITY_CAPACITY`] entries
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ActivityEntry) {
        tracing::debug!("Activity recorded: {}", entry.operation_id);
        self.entries.push_front(entry);
        self.entries.truncate(ACTIVITY_CAPACITY);
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_entry_is_evicted() {
        let mut log = ActivityLog::new();
        for i in 0..7 {
            log.record(ActivityEntry::now(format!("op_{i}")));
        }
        let ids: Vec<String> = log.entries().into_iter().map(|e| e.operation_id).collect();
        assert_eq!(ids, vec!["op_6", "op_5", "op_4", "op_3", "op_2"]);
    }
}
