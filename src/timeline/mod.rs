// Timeline sink. Every accepted change is appended here before the bus is
// notified, so history survives head-state removal. The core only ever calls
// `append`; richer historical queries live behind other services.

use crate::entity::Entity;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// An accepted change as recorded on the timeline.
#[derive(Clone, Debug)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub entity: Entity,
}

/// Append-only sink for accepted changes. Implementations must be safe to
/// call from concurrent push handlers.
pub trait TimelineSink: Send + Sync {
    fn append(&self, at: DateTime<Utc>, entity: &Entity);
}

/// Bounded in-memory timeline. Oldest entries are dropped once the retention
/// cap is reached.
pub struct MemoryTimeline {
    entries: Mutex<VecDeque<TimelineEntry>>,
    cap: usize,
}

impl MemoryTimeline {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            cap,
        }
    }

    /// Most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<TimelineEntry> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .skip(entries.len().saturating_sub(n))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimelineSink for MemoryTimeline {
    fn append(&self, at: DateTime<Utc>, entity: &Entity) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.cap {
            entries.pop_front();
        }
        entries.push_back(TimelineEntry {
            at,
            entity: entity.clone(),
        });
    }
}
