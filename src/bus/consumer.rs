use crate::auth::Ability;
use crate::entity::{ChangeEvent, ChangeKind, Priority};
use crate::error::WorldError;
use crate::filter::EntityFilter;
use crate::world::Head;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Per-stream delivery limits.
///
/// A rate of zero or absent means unlimited. `minPriority` defaults to
/// `Routine`, so `Unspecified` traffic is dropped unless a stream opts in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchLimiter {
    #[serde(
        rename = "maxMessagesPerSecond",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_messages_per_second: Option<u64>,
    #[serde(rename = "minPriority", skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<Priority>,
}

/// Per-subscriber state: the priority-segregated dirty set, a single-slot
/// wake, the optional limiter and filter, and shared access to head state.
///
/// A consumer's dirty set holds each entity id in at most one priority slot;
/// repeated marks coalesce to the latest kind, so a slow subscriber sees one
/// send per entity per drain cycle rather than one per update.
pub struct Consumer {
    head: Arc<Head>,
    ability: Option<Ability>,
    limiter: Option<WatchLimiter>,
    filter: Option<EntityFilter>,

    dirty: Mutex<[HashMap<String, ChangeKind>; Priority::COUNT]>,
    wake: Notify,
}

impl Consumer {
    pub fn new(
        head: Arc<Head>,
        ability: Option<Ability>,
        limiter: Option<WatchLimiter>,
        filter: Option<EntityFilter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            head,
            ability,
            limiter,
            filter,
            dirty: Mutex::new(std::array::from_fn(|_| HashMap::new())),
            wake: Notify::new(),
        })
    }

    fn min_priority(&self) -> Priority {
        self.limiter
            .as_ref()
            .and_then(|l| l.min_priority)
            .unwrap_or(Priority::Routine)
    }

    fn rate(&self) -> Option<u64> {
        self.limiter
            .as_ref()
            .and_then(|l| l.max_messages_per_second)
            .filter(|&r| r > 0)
    }

    /// Stage a pending change for `id`. Below-minimum priorities are
    /// discarded; an id already staged elsewhere is re-seated into the new
    /// priority slot; the kind overwrites any pending one. Never suspends:
    /// a short mutex, then a wake that drops when one is already pending.
    pub fn mark_dirty(&self, id: &str, priority: Priority, kind: ChangeKind) {
        if priority < self.min_priority() {
            return;
        }

        {
            let mut dirty = self.dirty.lock().unwrap();
            // in case priority changed, reseat
            for slot in dirty.iter_mut() {
                slot.remove(id);
            }
            dirty[priority.slot()].insert(id.to_string(), kind);
        }

        self.wake.notify_one();
    }

    /// Remove and return one pending change from the highest-priority
    /// non-empty slot at or above the minimum. Order within a slot is
    /// unspecified.
    pub fn pop_next(&self) -> Option<(String, ChangeKind, Priority)> {
        let min = self.min_priority();
        let mut dirty = self.dirty.lock().unwrap();

        for slot in (0..Priority::COUNT).rev() {
            let priority = Priority::from(slot as u8);
            if priority < min {
                continue;
            }
            if let Some(id) = dirty[slot].keys().next().cloned() {
                let kind = dirty[slot].remove(&id).unwrap();
                return Some((id, kind, priority));
            }
        }
        None
    }

    /// Drain the dirty set in priority order, resolving each drained id
    /// against head state and handing the resulting event to `send`.
    ///
    /// Flash-priority drains bypass both the rate limiter and the filter:
    /// urgent events surface regardless of throttle, and regardless of
    /// whether the matcher would otherwise drop them. A drained entity that
    /// is missing or past its lifetime is surfaced as `Expired` (the entity
    /// field may be absent). Returns `Cancelled` on cancellation and
    /// propagates the first send error.
    pub async fn sender_loop<F, Fut>(
        &self,
        cancel: CancellationToken,
        mut send: F,
    ) -> Result<(), WorldError>
    where
        F: FnMut(ChangeEvent) -> Fut,
        Fut: Future<Output = Result<(), WorldError>>,
    {
        // Evenly spaced tokens, first one a full period out, no burst
        // credit: ticks that fire while a send is in flight are skipped.
        let mut ticker = self.rate().map(|rate| {
            let period = Duration::from_micros((1_000_000 / rate).max(1));
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            if cancel.is_cancelled() {
                return Err(WorldError::Cancelled);
            }

            let Some((id, mut kind, priority)) = self.pop_next() else {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(WorldError::Cancelled),
                    _ = self.wake.notified() => continue,
                }
            };

            let current = self.head.get(&id);

            if let (Some(entity), Some(ability)) = (&current, &self.ability) {
                if !ability.can_read(entity) {
                    continue;
                }
            }

            if priority == Priority::Flash {
                if current.is_some() || kind == ChangeKind::Expired {
                    send(ChangeEvent {
                        entity: current,
                        t: kind,
                    })
                    .await?;
                }
                continue;
            }

            if current.as_ref().map_or(true, |e| e.is_expired(Utc::now())) {
                kind = ChangeKind::Expired;
            }

            if let (Some(entity), Some(filter)) = (&current, &self.filter) {
                if !filter.matches(entity) {
                    continue;
                }
            }

            if let Some(ticker) = ticker.as_mut() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(WorldError::Cancelled),
                    _ = ticker.tick() => {}
                }
            }

            send(ChangeEvent {
                entity: current,
                t: kind,
            })
            .await?;
        }
    }

    #[cfg(test)]
    pub(crate) fn wake_pending(&self) -> &Notify {
        &self.wake
    }
}
