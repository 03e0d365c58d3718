// Head state and the push pipeline. The head map is the only cross-task
// mutable resource; it sits behind one shared-reader/exclusive-writer lock
// shared between the server and every consumer.

pub mod gc;
mod observed;
mod watch;

pub use observed::ObservedRegions;

use crate::auth::Ability;
use crate::bus::{Bus, Consumer, WatchLimiter};
use crate::entity::{ChangeKind, Entity};
use crate::error::WorldError;
use crate::filter::EntityFilter;
use crate::timeline::{MemoryTimeline, TimelineSink};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

#[cfg(test)]
mod tests;

const DEFAULT_TIMELINE_RETENTION: usize = 65_536;

/// Live head state: the latest accepted record per entity id.
pub struct Head {
    map: RwLock<HashMap<String, Entity>>,
}

impl Head {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<Entity> {
        self.map.read().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all live entities, unordered.
    pub fn snapshot(&self) -> Vec<Entity> {
        self.map.read().unwrap().values().cloned().collect()
    }

    pub(crate) fn insert(&self, entity: Entity) {
        self.map.write().unwrap().insert(entity.id.clone(), entity);
    }
}

/// The world server: head store, bus, timeline sink, observation registry,
/// and the frozen-clock switch used for historical replay.
pub struct WorldServer {
    head: Arc<Head>,
    bus: Arc<Bus>,
    timeline: Arc<dyn TimelineSink>,
    observed: ObservedRegions,

    frozen: AtomicBool,
    frozen_at: Mutex<Option<DateTime<Utc>>>,
}

impl WorldServer {
    pub fn new() -> Self {
        Self::with_timeline(Arc::new(MemoryTimeline::new(DEFAULT_TIMELINE_RETENTION)))
    }

    pub fn with_timeline(timeline: Arc<dyn TimelineSink>) -> Self {
        Self {
            head: Arc::new(Head::new()),
            bus: Arc::new(Bus::new()),
            timeline,
            observed: ObservedRegions::new(),
            frozen: AtomicBool::new(false),
            frozen_at: Mutex::new(None),
        }
    }

    pub fn head(&self) -> &Arc<Head> {
        &self.head
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn observed(&self) -> &ObservedRegions {
        &self.observed
    }

    /// Wall time, or the recorded freeze instant while frozen. The garbage
    /// collector's clock indirects through this.
    pub fn now(&self) -> DateTime<Utc> {
        if self.frozen.load(Ordering::Acquire) {
            if let Some(at) = *self.frozen_at.lock().unwrap() {
                return at;
            }
        }
        Utc::now()
    }

    /// Enter frozen mode: pushes keep appending to the timeline but stop
    /// mutating head state, and the GC evaluates lifetimes against `at`.
    pub fn freeze(&self, at: DateTime<Utc>) {
        *self.frozen_at.lock().unwrap() = Some(at);
        self.frozen.store(true, Ordering::Release);
        info!(at = %at, "world frozen");
    }

    pub fn thaw(&self) {
        self.frozen.store(false, Ordering::Release);
        *self.frozen_at.lock().unwrap() = None;
        info!("world thawed");
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Accept a batch of changes. Authorization runs over the whole batch
    /// before any side effect; a single denial aborts everything. Accepted
    /// changes are lifetime-normalized and appended to the timeline, then
    /// (unless frozen) written to head and announced on the bus.
    pub fn push(&self, ability: &Ability, changes: Vec<Entity>) -> Result<bool, WorldError> {
        for entity in &changes {
            if entity.id.is_empty() {
                return Err(WorldError::InvalidArgument(
                    "entity id must not be empty".to_string(),
                ));
            }
            ability.authorize_write(entity)?;
        }

        let frozen = self.is_frozen();
        let now = Utc::now();

        let mut map = self.head.map.write().unwrap();
        for mut entity in changes {
            entity.normalize_lifetime(now);

            // Timeline append strictly precedes the bus notification
            self.timeline.append(now, &entity);

            if !frozen {
                map.insert(entity.id.clone(), entity.clone());
                self.bus
                    .dirty(&entity.id, Some(&entity), ChangeKind::Updated);
            }
        }

        Ok(true)
    }

    pub fn get(&self, ability: &Ability, id: &str) -> Result<Entity, WorldError> {
        let entity = self
            .head
            .get(id)
            .ok_or_else(|| WorldError::NotFound(id.to_string()))?;

        if !ability.can_read(&entity) {
            return Err(WorldError::PermissionDenied("read denied".to_string()));
        }

        Ok(entity)
    }

    /// Snapshot of matching, readable entities, sorted ascending by id.
    pub fn list(&self, ability: &Ability, filter: Option<&EntityFilter>) -> Vec<Entity> {
        let map = self.head.map.read().unwrap();
        let mut matched: Vec<Entity> = map
            .values()
            .filter(|e| filter.map_or(true, |f| f.matches(e)))
            .filter(|e| ability.can_read(e))
            .cloned()
            .collect();
        drop(map);

        matched.sort_by(|a, b| a.id.cmp(&b.id));
        matched
    }

    /// Wire a new consumer against this world's head state.
    pub fn new_consumer(
        &self,
        ability: Option<Ability>,
        limiter: Option<WatchLimiter>,
        filter: Option<EntityFilter>,
    ) -> Arc<Consumer> {
        Consumer::new(Arc::clone(&self.head), ability, limiter, filter)
    }
}

impl Default for WorldServer {
    fn default() -> Self {
        Self::new()
    }
}
