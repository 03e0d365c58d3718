// Publish/subscribe bus. Producers mark entities dirty; each registered
// consumer stages the id in its priority-segregated dirty set and is woken
// without ever blocking the producer. Observed-region changes ride a
// broadcast channel next to the entity path.

mod consumer;

pub use consumer::{Consumer, WatchLimiter};

use crate::entity::{ChangeKind, Entity};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;


/// Registry of live consumers plus the observed-regions notification
/// channel.
pub struct Bus {
    consumers: Mutex<Vec<Arc<Consumer>>>,
    observed_tx: broadcast::Sender<()>,
}

impl Bus {
    pub fn new() -> Self {
        let (observed_tx, _) = broadcast::channel(16);
        Self {
            consumers: Mutex::new(Vec::new()),
            observed_tx,
        }
    }

    pub fn register(&self, consumer: &Arc<Consumer>) {
        self.consumers.lock().unwrap().push(Arc::clone(consumer));
    }

    pub fn unregister(&self, consumer: &Arc<Consumer>) {
        self.consumers
            .lock()
            .unwrap()
            .retain(|c| !Arc::ptr_eq(c, consumer));
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().unwrap().len()
    }

    /// Notify every registered consumer that `id` changed. Priority comes
    /// from the entity when given, `Routine` otherwise. O(consumers); never
    /// blocks: each mark is a short mutex plus a non-blocking wake.
    pub fn dirty(&self, id: &str, entity: Option<&Entity>, kind: ChangeKind) {
        let priority = entity
            .map(Entity::effective_priority)
            .unwrap_or(crate::entity::Priority::Routine);

        let consumers = self.consumers.lock().unwrap();
        for consumer in consumers.iter() {
            consumer.mark_dirty(id, priority, kind);
        }
    }

    /// Announce a change to the observation registry.
    pub fn publish_observed(&self) {
        // No receivers is fine; observe streams come and go
        let _ = self.observed_tx.send(());
    }

    pub fn subscribe_observed(&self) -> broadcast::Receiver<()> {
        self.observed_tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
