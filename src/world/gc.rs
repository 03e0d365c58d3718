// Lifetime garbage collection. The sweep is the only path that removes live
// state; external deletion is expressed as pushing the same id with
// `lifetime.until` set to now, which the next tick retires and announces.

use crate::entity::ChangeKind;
use crate::world::WorldServer;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

/// Run the periodic sweep. Spawned once per server from `main`.
pub async fn run_gc_loop(world: Arc<WorldServer>, every: Duration) {
    let mut ticker = interval(every);
    loop {
        ticker.tick().await;
        world.gc_sweep();
    }
}

impl WorldServer {
    /// Remove every head entry whose lifetime has passed and publish an
    /// `Expired` event for each. Uses the frozen-aware clock.
    pub fn gc_sweep(&self) {
        let now = self.now();

        let mut expired = Vec::new();
        {
            let mut map = self.head().map.write().unwrap();
            map.retain(|_, entity| {
                if entity.is_expired(now) {
                    expired.push(entity.clone());
                    false
                } else {
                    true
                }
            });
        }

        for entity in expired {
            debug!(id = %entity.id, "entity expired");
            self.bus()
                .dirty(&entity.id, Some(&entity), ChangeKind::Expired);
        }
    }
}
