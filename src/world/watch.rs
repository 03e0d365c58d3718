// Watch stream core, transport-free: registration, observed-geometry
// bookkeeping, the opening sentinel, the snapshot replay, and the live
// sender loop. The RPC layer adapts this onto its own framing.

use crate::auth::Ability;
use crate::bus::WatchLimiter;
use crate::entity::{ChangeEvent, ChangeKind};
use crate::error::WorldError;
use crate::filter::EntityFilter;
use crate::world::WorldServer;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl WorldServer {
    /// Serve one watch stream: send the `invalid` sentinel, replay the
    /// current matching snapshot sorted by id as `updated` events, then
    /// forward live events through the sender loop until cancellation or a
    /// send failure. A concrete filter geometry is held in the observation
    /// registry for the lifetime of the stream.
    pub async fn watch_entities<F, Fut>(
        self: &Arc<Self>,
        ability: Option<Ability>,
        filter: Option<EntityFilter>,
        limiter: Option<WatchLimiter>,
        cancel: CancellationToken,
        mut send: F,
    ) -> Result<(), WorldError>
    where
        F: FnMut(ChangeEvent) -> Fut,
        Fut: Future<Output = Result<(), WorldError>>,
    {
        let has_ability = ability.is_some();
        let consumer = self.new_consumer(ability, limiter, filter.clone());
        self.bus().register(&consumer);

        let observed_id = filter
            .as_ref()
            .and_then(|f| f.geo.as_ref())
            .and_then(|g| g.geometry.as_ref())
            .and_then(|geometry| geometry.resolve().ok().flatten())
            .map(|planar| {
                let id = self.observed().add(planar);
                self.bus().publish_observed();
                id
            });

        let result = async {
            // ui workaround: benign opening sentinel every client must
            // tolerate
            send(ChangeEvent::sentinel()).await?;

            // The snapshot applies the stream filter but not the read
            // capability; list applies both
            if has_ability {
                debug!("watch snapshot skips the read-capability check");
            }
            let mut snapshot = self.head().snapshot();
            snapshot.sort_by(|a, b| a.id.cmp(&b.id));
            for entity in snapshot {
                if filter.as_ref().map_or(true, |f| f.matches(&entity)) {
                    send(ChangeEvent {
                        entity: Some(entity),
                        t: ChangeKind::Updated,
                    })
                    .await?;
                }
            }

            consumer.sender_loop(cancel, send).await
        }
        .await;

        if let Some(id) = observed_id {
            self.observed().remove(id);
            self.bus().publish_observed();
        }
        self.bus().unregister(&consumer);

        result
    }
}
