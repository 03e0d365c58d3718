// Authorization seam. Policy evaluation itself lives outside the core; the
// server only consults this capability object. The default build grants
// everything.

use crate::entity::Entity;
use crate::error::WorldError;

/// A capability bound to a remote identity (source address for now).
#[derive(Clone, Debug, Default)]
pub struct Ability {
    peer: Option<String>,
}

impl Ability {
    /// Bind a capability to a remote peer address.
    pub fn for_peer(remote_addr: impl Into<String>) -> Self {
        let addr = remote_addr.into();
        // Strip a port suffix so abilities key on the host alone
        let host = addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or(addr);
        Self { peer: Some(host) }
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    /// Whether this peer may observe the given entity. A denied read is a
    /// filter miss on streams, not an error.
    pub fn can_read(&self, _entity: &Entity) -> bool {
        true
    }

    /// Authorize a write. A denial aborts the entire push batch before any
    /// side effect.
    pub fn authorize_write(&self, _entity: &Entity) -> Result<(), WorldError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_peer_strips_port() {
        let ability = Ability::for_peer("10.1.2.3:5991");
        assert_eq!(ability.peer(), Some("10.1.2.3"));

        let ability = Ability::for_peer("localhost");
        assert_eq!(ability.peer(), Some("localhost"));
    }

    #[test]
    fn test_default_ability_allows_everything() {
        let ability = Ability::default();
        let e = Entity {
            id: "e1".to_string(),
            ..Default::default()
        };
        assert!(ability.can_read(&e));
        assert!(ability.authorize_write(&e).is_ok());
    }
}
