use super::*;
use crate::entity::{Lifetime, Priority};
use crate::timeline::MemoryTimeline;
use chrono::Duration;

fn entity(id: &str) -> Entity {
    Entity {
        id: id.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_push_then_get_applies_lifetime_normalization() {
    let world = WorldServer::new();
    let ability = Ability::default();

    world.push(&ability, vec![entity("e1")]).unwrap();

    let got = world.get(&ability, "e1").unwrap();
    let lifetime = got.lifetime.expect("lifetime should be synthesized");
    assert!(lifetime.from.is_some());
    assert!(lifetime.until.is_none());
}

#[test]
fn test_get_missing_is_not_found() {
    let world = WorldServer::new();
    let err = world.get(&Ability::default(), "ghost").unwrap_err();
    assert!(matches!(err, WorldError::NotFound(_)));
}

#[test]
fn test_push_rejects_empty_id_before_side_effects() {
    let timeline = Arc::new(MemoryTimeline::new(16));
    let world = WorldServer::with_timeline(Arc::clone(&timeline) as Arc<dyn TimelineSink>);
    let ability = Ability::default();

    let err = world
        .push(&ability, vec![entity("ok"), entity("")])
        .unwrap_err();
    assert!(matches!(err, WorldError::InvalidArgument(_)));

    // The whole batch aborted: nothing reached the timeline or head
    assert!(timeline.is_empty());
    assert!(world.head().is_empty());
}

#[test]
fn test_push_same_id_twice_keeps_one_entry() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let mut first = entity("e1");
    first.label = Some("v0".to_string());
    let mut second = entity("e1");
    second.label = Some("v1".to_string());

    world.push(&ability, vec![first]).unwrap();
    world.push(&ability, vec![second]).unwrap();

    let listed = world.list(&ability, None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].label.as_deref(), Some("v1"));
}

#[test]
fn test_list_sorted_by_id() {
    let world = WorldServer::new();
    let ability = Ability::default();

    world
        .push(&ability, vec![entity("c"), entity("a"), entity("b")])
        .unwrap();

    let ids: Vec<_> = world
        .list(&ability, None)
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_list_applies_filter() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let mut labeled = entity("a");
    labeled.label = Some("x".to_string());
    world.push(&ability, vec![labeled, entity("b")]).unwrap();

    let filter = EntityFilter {
        label: Some("x".to_string()),
        ..Default::default()
    };
    let matched = world.list(&ability, Some(&filter));
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, "a");
}

#[test]
fn test_push_appends_timeline_before_head_visible() {
    let timeline = Arc::new(MemoryTimeline::new(16));
    let world = WorldServer::with_timeline(Arc::clone(&timeline) as Arc<dyn TimelineSink>);
    let ability = Ability::default();

    world.push(&ability, vec![entity("e1")]).unwrap();

    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline.recent(1)[0].entity.id, "e1");
    assert!(world.head().get("e1").is_some());
}

#[test]
fn test_frozen_push_archives_but_does_not_mutate_head() {
    let timeline = Arc::new(MemoryTimeline::new(16));
    let world = WorldServer::with_timeline(Arc::clone(&timeline) as Arc<dyn TimelineSink>);
    let ability = Ability::default();

    world.push(&ability, vec![entity("live")]).unwrap();
    world.freeze(Utc::now());

    world.push(&ability, vec![entity("replayed")]).unwrap();

    assert_eq!(timeline.len(), 2);
    assert!(world.head().get("replayed").is_none());
    assert!(world.head().get("live").is_some());

    world.thaw();
    world.push(&ability, vec![entity("after")]).unwrap();
    assert!(world.head().get("after").is_some());
}

#[test]
fn test_frozen_clock_drives_gc() {
    let world = WorldServer::new();
    let ability = Ability::default();
    let now = Utc::now();

    let mut e = entity("e1");
    e.lifetime = Some(Lifetime {
        from: None,
        until: Some(now + Duration::hours(1)),
    });
    world.push(&ability, vec![e]).unwrap();

    // Frozen in the past: entity not yet expired, survives the sweep
    world.freeze(now);
    world.gc_sweep();
    assert!(world.head().get("e1").is_some());

    // Frozen past the lifetime bound: swept
    world.freeze(now + Duration::hours(2));
    world.gc_sweep();
    assert!(world.head().get("e1").is_none());
}

#[test]
fn test_gc_sweep_publishes_expired_once() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let consumer = world.new_consumer(None, None, None);
    world.bus().register(&consumer);

    let mut e = entity("e1");
    e.priority = Some(Priority::Immediate);
    e.lifetime = Some(Lifetime {
        from: None,
        until: Some(Utc::now() - Duration::seconds(1)),
    });
    world.push(&ability, vec![e]).unwrap();

    // Drop the Updated mark so only the sweep's mark remains visible
    let popped = consumer.pop_next().unwrap();
    assert_eq!(popped.1, ChangeKind::Updated);

    world.gc_sweep();
    let (id, kind, priority) = consumer.pop_next().unwrap();
    assert_eq!(id, "e1");
    assert_eq!(kind, ChangeKind::Expired);
    assert_eq!(priority, Priority::Immediate);

    // Exactly once: a second sweep finds nothing
    world.gc_sweep();
    assert!(consumer.pop_next().is_none());
}

#[test]
fn test_expired_head_entry_removed_by_sweep() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let mut e = entity("e1");
    e.lifetime = Some(Lifetime {
        from: None,
        until: Some(Utc::now() - Duration::seconds(1)),
    });
    world.push(&ability, vec![e]).unwrap();
    assert!(world.head().get("e1").is_some());

    world.gc_sweep();
    assert!(world.head().get("e1").is_none());
    assert!(matches!(
        world.get(&ability, "e1").unwrap_err(),
        WorldError::NotFound(_)
    ));
}
