// Round-trip and idempotence laws for the push / get / list surface.

use atlas::auth::Ability;
use atlas::entity::{Entity, Lifetime};
use atlas::error::WorldError;
use atlas::filter::EntityFilter;
use atlas::world::WorldServer;
use chrono::{Duration as ChronoDuration, Utc};

fn entity(id: &str) -> Entity {
    Entity {
        id: id.to_string(),
        ..Default::default()
    }
}

#[test]
fn push_then_get_returns_normalized_entity() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let mut pushed = entity("e1");
    pushed.label = Some("alpha".to_string());
    world.push(&ability, vec![pushed.clone()]).unwrap();

    let got = world.get(&ability, "e1").unwrap();

    // Identical except for the synthesized lifetime
    assert_eq!(got.label, pushed.label);
    assert_eq!(got.id, pushed.id);
    assert!(got.lifetime.as_ref().unwrap().from.is_some());
    assert!(got.lifetime.as_ref().unwrap().until.is_none());
}

#[test]
fn double_push_lists_entity_exactly_once() {
    let world = WorldServer::new();
    let ability = Ability::default();

    world.push(&ability, vec![entity("e1")]).unwrap();
    world.push(&ability, vec![entity("e1")]).unwrap();

    let listed = world.list(&ability, None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "e1");
}

#[test]
fn push_with_past_until_is_gone_after_one_sweep() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let mut e = entity("e1");
    e.lifetime = Some(Lifetime {
        from: None,
        until: Some(Utc::now()),
    });
    world.push(&ability, vec![e]).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    world.gc_sweep();

    assert!(matches!(
        world.get(&ability, "e1"),
        Err(WorldError::NotFound(_))
    ));
}

#[test]
fn list_is_strictly_sorted_by_id() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let ids = ["zulu", "alpha", "mike", "bravo", "yankee"];
    world
        .push(&ability, ids.iter().map(|id| entity(id)).collect())
        .unwrap();

    let listed: Vec<String> = world
        .list(&ability, None)
        .into_iter()
        .map(|e| e.id)
        .collect();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted);
    assert_eq!(listed.len(), ids.len());
}

#[test]
fn empty_filter_and_empty_or_match_everything() {
    let world = WorldServer::new();
    let ability = Ability::default();
    world
        .push(&ability, vec![entity("a"), entity("b")])
        .unwrap();

    assert_eq!(world.list(&ability, None).len(), 2);
    assert_eq!(
        world
            .list(&ability, Some(&EntityFilter::default()))
            .len(),
        2
    );

    let empty_or = EntityFilter {
        or: vec![],
        ..Default::default()
    };
    assert_eq!(world.list(&ability, Some(&empty_or)).len(), 2);
}

#[test]
fn batch_push_is_all_or_nothing() {
    let world = WorldServer::new();
    let ability = Ability::default();

    let err = world
        .push(&ability, vec![entity("good"), entity("")])
        .unwrap_err();
    assert!(matches!(err, WorldError::InvalidArgument(_)));
    assert!(world.list(&ability, None).is_empty());
}

#[test]
fn frozen_world_keeps_serving_reads() {
    let world = WorldServer::new();
    let ability = Ability::default();

    world.push(&ability, vec![entity("live")]).unwrap();
    world.freeze(Utc::now());

    // Reads still see the pre-freeze head; replayed pushes do not land
    world.push(&ability, vec![entity("replay")]).unwrap();
    assert!(world.get(&ability, "live").is_ok());
    assert!(matches!(
        world.get(&ability, "replay"),
        Err(WorldError::NotFound(_))
    ));

    // The frozen clock keeps soon-to-expire entities alive
    let mut doomed = entity("doomed");
    doomed.lifetime = Some(Lifetime {
        from: None,
        until: Some(Utc::now() + ChronoDuration::milliseconds(500)),
    });
    world.thaw();
    world.push(&ability, vec![doomed]).unwrap();
    world.freeze(Utc::now());
    std::thread::sleep(std::time::Duration::from_millis(600));
    world.gc_sweep();
    assert!(world.get(&ability, "doomed").is_ok());
}
