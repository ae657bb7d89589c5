//! End-to-end scenarios on a small map: decisions, combat, death, respawn,
//! summons, gates and loot.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use npc_shared::{ActorNotification, DamageFlags, Direction, HitOutcome, IntelligenceKind, ObjectKind, Point, SpawnTrigger};

use npc_server::ai::{MovementPolicy, NearestTarget, Roaming, TickContext};
use npc_server::combat::{Attackable, Attacker};
use npc_server::entities::{ActiveEffect, Player, StatusFlags};
use npc_server::world::GridTerrain;
use npc_server::{ActorError, Intelligence, IntelligenceState, TickScheduler, WorldObserver};

use common::*;

#[tokio::test]
async fn test_monster_attacks_adjacent_player() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 7, 1), Point::new(10, 10), Direction::West).await;
    let player = join_player(&world.map, 1, Point::new(11, 10)).await;

    let intelligence = monster.intelligence().unwrap();
    assert!(intelligence.is_observed());

    intelligence.tick().await.unwrap();
    assert_eq!(player.health(), 93);
    intelligence.tick().await.unwrap();
    assert_eq!(player.health(), 86);

    assert_eq!(intelligence.current_target_id(), Some(1));
    assert_eq!(intelligence.state(), IntelligenceState::Attacking);
    assert_eq!(monster.rotation(), Direction::East);
}

#[tokio::test]
async fn test_unobserved_monster_does_nothing() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 7, 1), Point::new(10, 10), Direction::West).await;
    let player = join_player(&world.map, 1, Point::new(11, 10)).await;
    world.map.move_player(1, Point::new(30, 30)).await.unwrap();

    let intelligence = monster.intelligence().unwrap();
    assert!(!intelligence.is_observed());
    intelligence.tick().await.unwrap();
    assert_eq!(player.health(), 100);
    assert!(intelligence.current_target().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_hits_kill_once() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 5, 0, 1), Point::new(10, 10), Direction::West).await;
    let strong = join_player(&world.map, 1, Point::new(11, 10)).await;
    let weak = join_player(&world.map, 2, Point::new(9, 10)).await;
    let watcher = join_player(&world.map, 3, Point::new(12, 12)).await;
    hitting_for(&strong, 5);
    hitting_for(&weak, 3);

    let attacks = (0..8).map(|i| {
        let attacker: Arc<dyn Attacker> = if i % 2 == 0 { strong.clone() } else { weak.clone() };
        let monster = monster.clone();
        tokio::spawn(async move { monster.attack_by(attacker, None).await })
    });
    let results = futures::future::join_all(attacks).await;

    let lethal = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(|result| matches!(result, Ok(Some(report)) if report.lethal))
        .count();
    assert_eq!(lethal, 1);
    assert_eq!(monster.health(), 0);
    assert!(!monster.is_alive());
    assert_eq!(
        watcher.count_notifications(|n| matches!(n, ActorNotification::ObjectKilled { .. })),
        1
    );
}

#[tokio::test]
async fn test_pressure_trap_fires_on_its_tile() {
    let world = open_world();
    let trap = spawn_still(&world.map, trap_definition(3, IntelligenceKind::TrapPressure, 10, 0), Point::new(5, 5), Direction::South).await;
    let player = join_player(&world.map, 1, Point::new(5, 6)).await;
    let intelligence = trap.intelligence().unwrap();

    intelligence.tick().await.unwrap();
    assert_eq!(player.health(), 100);

    world.map.move_player(1, Point::new(5, 5)).await.unwrap();
    intelligence.tick().await.unwrap();
    assert_eq!(player.health(), 90);

    // Traps never hold on to a target
    world.map.move_player(1, Point::new(5, 6)).await.unwrap();
    intelligence.tick().await.unwrap();
    assert_eq!(player.health(), 90);
    assert!(intelligence.current_target().is_none());
}

#[tokio::test]
async fn test_directional_trap_hits_everyone_in_front() {
    let world = open_world();
    let trap = spawn_still(&world.map, trap_definition(4, IntelligenceKind::TrapDirectionalArea, 10, 3), Point::new(5, 5), Direction::East).await;
    let near = join_player(&world.map, 1, Point::new(6, 5)).await;
    let far = join_player(&world.map, 2, Point::new(7, 5)).await;
    let beside = join_player(&world.map, 3, Point::new(5, 7)).await;
    let out_of_range = join_player(&world.map, 4, Point::new(9, 5)).await;

    assert_eq!(trap.rotation(), Direction::East);
    trap.intelligence().unwrap().tick().await.unwrap();

    assert_eq!(near.health(), 90);
    assert_eq!(far.health(), 90);
    assert_eq!(beside.health(), 100);
    assert_eq!(out_of_range.health(), 100);
}

#[tokio::test]
async fn test_target_switches_when_current_becomes_invalid() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 5, 3), Point::new(10, 10), Direction::West).await;
    let first = join_player(&world.map, 1, Point::new(11, 10)).await;
    let second = join_player(&world.map, 2, Point::new(12, 10)).await;
    let intelligence = monster.intelligence().unwrap();

    intelligence.tick().await.unwrap();
    assert_eq!(intelligence.current_target_id(), Some(1));
    assert_eq!(first.health(), 95);

    first.add_effect(ActiveEffect::permanent("Invisibility", StatusFlags::INVISIBLE));
    intelligence.tick().await.unwrap();
    assert_eq!(intelligence.current_target_id(), Some(2));
    assert_eq!(first.health(), 95);
    assert_eq!(second.health(), 95);

    world.map.remove_player(2).await.unwrap();
    intelligence.tick().await.unwrap();
    assert!(intelligence.current_target().is_none());
    assert_eq!(intelligence.state(), IntelligenceState::Idle);
    assert_eq!(first.health(), 95);
}

#[tokio::test]
async fn test_safe_zone_protects_players() {
    let mut terrain = GridTerrain::open(32, 32);
    terrain.mark_safe_zone(Point::new(11, 10), Point::new(11, 10));
    terrain.mark_safe_zone(Point::new(6, 20), Point::new(6, 20));
    terrain.mark_safe_zone(Point::new(21, 10), Point::new(21, 10));
    terrain.mark_safe_zone(Point::new(27, 25), Point::new(27, 25));
    terrain.mark_safe_zone(Point::new(15, 28), Point::new(15, 28));
    let world = test_world(terrain);

    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 5, 1), Point::new(10, 10), Direction::West).await;
    let trap = spawn_still(&world.map, trap_definition(4, IntelligenceKind::TrapDirectionalArea, 10, 3), Point::new(5, 20), Direction::East).await;
    let guard = spawn_still(&world.map, definition(2, ObjectKind::Guard, 500, 20, 1), Point::new(20, 10), Direction::East).await;
    let sheltered = join_player(&world.map, 1, Point::new(11, 10)).await;
    let also_sheltered = join_player(&world.map, 2, Point::new(6, 20)).await;
    let outlaw = join_player(&world.map, 3, Point::new(21, 10)).await;
    outlaw.set_player_kill_level(5);

    monster.intelligence().unwrap().tick().await.unwrap();
    trap.intelligence().unwrap().tick().await.unwrap();
    guard.intelligence().unwrap().tick().await.unwrap();

    assert_eq!(sheltered.health(), 100);
    assert_eq!(also_sheltered.health(), 100);
    assert_eq!(outlaw.health(), 100);
    assert!(monster.intelligence().unwrap().current_target().is_none());
    assert!(guard.intelligence().unwrap().current_target().is_none());

    let owner = join_player(&world.map, 4, Point::new(25, 25)).await;
    let wolf = world
        .map
        .summon_monster(&owner, definition(7, ObjectKind::Monster, 100, 4, 6))
        .await
        .unwrap();
    let wolf_intelligence = wolf.intelligence().unwrap();
    wolf_intelligence.pause();
    let goblin = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 0, 1), Point::new(28, 25), Direction::West).await;
    goblin.move_to(Point::new(27, 25)).await.unwrap();

    wolf_intelligence.tick().await.unwrap();
    assert!(wolf_intelligence.current_target().is_none());
    assert_eq!(goblin.health(), 50);

    let spikes = trap_definition(3, IntelligenceKind::TrapPressure, 10, 0);
    let on_safe_tile = point_area(99, &spikes, Point::new(15, 28), Direction::South, SpawnTrigger::Manual);
    assert!(matches!(
        world.map.spawn_npc(spikes, on_safe_tile).await,
        Err(ActorError::NoSpawnPoint { area: 99, .. })
    ));
}

#[tokio::test]
async fn test_guard_only_hunts_player_killers() {
    let world = open_world();
    let guard = spawn_still(&world.map, definition(2, ObjectKind::Guard, 500, 20, 1), Point::new(10, 10), Direction::West).await;
    let citizen = join_player(&world.map, 1, Point::new(11, 10)).await;
    let outlaw = join_player(&world.map, 2, Point::new(9, 10)).await;
    outlaw.set_player_kill_level(5);

    let intelligence = guard.intelligence().unwrap();
    intelligence.tick().await.unwrap();

    assert_eq!(intelligence.current_target_id(), Some(2));
    assert_eq!(outlaw.health(), 80);
    assert_eq!(citizen.health(), 100);
}

#[tokio::test]
async fn test_summon_ignores_owner_and_attacks_monsters() {
    let world = open_world();
    let owner = join_player(&world.map, 1, Point::new(10, 10)).await;
    let wolf = world
        .map
        .summon_monster(&owner, definition(7, ObjectKind::Monster, 100, 4, 6))
        .await
        .unwrap();
    let intelligence = wolf.intelligence().unwrap();
    intelligence.pause();
    assert!(wolf.is_summoned());
    assert_eq!(owner.summoned().map(|s| s.id()), Some(wolf.id()));

    let owner_as_attacker: Arc<dyn Attacker> = owner.clone();
    let report = wolf.attack_by(owner_as_attacker, None).await.unwrap();
    assert!(report.is_some());
    assert!(intelligence.current_target().is_none());

    intelligence.tick().await.unwrap();
    assert!(intelligence.current_target().is_none());
    assert_eq!(owner.health(), 100);

    let goblin = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 0, 1), Point::new(12, 10), Direction::West).await;
    intelligence.tick().await.unwrap();
    assert_eq!(intelligence.current_target_id(), Some(goblin.id()));
    assert_eq!(goblin.health(), 46);
}

#[tokio::test]
async fn test_summon_removed_with_owner() {
    let world = open_world();
    let owner = join_player(&world.map, 1, Point::new(10, 10)).await;
    let wolf = world
        .map
        .summon_monster(&owner, definition(7, ObjectKind::Monster, 100, 4, 1))
        .await
        .unwrap();

    world.map.remove_player(1).await.unwrap();
    assert!(wolf.is_disposed());
    assert!(world.map.npc(wolf.id()).is_none());
    assert!(owner.summoned().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_event_monsters_respawn_only_during_event() {
    let world = open_world();
    let invader = definition(8, ObjectKind::Monster, 20, 0, 1);
    let area = point_area(70, &invader, Point::new(10, 10), Direction::West, SpawnTrigger::AutomaticDuringEvent);

    let first = world.map.spawn_npc(invader.clone(), area.clone()).await.unwrap();
    first.intelligence().unwrap().pause();
    let player = join_player(&world.map, 1, Point::new(11, 10)).await;
    hitting_for(&player, 50);
    let attacker: Arc<dyn Attacker> = player.clone();

    let report = first.attack_by(attacker.clone(), None).await.unwrap().unwrap();
    assert!(report.lethal);
    assert!(first.is_disposed());
    assert!(world.map.npc(first.id()).is_none());

    world.events.start_event(0);
    let second = world.map.spawn_npc(invader, area).await.unwrap();
    second.intelligence().unwrap().pause();
    second.attack_by(attacker, None).await.unwrap();
    assert!(!second.is_alive());
    assert!(second.is_respawn_pending());
    assert!(world.map.npc(second.id()).is_some());
    assert!(second.death_information().is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(second.is_alive());
    assert_eq!(second.health(), 20);
    assert!(!second.is_respawn_pending());
    assert!(second.death_information().is_none());
    assert!(second.observers().contains(1).await);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_pending_respawn() {
    let world = open_world();
    let goblin = definition(1, ObjectKind::Monster, 10, 0, 1);
    let area = point_area(10, &goblin, Point::new(10, 10), Direction::West, SpawnTrigger::Automatic);
    let npc = world.map.spawn_npc(goblin, area).await.unwrap();
    npc.intelligence().unwrap().pause();
    let player = join_player(&world.map, 1, Point::new(11, 10)).await;
    hitting_for(&player, 50);

    npc.attack_by(player.clone(), None).await.unwrap();
    assert!(npc.is_respawn_pending());

    world.map.remove_npc(npc.id()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!npc.is_alive());
    assert!(npc.is_disposed());
}

#[tokio::test(start_paused = true)]
async fn test_gate_lifecycle() {
    let world = open_world();
    let owner = join_player(&world.map, 1, Point::new(10, 10)).await;

    let gate = world.map.create_gate(&owner, Point::new(10, 11), Point::new(20, 20)).unwrap();
    gate.enter(&owner).await.unwrap();
    assert_eq!(owner.position(), Point::new(20, 20));
    assert_eq!(
        owner.count_notifications(|n| matches!(n, ActorNotification::GateEntered { .. })),
        1
    );
    assert!(world.map.gate(gate.id()).is_some());

    gate.enter(&owner).await.unwrap();
    assert!(world.map.gate(gate.id()).is_none());
    assert!(gate.is_disposed());
    assert!(matches!(gate.enter(&owner).await, Err(ActorError::Disposed(_))));

    let expiring = world.map.create_gate(&owner, Point::new(20, 21), Point::new(5, 5)).unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(world.map.gate(expiring.id()).is_none());
    assert!(expiring.is_disposed());

    let abandoned = world.map.create_gate(&owner, Point::new(20, 21), Point::new(5, 5)).unwrap();
    world.map.remove_player(1).await.unwrap();
    assert!(world.map.gate(abandoned.id()).is_none());
    assert!(abandoned.is_disposed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gate_entries_never_exceed_use_limit() {
    let world = open_world();
    let owner = join_player(&world.map, 1, Point::new(10, 10)).await;
    let mut travellers = Vec::new();
    for id in 2..10u16 {
        travellers.push(join_player(&world.map, id, Point::new(id as u8, 12)).await);
    }
    let gate = world.map.create_gate(&owner, Point::new(10, 11), Point::new(20, 20)).unwrap();

    let entries = travellers.iter().map(|traveller| {
        let gate = gate.clone();
        let traveller = traveller.clone();
        tokio::spawn(async move { gate.enter(&traveller).await.is_ok() })
    });
    let entered = futures::future::join_all(entries)
        .await
        .into_iter()
        .map(|entered| entered.unwrap())
        .filter(|entered| *entered)
        .count();

    assert_eq!(entered, 2);
    assert_eq!(gate.uses(), 2);
    assert!(gate.is_disposed());
    assert_eq!(travellers.iter().filter(|t| t.position() == Point::new(20, 20)).count(), 2);
}

#[tokio::test]
async fn test_soccer_ball_rolls_away() {
    let world = open_world();
    let ball = spawn_still(&world.map, definition(6, ObjectKind::SoccerBall, 20, 0, 0), Point::new(10, 10), Direction::West).await;
    let kicker = join_player(&world.map, 1, Point::new(9, 10)).await;

    let result = ball.attack_by(kicker, None).await.unwrap();
    assert!(result.is_none());
    assert_eq!(ball.position(), Point::new(13, 10));
    assert_eq!(ball.health(), 20);
}

#[tokio::test]
async fn test_poison_damage_without_attacker() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 0, 1), Point::new(10, 10), Direction::West).await;
    let watcher = join_player(&world.map, 1, Point::new(12, 10)).await;

    let report = monster
        .receive_effect_damage(HitOutcome::tagged(4, DamageFlags::POISON), None)
        .await
        .unwrap()
        .unwrap();
    assert!(!report.lethal);
    assert_eq!(monster.health(), 46);
    assert!(monster.intelligence().unwrap().current_target().is_none());

    let hits = watcher.count_notifications(|n| {
        matches!(n, ActorNotification::ObjectHit { attacker_id: None, remaining_health: 46, .. })
    });
    assert_eq!(hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_killer_receives_loot_after_delay() {
    let world = open_world();
    let kills = Arc::new(CountingKills::default());
    world.map.add_kill_listener(kills.clone());

    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 5, 0, 1), Point::new(10, 10), Direction::West).await;
    let killer = join_player(&world.map, 1, Point::new(11, 10)).await;

    let report = monster.attack_by(killer.clone(), None).await.unwrap().unwrap();
    assert!(report.lethal);
    assert_eq!(kills.kills.load(Ordering::SeqCst), 1);
    assert_eq!(killer.experience(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(killer.experience(), 50);
    assert_eq!(world.map.drops().len(), 1);
    assert_eq!(world.map.drops()[0].position, Point::new(10, 10));
    assert_eq!(
        killer.count_notifications(|n| matches!(n, ActorNotification::ExperienceGained { amount: 50, .. })),
        1
    );
    assert_eq!(
        killer.count_notifications(|n| matches!(n, ActorNotification::ItemsDropped { .. })),
        1
    );
}

/// Kill a one-hit monster at (10, 10) and wait for its drop
async fn kill_for_drop(world: &TestWorld, killer: &Arc<Player>) -> u32 {
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 5, 0, 1), Point::new(10, 10), Direction::West).await;
    monster.attack_by(killer.clone(), None).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let drops = world.map.drops();
    assert_eq!(drops.len(), 1);
    drops[0].id
}

#[tokio::test(start_paused = true)]
async fn test_dropped_item_picked_up_once() {
    let world = open_world();
    let killer = join_player(&world.map, 1, Point::new(11, 10)).await;
    let bystander = join_player(&world.map, 2, Point::new(20, 20)).await;
    let item_id = kill_for_drop(&world, &killer).await;

    assert!(matches!(
        world.map.pick_up(item_id, &bystander),
        Err(ActorError::ItemOutOfReach { player: 2, .. })
    ));
    let picked = world.map.pick_up(item_id, &killer).unwrap();
    assert_eq!(picked.item.item_id, 42);
    assert_eq!(killer.items(), vec![picked.item.clone()]);
    assert!(world.map.drops().is_empty());
    assert!(matches!(world.map.pick_up(item_id, &killer), Err(ActorError::UnknownItem(id)) if id == item_id));
    assert_eq!(
        bystander.count_notifications(|n| matches!(n, ActorNotification::ItemRemoved { item_id: id, .. } if *id == item_id)),
        1
    );

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(killer.items().len(), 1);
    assert_eq!(
        bystander.count_notifications(|n| matches!(n, ActorNotification::ItemRemoved { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropped_items_expire() {
    let world = open_world();
    let killer = join_player(&world.map, 1, Point::new(11, 10)).await;
    let item_id = kill_for_drop(&world, &killer).await;

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(world.map.drops().len(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(world.map.drops().is_empty());
    assert!(killer.items().is_empty());
    assert!(matches!(world.map.pick_up(item_id, &killer), Err(ActorError::UnknownItem(_))));
    assert_eq!(
        killer.count_notifications(|n| matches!(n, ActorNotification::ItemRemoved { item_id: id, .. } if *id == item_id)),
        1
    );
}

#[tokio::test]
async fn test_unsupported_operations() {
    let world = open_world();
    let spikes = spawn_still(&world.map, trap_definition(3, IntelligenceKind::TrapPressure, 10, 0), Point::new(5, 5), Direction::South).await;
    let guard = spawn_still(&world.map, definition(2, ObjectKind::Guard, 500, 20, 1), Point::new(15, 15), Direction::West).await;
    let player = join_player(&world.map, 1, Point::new(6, 5)).await;

    let result = spikes.attack_by(player.clone(), None).await;
    assert!(matches!(result, Err(ActorError::NotSupported { kind: ObjectKind::Trap, .. })));
    let result = guard.attack_by(player.clone(), None).await;
    assert!(matches!(result, Err(ActorError::Unattackable(_))));
    assert_eq!(guard.health(), 500);

    let result = spikes.move_to(Point::new(6, 6)).await;
    assert!(matches!(result, Err(ActorError::NotSupported { .. })));
    assert_eq!(spikes.position(), Point::new(5, 5));
}

#[tokio::test]
async fn test_unbound_intelligence() {
    let intelligence = Intelligence::new(Box::new(NearestTarget), Box::new(Roaming), Arc::new(TickScheduler::new()), 0);

    assert_eq!(intelligence.state(), IntelligenceState::Unbound);
    assert!(matches!(intelligence.tick().await, Err(ActorError::Uninitialized)));
    assert!(matches!(intelligence.start(), Err(ActorError::Uninitialized)));
    intelligence.pause();
    assert!(!intelligence.is_running());
}

#[tokio::test]
async fn test_intelligence_binds_once() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 5, 1), Point::new(10, 10), Direction::West).await;
    let intelligence = monster.intelligence().unwrap();

    assert!(intelligence.is_bound());
    assert!(matches!(intelligence.bind(&monster), Err(ActorError::AlreadyBound(_))));
}

#[tokio::test]
async fn test_disposed_actor_stops_its_schedule() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 5, 1), Point::new(10, 10), Direction::West).await;
    let intelligence = monster.intelligence().unwrap();

    world.map.remove_npc(monster.id()).await.unwrap();
    assert!(intelligence.tick_guarded().await.is_break());
    assert_eq!(intelligence.state(), IntelligenceState::Disposed);
    assert!(matches!(intelligence.start(), Err(ActorError::Disposed(_))));
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_ticks_stop_on_shutdown() {
    let world = open_world();
    let monster = world
        .map
        .spawn_npc(
            definition(1, ObjectKind::Monster, 50, 5, 1),
            point_area(1, &definition(1, ObjectKind::Monster, 50, 5, 1), Point::new(10, 10), Direction::West, SpawnTrigger::Manual),
        )
        .await
        .unwrap();
    let player = join_player(&world.map, 1, Point::new(11, 10)).await;
    assert!(monster.intelligence().unwrap().is_running());

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(player.health() < 100);

    world.map.shutdown().await;
    assert!(monster.is_disposed());
    assert!(world.map.services().scheduler.is_empty());
    assert!(matches!(
        world.map.spawn_npc(definition(1, ObjectKind::Monster, 50, 5, 1), monster.spawn_area().clone()).await,
        Err(ActorError::NotOnMap(_))
    ));

    let health = player.health();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(player.health(), health);
}

/// 32x32 open map with the tile at (13, 10) walled in on every side
fn walled_in_target_terrain() -> GridTerrain {
    let mut rows = vec![".".repeat(32); 32];
    for (x, y) in [(12, 9), (13, 9), (14, 9), (12, 10), (14, 10), (12, 11), (13, 11), (14, 11)] {
        rows[y].replace_range(x..x + 1, "#");
    }
    GridTerrain::from_rows(&rows)
}

#[tokio::test]
async fn test_unreachable_target_falls_back_to_random_walk() {
    let world = test_world(walled_in_target_terrain());
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 5, 1), Point::new(10, 10), Direction::West).await;
    let player = join_player(&world.map, 1, Point::new(13, 10)).await;
    let intelligence = monster.intelligence().unwrap();
    assert_eq!(world.map.config().random_walk_chance, 0.0);

    intelligence.tick().await.unwrap();

    assert_eq!(intelligence.current_target_id(), Some(1));
    assert_eq!(intelligence.state(), IntelligenceState::Moving);
    assert!(monster.is_walking());
    assert_eq!(player.health(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_observed_flag_follows_observer_churn() {
    let world = open_world();
    let monster = spawn_still(&world.map, definition(1, ObjectKind::Monster, 50, 5, 1), Point::new(10, 10), Direction::West).await;
    let intelligence = monster.intelligence().unwrap();
    let watchers: Vec<Arc<Player>> = (1..=4).map(|id| Player::new(id, "Watcher", Point::new(20, 20), 100)).collect();

    let mut tasks = Vec::new();
    for watcher in watchers {
        let monster = monster.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..300u32 {
                let observer: Arc<dyn WorldObserver> = watcher.clone();
                monster.add_observer(observer).await;
                if round % 5 != 4 {
                    monster.remove_observer(watcher.id()).await;
                }
                tokio::task::yield_now().await;
            }
            monster.remove_observer(watcher.id()).await;
            if watcher.id() % 2 == 0 {
                monster.add_observer(watcher.clone()).await;
            }
        }));
    }
    for task in futures::future::join_all(tasks).await {
        task.unwrap();
    }

    assert_eq!(monster.observers().len().await, 2);
    assert!(intelligence.is_observed());
    monster.remove_observer(2).await;
    assert!(intelligence.is_observed());
    monster.remove_observer(4).await;
    assert!(!intelligence.is_observed());
}

/// Fails on its first call, panics on its second, then lets the tick go on
struct FaultyMovement {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl MovementPolicy for FaultyMovement {
    async fn can_act(&self, cx: &TickContext<'_>) -> npc_server::Result<bool> {
        match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Err(ActorError::NotOnMap(cx.npc.id())),
            1 => panic!("movement blew up"),
            _ => Ok(false),
        }
    }

    async fn approach(&self, _cx: &TickContext<'_>, _target: &Arc<dyn Attackable>) -> npc_server::Result<bool> {
        Ok(false)
    }

    async fn wander(&self, _cx: &TickContext<'_>) -> npc_server::Result<bool> {
        Ok(false)
    }
}

#[tokio::test(start_paused = true)]
async fn test_failing_ticks_keep_the_schedule_alive() {
    let world = open_world();
    let barrel = spawn_still(&world.map, definition(9, ObjectKind::Destructible, 30, 0, 0), Point::new(10, 10), Direction::West).await;
    assert!(barrel.intelligence().is_none());

    let calls = Arc::new(AtomicU32::new(0));
    let intelligence = Intelligence::new(
        Box::new(NearestTarget),
        Box::new(FaultyMovement { calls: calls.clone() }),
        world.map.services().scheduler.clone(),
        0,
    );
    intelligence.bind(&barrel).unwrap();
    intelligence.set_observed(true);

    assert!(intelligence.tick_guarded().await.is_continue());
    assert!(intelligence.tick_guarded().await.is_continue());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    intelligence.start().unwrap();
    tokio::time::sleep(Duration::from_millis(550)).await;

    assert!(intelligence.is_running());
    assert!(calls.load(Ordering::SeqCst) >= 5);
    intelligence.dispose();
    assert!(!intelligence.is_running());
}
