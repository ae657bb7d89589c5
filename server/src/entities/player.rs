//! Server-side player entity.
//!
//! The connection layer owns the real player. What lives here is the part the
//! actor core interacts with: the observer that receives notifications, and
//! the target and attacker in combat.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use log::{info, trace};
use npc_shared::{ActorNotification, HitOutcome, ItemDrop, Point, SkillDefinition};
use parking_lot::Mutex;

use crate::combat::{Attackable, Attacker, DamageApplied, Health, HitReport, TargetKind};
use crate::entities::{ActiveEffect, EffectList, NonPlayerCharacter, StatusFlags};
use crate::error::{ActorError, ObjectId, Result};
use crate::observers::WorldObserver;
use crate::world::GameMap;

/// Combat stats of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStats {
    pub min_damage: u32,
    pub max_damage: u32,
    pub defense: u32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            min_damage: 5,
            max_damage: 10,
            defense: 2,
        }
    }
}

/// Server-side player state
pub struct Player {
    id: ObjectId,
    name: String,
    position: Mutex<Point>,
    health: Health,
    stats: Mutex<PlayerStats>,
    player_kill_level: AtomicU8,
    effects: EffectList,
    experience: AtomicU64,
    money: AtomicU64,
    items: Mutex<Vec<ItemDrop>>,
    /// Remaining arrows or bolts; `None` when the weapon needs none
    ammunition: Mutex<Option<u32>>,
    summon: Mutex<Option<Arc<NonPlayerCharacter>>>,
    inbox: Mutex<Vec<ActorNotification>>,
    map: Mutex<Weak<GameMap>>,
    weak_self: Weak<Player>,
}

impl Player {
    pub fn new(id: ObjectId, name: &str, position: Point, max_health: u32) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            id,
            name: name.to_string(),
            position: Mutex::new(position),
            health: Health::new(max_health),
            stats: Mutex::new(PlayerStats::default()),
            player_kill_level: AtomicU8::new(0),
            effects: EffectList::default(),
            experience: AtomicU64::new(0),
            money: AtomicU64::new(0),
            items: Mutex::new(Vec::new()),
            ammunition: Mutex::new(None),
            summon: Mutex::new(None),
            inbox: Mutex::new(Vec::new()),
            map: Mutex::new(Weak::new()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Point {
        *self.position.lock()
    }

    pub(crate) fn set_position(&self, position: Point) {
        *self.position.lock() = position;
    }

    pub fn health(&self) -> u32 {
        self.health.current()
    }

    pub fn max_health(&self) -> u32 {
        self.health.maximum()
    }

    pub fn is_alive(&self) -> bool {
        !self.health.is_depleted()
    }

    /// Bring a dead player back at full health
    pub fn revive(&self) {
        self.health.reset(self.health.maximum());
        self.effects.clear();
    }

    pub fn stats(&self) -> PlayerStats {
        *self.stats.lock()
    }

    pub fn set_stats(&self, stats: PlayerStats) {
        *self.stats.lock() = stats;
    }

    pub fn player_kill_level(&self) -> u8 {
        self.player_kill_level.load(Ordering::Acquire)
    }

    pub fn set_player_kill_level(&self, level: u8) {
        self.player_kill_level.store(level, Ordering::Release);
    }

    pub fn add_effect(&self, effect: ActiveEffect) {
        self.effects.add(effect);
    }

    pub fn effects(&self) -> &EffectList {
        &self.effects
    }

    pub fn experience(&self) -> u64 {
        self.experience.load(Ordering::Acquire)
    }

    /// Add experience and return the new total
    pub fn add_experience(&self, amount: u64) -> u64 {
        self.experience.fetch_add(amount, Ordering::AcqRel) + amount
    }

    pub fn money(&self) -> u64 {
        self.money.load(Ordering::Acquire)
    }

    pub fn add_money(&self, amount: u32) {
        self.money.fetch_add(amount as u64, Ordering::AcqRel);
    }

    /// Put an item into the inventory, stacking it onto equal items
    pub fn add_item(&self, item: ItemDrop) {
        let mut items = self.items.lock();
        match items.iter_mut().find(|held| held.item_id == item.item_id) {
            Some(held) => held.quantity = held.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
    }

    pub fn items(&self) -> Vec<ItemDrop> {
        self.items.lock().clone()
    }

    pub fn ammunition(&self) -> Option<u32> {
        *self.ammunition.lock()
    }

    pub fn set_ammunition(&self, amount: Option<u32>) {
        *self.ammunition.lock() = amount;
    }

    /// The creature currently summoned by this player
    pub fn summoned(&self) -> Option<Arc<NonPlayerCharacter>> {
        self.summon.lock().clone()
    }

    /// Replace the summoned creature, returning the previous one
    pub(crate) fn set_summon(&self, summon: Option<Arc<NonPlayerCharacter>>) -> Option<Arc<NonPlayerCharacter>> {
        std::mem::replace(&mut *self.summon.lock(), summon)
    }

    /// Forget the summon if it is the given actor
    pub(crate) fn release_summon(&self, id: ObjectId) {
        let mut summon = self.summon.lock();
        if summon.as_ref().map(|s| s.id()) == Some(id) {
            *summon = None;
        }
    }

    pub fn map(&self) -> Option<Arc<GameMap>> {
        self.map.lock().upgrade()
    }

    pub(crate) fn attach_to(&self, map: &Arc<GameMap>) {
        *self.map.lock() = Arc::downgrade(map);
    }

    pub(crate) fn detach(&self) {
        *self.map.lock() = Weak::new();
    }

    /// Everything this player has been notified about so far
    pub fn notifications(&self) -> Vec<ActorNotification> {
        self.inbox.lock().clone()
    }

    pub fn take_notifications(&self) -> Vec<ActorNotification> {
        std::mem::take(&mut *self.inbox.lock())
    }

    /// Count received notifications matching a predicate
    pub fn count_notifications<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ActorNotification) -> bool,
    {
        self.inbox.lock().iter().filter(|n| predicate(n)).count()
    }

    fn take_hit(&self, outcome: &HitOutcome) -> Option<DamageApplied> {
        if outcome.health_damage == 0 {
            return Some(DamageApplied {
                remaining: self.health.current(),
                lethal: false,
            });
        }
        self.health.apply_damage(outcome.health_damage)
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("position", &self.position())
            .field("health", &self.health.current())
            .finish()
    }
}

impl WorldObserver for Player {
    fn observer_id(&self) -> ObjectId {
        self.id
    }

    fn notify(&self, notification: &ActorNotification) {
        trace!("Player {} <- {:?}", self.id, notification);
        self.inbox.lock().push(notification.clone());
    }

    fn as_target(self: Arc<Self>) -> Option<Arc<dyn Attackable>> {
        Some(self)
    }

    fn summon(&self) -> Option<Arc<dyn Attackable>> {
        let summon = self.summon.lock().clone()?;
        summon.is_alive().then(|| summon as Arc<dyn Attackable>)
    }
}

#[async_trait]
impl Attackable for Player {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn position(&self) -> Point {
        Player::position(self)
    }

    fn health(&self) -> u32 {
        self.health.current()
    }

    fn is_alive(&self) -> bool {
        Player::is_alive(self)
    }

    fn is_active(&self) -> bool {
        Player::is_alive(self) && self.map().is_some()
    }

    fn status(&self) -> StatusFlags {
        self.effects.status()
    }

    fn target_kind(&self) -> TargetKind {
        TargetKind::Player {
            player_kill_level: self.player_kill_level(),
        }
    }

    fn defense(&self) -> u32 {
        self.stats.lock().defense
    }

    async fn attack_by(&self, attacker: Arc<dyn Attacker>, skill: Option<&SkillDefinition>) -> Result<Option<HitReport>> {
        if self.health.is_depleted() {
            return Ok(None);
        }
        let map = self.map().ok_or(ActorError::NotOnMap(self.id))?;

        self.effects.clear_status(StatusFlags::ASLEEP);
        let outcome = map.services().damage.calculate_damage(attacker.as_ref(), self, skill, false, 1.0);
        let Some(applied) = self.take_hit(&outcome) else {
            return Ok(None);
        };

        if outcome.has_damage() {
            attacker.after_hit_target(&outcome);
        }
        self.notify(&ActorNotification::ObjectHit {
            target_id: self.id,
            attacker_id: Some(attacker.id()),
            outcome,
            remaining_health: applied.remaining,
        });

        if applied.lethal {
            info!("Player {} was killed by {} ({})", self.name, attacker.name(), attacker.id());
            self.notify(&ActorNotification::ObjectKilled {
                target_id: self.id,
                killer_id: attacker.id(),
                killer_name: attacker.name(),
                skill_number: skill.map(|s| s.number).unwrap_or(0),
            });
            map.on_player_died(self).await;
        }

        Ok(Some(HitReport {
            outcome,
            lethal: applied.lethal,
        }))
    }
}

impl Attacker for Player {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn position(&self) -> Point {
        Player::position(self)
    }

    fn damage_range(&self) -> (u32, u32) {
        let stats = self.stats.lock();
        (stats.min_damage, stats.max_damage)
    }

    /// Every hit uses up one piece of ammunition
    fn after_hit_target(&self, _outcome: &HitOutcome) {
        if let Some(remaining) = self.ammunition.lock().as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    fn credited_player(&self) -> Option<Arc<Player>> {
        self.weak_self.upgrade()
    }

    fn as_target(self: Arc<Self>) -> Option<Arc<dyn Attackable>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ammunition_consumed_per_hit() {
        let player = Player::new(1, "Archer", Point::new(3, 3), 100);
        player.set_ammunition(Some(2));

        let outcome = HitOutcome::new(10, 0, Default::default());
        player.after_hit_target(&outcome);
        player.after_hit_target(&outcome);
        player.after_hit_target(&outcome);
        assert_eq!(player.ammunition(), Some(0));
    }

    #[test]
    fn test_observer_records_notifications() {
        let player = Player::new(2, "Watcher", Point::new(0, 0), 50);
        player.notify(&ActorNotification::ObjectDisappeared { id: 10001 });
        player.notify(&ActorNotification::ObjectDisappeared { id: 10002 });

        let count = player.count_notifications(|n| matches!(n, ActorNotification::ObjectDisappeared { .. }));
        assert_eq!(count, 2);
        assert_eq!(player.take_notifications().len(), 2);
        assert!(player.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_attack_requires_map() {
        let victim = Player::new(3, "Lost", Point::new(1, 1), 50);
        let attacker: Arc<dyn Attacker> = Player::new(4, "Bully", Point::new(1, 2), 50);

        let result = victim.attack_by(attacker, None).await;
        assert!(matches!(result, Err(ActorError::NotOnMap(3))));
        assert_eq!(victim.health(), 50);
    }
}
