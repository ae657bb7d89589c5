//! Notifications delivered to world observers.
//!
//! These are the events a connection layer would translate into packets. How
//! they are encoded on the wire is not decided here.

use serde::{Deserialize, Serialize};

use crate::combat::{HitOutcome, ItemDrop};
use crate::geometry::{Direction, Point};

/// Something an observer can perceive about an actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorNotification {
    /// An actor came into view
    ObjectAppeared {
        id: u16,
        definition: u16,
        position: Point,
        rotation: Direction,
        health: u32,
    },
    /// An actor left the view or was removed from the map
    ObjectDisappeared {
        id: u16,
    },
    ObjectMoved {
        id: u16,
        position: Point,
        rotation: Direction,
        walking: bool,
    },
    /// Attack animation of `attacker_id`
    ObjectAttacked {
        attacker_id: u16,
        target_id: u16,
        skill_number: u16,
        rotation: Direction,
    },
    ObjectHit {
        target_id: u16,
        /// `None` for damage without an attacker (poison, reflection)
        attacker_id: Option<u16>,
        outcome: HitOutcome,
        remaining_health: u32,
    },
    ObjectKilled {
        target_id: u16,
        killer_id: u16,
        killer_name: String,
        skill_number: u16,
    },
    ExperienceGained {
        victim_id: u16,
        amount: u64,
    },
    ItemsDropped {
        position: Point,
        items: Vec<ItemDrop>,
        money: Option<u32>,
    },
    /// A dropped item was picked up or lay around too long
    ItemRemoved {
        item_id: u32,
        position: Point,
    },
    /// A gate was used to travel to its destination
    GateEntered {
        gate_id: u16,
        destination: Point,
    },
}
