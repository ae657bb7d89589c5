//! Experience and item drops for killed actors.

use npc_shared::{ActorDefinition, ItemDrop, Point};
use rand::Rng;

use crate::entities::Player;

/// What a kill dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LootDrop {
    pub items: Vec<ItemDrop>,
    pub money: Option<u32>,
}

impl LootDrop {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.money.is_none()
    }
}

/// Experience and drop generation. The formulas belong to the item system.
pub trait LootService: Send + Sync {
    /// Experience the killer gains for `victim`
    fn distribute_experience(&self, victim: &ActorDefinition, killer: &Player) -> u64;

    fn generate_drops(&self, victim: &ActorDefinition, experience: u64, killer: &Player) -> LootDrop;
}

/// Rolls the definition's loot table, capped by its drop count
#[derive(Debug, Clone)]
pub struct DropTableLoot {
    /// Chance that a kill also drops money
    pub money_chance: f64,
}

impl Default for DropTableLoot {
    fn default() -> Self {
        Self { money_chance: 0.3 }
    }
}

impl LootService for DropTableLoot {
    fn distribute_experience(&self, victim: &ActorDefinition, _killer: &Player) -> u64 {
        victim.level as u64 * 10 + victim.max_health as u64 / 10
    }

    fn generate_drops(&self, victim: &ActorDefinition, experience: u64, _killer: &Player) -> LootDrop {
        let mut rng = rand::thread_rng();

        let mut items = Vec::new();
        for entry in &victim.loot_table {
            if items.len() >= victim.drop_count as usize {
                break;
            }
            if rng.gen::<f32>() < entry.drop_chance {
                let quantity = rng.gen_range(entry.min_quantity.min(entry.max_quantity)..=entry.max_quantity);
                items.push(ItemDrop {
                    item_id: entry.item_id,
                    quantity,
                });
            }
        }

        let money = rng
            .gen_bool(self.money_chance.clamp(0.0, 1.0))
            .then(|| (experience / 2).max(1).min(u32::MAX as u64) as u32);

        LootDrop { items, money }
    }
}

/// An item lying on the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedItem {
    pub id: u32,
    pub item: ItemDrop,
    pub position: Point,
}
