//! Server-side entity definitions.

mod attackable;
mod effects;
mod gate;
mod monster;
mod npc;
pub mod player;

pub use effects::{ActiveEffect, EffectList, StatusFlags};
pub use gate::Gate;
pub use npc::NonPlayerCharacter;
pub use player::{Player, PlayerStats};
