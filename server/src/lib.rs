//! Autonomous actor core of the game server.
//!
//! Non-player characters decide on their own schedule whether to search for a
//! target, move or attack, while players and other actors change the world
//! around them.

pub mod ai;
pub mod combat;
pub mod config;
pub mod entities;
pub mod error;
pub mod navigation;
pub mod observers;
pub mod world;

pub use ai::{Intelligence, IntelligenceState, TickScheduler};
pub use combat::{Attackable, Attacker, DamageCalculator, HitReport};
pub use config::CoreConfig;
pub use entities::{Gate, NonPlayerCharacter, Player};
pub use error::{ActorError, LoadError, ObjectId, Result};
pub use observers::{ObserverEdge, ObserverSet, WorldObserver};
pub use world::{GameMap, SpawnTable, WorldData, WorldServices};
