//! Runtime configuration of the actor core.
//!
//! Loaded from a JSON file. Every field is optional; missing fields and a
//! missing file fall back to the defaults below.

use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Players within this many tiles of an actor observe it
    pub view_radius: u8,
    /// Upper bound of the random delay before an intelligence's first tick
    pub max_tick_offset_ms: u64,
    /// Delay between a death and its experience/loot distribution, so the
    /// death animation can play first
    pub loot_drop_delay_ms: u64,
    /// Attempts to find a valid spawn point before giving up
    pub spawn_retry_limit: u32,
    /// Chance per idle tick that a watched monster wanders around
    pub random_walk_chance: f64,
    /// Guards attack players whose player-kill level is above this
    pub guard_player_kill_threshold: u8,
    /// Summons walk back to their owner when farther away than this
    pub summon_follow_distance: u8,
    /// Summons appear within this radius around their owner
    pub summon_spawn_radius: u8,
    pub pathfinding_max_iterations: usize,
    pub gate_lifetime_secs: u64,
    pub gate_max_uses: u32,
    /// Dropped items nobody picked up vanish after this long
    pub drop_lifetime_secs: u64,
    /// Tiles a soccer ball travels when kicked
    pub soccer_ball_push_distance: u8,
    /// How long the demo binary runs
    pub demo_duration_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            view_radius: 15,
            max_tick_offset_ms: 1000,
            loot_drop_delay_ms: 1000,
            spawn_retry_limit: 100,
            random_walk_chance: 0.1,
            guard_player_kill_threshold: 4,
            summon_follow_distance: 3,
            summon_spawn_radius: 2,
            pathfinding_max_iterations: 500,
            gate_lifetime_secs: 30,
            gate_max_uses: 10,
            drop_lifetime_secs: 60,
            soccer_ball_push_distance: 3,
            demo_duration_secs: 20,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: CoreConfig = serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate(path)?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No configuration at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn validate(&self, path: &Path) -> Result<(), LoadError> {
        if !(0.0..=1.0).contains(&self.random_walk_chance) {
            return Err(LoadError::Invalid {
                path: path.display().to_string(),
                reason: format!("random_walk_chance {} is not a probability", self.random_walk_chance),
            });
        }
        if self.spawn_retry_limit == 0 {
            return Err(LoadError::Invalid {
                path: path.display().to_string(),
                reason: "spawn_retry_limit must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn loot_drop_delay(&self) -> Duration {
        Duration::from_millis(self.loot_drop_delay_ms)
    }

    pub fn gate_lifetime(&self) -> Duration {
        Duration::from_secs(self.gate_lifetime_secs)
    }

    pub fn drop_lifetime(&self) -> Duration {
        Duration::from_secs(self.drop_lifetime_secs)
    }
}
