//! Which map events and waves are currently running.

use std::collections::HashMap;

use log::info;
use parking_lot::RwLock;

/// Read access to world event state, consulted when deciding respawns
pub trait EventStateProvider: Send + Sync {
    fn is_event_running(&self, map_id: u16) -> bool;
    fn is_wave_running(&self, map_id: u16, wave: u8) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
struct MapEventStatus {
    event_running: bool,
    wave: Option<u8>,
}

/// Event state that can be changed at runtime
#[derive(Debug, Default)]
pub struct WorldEventState {
    maps: RwLock<HashMap<u16, MapEventStatus>>,
}

impl WorldEventState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_event(&self, map_id: u16) {
        self.maps.write().entry(map_id).or_default().event_running = true;
        info!("Event started on map {}", map_id);
    }

    /// Stop the event and any wave of it
    pub fn stop_event(&self, map_id: u16) {
        if let Some(status) = self.maps.write().get_mut(&map_id) {
            *status = MapEventStatus::default();
        }
        info!("Event stopped on map {}", map_id);
    }

    pub fn start_wave(&self, map_id: u16, wave: u8) {
        let mut maps = self.maps.write();
        let status = maps.entry(map_id).or_default();
        status.event_running = true;
        status.wave = Some(wave);
        info!("Wave {} started on map {}", wave, map_id);
    }

    pub fn end_wave(&self, map_id: u16) {
        if let Some(status) = self.maps.write().get_mut(&map_id) {
            status.wave = None;
        }
    }

    pub fn current_wave(&self, map_id: u16) -> Option<u8> {
        self.maps.read().get(&map_id).and_then(|status| status.wave)
    }
}

impl EventStateProvider for WorldEventState {
    fn is_event_running(&self, map_id: u16) -> bool {
        self.maps.read().get(&map_id).map_or(false, |status| status.event_running)
    }

    fn is_wave_running(&self, map_id: u16, wave: u8) -> bool {
        self.current_wave(map_id) == Some(wave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_and_wave_state() {
        let state = WorldEventState::new();
        assert!(!state.is_event_running(1));

        state.start_event(1);
        assert!(state.is_event_running(1));
        assert!(!state.is_event_running(2));
        assert!(!state.is_wave_running(1, 0));

        state.start_wave(1, 2);
        assert!(state.is_wave_running(1, 2));
        assert!(!state.is_wave_running(1, 3));

        state.end_wave(1);
        assert!(!state.is_wave_running(1, 2));
        assert!(state.is_event_running(1));

        state.start_wave(1, 1);
        state.stop_event(1);
        assert!(!state.is_event_running(1));
        assert!(!state.is_wave_running(1, 1));
    }
}
