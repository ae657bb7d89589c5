//! Transient portals summoned by players.
//!
//! A gate has no health. It goes away when its lifetime runs out, when it was
//! used too often, or when its summoner leaves or dies.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::debug;
use npc_shared::{ActorNotification, Point};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::entities::Player;
use crate::error::{ActorError, ObjectId, Result};
use crate::observers::WorldObserver;
use crate::world::GameMap;

pub struct Gate {
    id: ObjectId,
    owner_id: ObjectId,
    owner: Weak<Player>,
    position: Point,
    destination: Point,
    uses: AtomicU32,
    max_uses: u32,
    disposed: AtomicBool,
    lifetime_task: Mutex<Option<JoinHandle<()>>>,
    map: Weak<GameMap>,
}

impl Gate {
    pub(crate) fn new(
        id: ObjectId,
        owner: &Arc<Player>,
        position: Point,
        destination: Point,
        max_uses: u32,
        map: &Arc<GameMap>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            owner_id: owner.id(),
            owner: Arc::downgrade(owner),
            position,
            destination,
            uses: AtomicU32::new(0),
            max_uses,
            disposed: AtomicBool::new(false),
            lifetime_task: Mutex::new(None),
            map: Arc::downgrade(map),
        })
    }

    /// Remove the gate from its map once `lifetime` has elapsed
    pub(crate) fn start_lifetime(self: &Arc<Self>, lifetime: Duration) {
        let gate = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            let Some(gate) = gate.upgrade() else {
                return;
            };
            gate.lifetime_task.lock().take();
            debug!("Gate {} expired", gate.id);
            if let Some(map) = gate.map.upgrade() {
                map.remove_gate(gate.id);
            }
            gate.dispose();
        });
        *self.lifetime_task.lock() = Some(handle);
    }

    /// Travel through the gate to its destination.
    ///
    /// A use is reserved before the player moves, so concurrent entries never
    /// exceed the use limit. A failed move gives its use back.
    pub async fn enter(&self, player: &Arc<Player>) -> Result<()> {
        if self.is_disposed() {
            return Err(ActorError::Disposed(self.id));
        }
        let map = self.map.upgrade().ok_or(ActorError::NotOnMap(self.id))?;

        let uses = self
            .uses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |uses| (uses < self.max_uses).then(|| uses + 1))
            .map(|previous| previous + 1)
            .map_err(|_| ActorError::Disposed(self.id))?;

        if let Err(e) = map.move_player(player.id(), self.destination).await {
            self.uses.fetch_sub(1, Ordering::AcqRel);
            return Err(e);
        }
        player.notify(&ActorNotification::GateEntered {
            gate_id: self.id,
            destination: self.destination,
        });

        if uses >= self.max_uses {
            debug!("Gate {} reached its use limit", self.id);
            map.remove_gate(self.id);
            self.dispose();
        }
        Ok(())
    }

    /// Stop the lifetime timer. Calling this again does nothing.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.lifetime_task.lock().take() {
            task.abort();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn owner_id(&self) -> ObjectId {
        self.owner_id
    }

    pub fn owner(&self) -> Option<Arc<Player>> {
        self.owner.upgrade()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn destination(&self) -> Point {
        self.destination
    }

    pub fn uses(&self) -> u32 {
        self.uses.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("id", &self.id)
            .field("owner", &self.owner_id)
            .field("destination", &self.destination)
            .field("uses", &self.uses())
            .finish()
    }
}
