//! Observer sets: who can currently see an actor.
//!
//! Membership drives both visibility (who receives notifications) and
//! targetability (intelligences only pick targets among observers). The set is
//! read on every tick while connection churn adds and removes observers, so
//! every iteration happens on a copy taken under the read lock.

use std::sync::Arc;

use npc_shared::ActorNotification;
use tokio::sync::RwLock;

use crate::combat::Attackable;
use crate::error::ObjectId;

/// An entity that perceives actors, typically a player connection.
///
/// Observer sets hold back-references only; they never control the
/// observer's lifetime.
pub trait WorldObserver: Send + Sync {
    fn observer_id(&self) -> ObjectId;

    /// Deliver a notification. Must not block.
    fn notify(&self, notification: &ActorNotification);

    /// The observer as an attack target, if it can be attacked
    fn as_target(self: Arc<Self>) -> Option<Arc<dyn Attackable>> {
        None
    }

    /// A summoned creature owned by this observer, which is targetable too
    fn summon(&self) -> Option<Arc<dyn Attackable>> {
        None
    }
}

/// Result of a membership change. The `First`/`Last` edges let the owner start
/// or stop work that is only worth doing while someone is watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverEdge {
    Unchanged,
    Added,
    FirstAdded,
    Removed,
    LastRemoved,
}

impl ObserverEdge {
    pub fn changed(&self) -> bool {
        !matches!(self, ObserverEdge::Unchanged)
    }
}

/// Concurrency-guarded set of observers with copy-on-read iteration
#[derive(Default)]
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn WorldObserver>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, observer: Arc<dyn WorldObserver>) -> ObserverEdge {
        self.add_with(observer, |_| {}).await
    }

    /// Add an observer and run `on_edge` with the resulting edge before the
    /// write lock is released, so edge reactions apply in membership order.
    pub async fn add_with<F>(&self, observer: Arc<dyn WorldObserver>, on_edge: F) -> ObserverEdge
    where
        F: FnOnce(ObserverEdge),
    {
        let mut observers = self.observers.write().await;
        let id = observer.observer_id();
        let edge = if observers.iter().any(|o| o.observer_id() == id) {
            ObserverEdge::Unchanged
        } else {
            observers.push(observer);
            if observers.len() == 1 {
                ObserverEdge::FirstAdded
            } else {
                ObserverEdge::Added
            }
        };
        on_edge(edge);
        edge
    }

    /// Remove an observer by id, returning it if it was present
    pub async fn remove(&self, id: ObjectId) -> (ObserverEdge, Option<Arc<dyn WorldObserver>>) {
        self.remove_with(id, |_| {}).await
    }

    /// Like [`ObserverSet::remove`], running `on_edge` under the write lock
    pub async fn remove_with<F>(&self, id: ObjectId, on_edge: F) -> (ObserverEdge, Option<Arc<dyn WorldObserver>>)
    where
        F: FnOnce(ObserverEdge),
    {
        let mut observers = self.observers.write().await;
        let (edge, removed) = match observers.iter().position(|o| o.observer_id() == id) {
            Some(index) => {
                let removed = observers.remove(index);
                let edge = if observers.is_empty() {
                    ObserverEdge::LastRemoved
                } else {
                    ObserverEdge::Removed
                };
                (edge, Some(removed))
            }
            None => (ObserverEdge::Unchanged, None),
        };
        on_edge(edge);
        (edge, removed)
    }

    /// Remove every observer and return them
    pub async fn clear(&self) -> Vec<Arc<dyn WorldObserver>> {
        std::mem::take(&mut *self.observers.write().await)
    }

    pub async fn contains(&self, id: ObjectId) -> bool {
        self.observers.read().await.iter().any(|o| o.observer_id() == id)
    }

    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.observers.read().await.is_empty()
    }

    /// Copy of the current members. Later changes to the set do not affect it.
    pub async fn snapshot(&self) -> Vec<Arc<dyn WorldObserver>> {
        self.observers.read().await.clone()
    }

    /// Run `action` for every observer outside of the lock
    pub async fn for_each<F>(&self, mut action: F)
    where
        F: FnMut(&Arc<dyn WorldObserver>),
    {
        for observer in self.snapshot().await.iter() {
            action(observer);
        }
    }

    pub async fn notify_all(&self, notification: &ActorNotification) {
        self.for_each(|observer| observer.notify(notification)).await;
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.observers.try_read().map(|o| o.len()).ok();
        f.debug_struct("ObserverSet").field("observers", &count).finish()
    }
}
