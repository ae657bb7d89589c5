//! The generic tick driver shared by every intelligence variant.
//!
//! What differs between a monster, a guard, a summon and a trap is injected as
//! a [`TargetingStrategy`] and a [`MovementPolicy`]; the order of decisions in
//! a tick is always the same.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures::FutureExt;
use log::{debug, error};
use parking_lot::Mutex;

use crate::ai::scheduler::{random_offset, tick_key, TickKey, TickScheduler};
use crate::ai::{MovementPolicy, TargetingStrategy, TickContext};
use crate::combat::{Attackable, Attacker};
use crate::entities::NonPlayerCharacter;
use crate::error::{ActorError, ObjectId, Result};

/// Where an intelligence is in its decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntelligenceState {
    /// Not bound to an actor yet
    #[default]
    Unbound,
    /// No current target
    Idle,
    /// Has a target that is not in attack range
    Tracking,
    /// Attacked its target in the last tick
    Attacking,
    /// Walking towards its target or around
    Moving,
    /// Stopped for good
    Disposed,
}

struct Binding {
    id: ObjectId,
    key: TickKey,
    npc: Weak<NonPlayerCharacter>,
}

/// Decision loop bound to exactly one actor
pub struct Intelligence {
    binding: OnceLock<Binding>,
    targeting: Box<dyn TargetingStrategy>,
    movement: Box<dyn MovementPolicy>,
    scheduler: Arc<TickScheduler>,
    max_tick_offset_ms: u64,
    current_target: Mutex<Option<Arc<dyn Attackable>>>,
    state: Mutex<IntelligenceState>,
    /// Whether anyone can currently see the actor; ticks are skipped otherwise
    observed: AtomicBool,
    weak_self: Weak<Intelligence>,
}

impl Intelligence {
    pub fn new(
        targeting: Box<dyn TargetingStrategy>,
        movement: Box<dyn MovementPolicy>,
        scheduler: Arc<TickScheduler>,
        max_tick_offset_ms: u64,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            binding: OnceLock::new(),
            targeting,
            movement,
            scheduler,
            max_tick_offset_ms,
            current_target: Mutex::new(None),
            state: Mutex::new(IntelligenceState::Unbound),
            observed: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    /// Bind to an actor. Only possible once.
    pub fn bind(&self, npc: &Arc<NonPlayerCharacter>) -> Result<()> {
        if let Some(existing) = self.binding.get() {
            return Err(ActorError::AlreadyBound(existing.id));
        }
        let map_id = npc.map()?.id();
        self.binding
            .set(Binding {
                id: npc.id(),
                key: tick_key(map_id, npc.id()),
                npc: Arc::downgrade(npc),
            })
            .map_err(|binding| ActorError::AlreadyBound(binding.id))?;

        let mut state = self.state.lock();
        if *state == IntelligenceState::Unbound {
            *state = IntelligenceState::Idle;
        }
        Ok(())
    }

    /// The bound actor
    pub fn npc(&self) -> Result<Arc<NonPlayerCharacter>> {
        let binding = self.binding.get().ok_or(ActorError::Uninitialized)?;
        binding.npc.upgrade().ok_or(ActorError::Disposed(binding.id))
    }

    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    /// Start ticking. Does nothing if already running.
    pub fn start(&self) -> Result<()> {
        let npc = self.npc()?;
        let binding = self.binding.get().ok_or(ActorError::Uninitialized)?;
        if self.state() == IntelligenceState::Disposed {
            return Err(ActorError::Disposed(binding.id));
        }
        if self.scheduler.is_scheduled(binding.key) {
            return Ok(());
        }

        let period = Duration::from_millis(npc.definition().attack_delay_ms);
        let offset = random_offset(self.max_tick_offset_ms);
        let weak = self.weak_self.clone();
        self.scheduler.schedule(binding.key, period, offset, move || {
            let intelligence = weak.upgrade();
            async move {
                match intelligence {
                    Some(intelligence) => intelligence.tick_guarded().await,
                    None => ControlFlow::Break(()),
                }
            }
        });

        debug!("Intelligence of {} {} started, period {:?}, offset {:?}", npc.name(), npc.id(), period, offset);
        Ok(())
    }

    /// Stop ticking. Safe to call repeatedly and before [`Intelligence::start`].
    pub fn pause(&self) {
        if let Some(binding) = self.binding.get() {
            self.scheduler.cancel(binding.key);
        }
    }

    pub fn is_running(&self) -> bool {
        self.binding.get().map_or(false, |binding| self.scheduler.is_scheduled(binding.key))
    }

    /// Stop for good and forget the target
    pub fn dispose(&self) {
        self.pause();
        *self.state.lock() = IntelligenceState::Disposed;
        self.clear_target();
    }

    pub fn state(&self) -> IntelligenceState {
        *self.state.lock()
    }

    fn set_state(&self, state: IntelligenceState) {
        let mut current = self.state.lock();
        if *current != IntelligenceState::Disposed {
            *current = state;
        }
    }

    pub fn set_observed(&self, observed: bool) {
        self.observed.store(observed, Ordering::Release);
    }

    pub fn is_observed(&self) -> bool {
        self.observed.load(Ordering::Acquire)
    }

    pub fn current_target(&self) -> Option<Arc<dyn Attackable>> {
        self.current_target.lock().clone()
    }

    pub fn current_target_id(&self) -> Option<ObjectId> {
        self.current_target.lock().as_ref().map(|t| t.id())
    }

    fn set_target(&self, target: Option<Arc<dyn Attackable>>) {
        *self.current_target.lock() = target;
    }

    fn clear_target(&self) {
        self.set_target(None);
    }

    /// Aggro hook: the actor received damage from `attacker`
    pub fn register_hit(&self, attacker: Arc<dyn Attacker>) {
        let Ok(npc) = self.npc() else {
            return;
        };
        let Some(target) = Attacker::as_target(attacker) else {
            return;
        };
        if !self.targeting.retaliates_against(&npc, &target) {
            return;
        }

        let mut current = self.current_target.lock();
        if current.is_none() {
            *current = Some(target);
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Run one tick, containing any fault inside it.
    ///
    /// Errors and panics are logged and the schedule goes on. A disposed
    /// actor ends the schedule quietly.
    pub async fn tick_guarded(&self) -> ControlFlow<()> {
        match AssertUnwindSafe(self.tick()).catch_unwind().await {
            Ok(Ok(())) => ControlFlow::Continue(()),
            Ok(Err(e)) if e.is_cancellation() => {
                debug!("Stopping intelligence: {}", e);
                ControlFlow::Break(())
            }
            Ok(Err(e)) => {
                error!("Tick of actor {} failed: {}", self.bound_id(), e);
                ControlFlow::Continue(())
            }
            Err(panic) => {
                error!("Tick of actor {} panicked: {}", self.bound_id(), panic_message(panic.as_ref()));
                ControlFlow::Continue(())
            }
        }
    }

    fn bound_id(&self) -> ObjectId {
        self.binding.get().map_or(0, |binding| binding.id)
    }

    /// One decision: search, validate, then attack or move.
    pub async fn tick(&self) -> Result<()> {
        let npc = self.npc()?;
        if npc.is_disposed() || self.state() == IntelligenceState::Disposed {
            return Err(ActorError::Disposed(npc.id()));
        }
        if !npc.is_alive() {
            self.clear_target();
            self.set_state(IntelligenceState::Idle);
            return Ok(());
        }
        if npc.is_walking() || npc.status().prevents_action() || !self.is_observed() {
            return Ok(());
        }

        let map = npc.map()?;
        let cx = TickContext { npc: &npc, map: &map };
        if !self.movement.can_act(&cx).await? {
            return Ok(());
        }

        let candidates = self.targeting.candidates(&cx).await;
        let target = match self.current_target() {
            Some(current) if self.targeting.keeps_target() && cx.is_valid_target(&current, &candidates) => Some(current),
            _ => self.targeting.select(&cx, &candidates),
        };
        self.set_target(target.clone());

        let Some(target) = target else {
            self.set_state(IntelligenceState::Idle);
            if self.movement.on_no_target(&cx).await? {
                self.set_state(IntelligenceState::Moving);
            }
            return Ok(());
        };
        self.set_state(IntelligenceState::Tracking);

        let definition = npc.definition();
        let position = npc.position();
        let target_position = target.position();

        if position.is_in_range(target_position, definition.attack_range) && !map.terrain().is_safe_zone(position) {
            self.set_state(IntelligenceState::Attacking);
            let volley = self.targeting.volley(&cx, &target, &candidates);
            npc.attack_targets(&volley).await?;
            return Ok(());
        }

        if position.is_in_range(target_position, definition.view_range.saturating_add(1))
            && self.movement.approach(&cx, &target).await?
        {
            self.set_state(IntelligenceState::Moving);
            return Ok(());
        }

        if self.movement.fallback_walk(&cx).await? {
            self.set_state(IntelligenceState::Moving);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Intelligence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intelligence")
            .field("actor", &self.binding.get().map(|b| b.id))
            .field("state", &self.state())
            .field("target", &self.current_target_id())
            .field("observed", &self.is_observed())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
