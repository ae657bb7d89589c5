//! Process-wide scheduler for recurring per-actor ticks.
//!
//! Every actor gets its own task, keyed by its id, instead of one loop
//! scanning all actors. A task runs its ticks one after another, so ticks of
//! the same actor never overlap.

use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use log::trace;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::ObjectId;

/// Key of a schedule: the map id in the high half, the actor id in the low half
pub type TickKey = u32;

pub fn tick_key(map_id: u16, id: ObjectId) -> TickKey {
    ((map_id as u32) << 16) | id as u32
}

/// Smallest period a schedule may use
const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
pub struct TickScheduler {
    /// Cancellation token per scheduled actor
    tasks: Mutex<HashMap<TickKey, watch::Sender<bool>>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `tick` every `period`, first after `initial_delay`, until it returns
    /// `ControlFlow::Break` or the schedule is cancelled. Scheduling a key that
    /// is already scheduled replaces the previous schedule.
    pub fn schedule<F, Fut>(&self, key: TickKey, period: Duration, initial_delay: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        if let Some(previous) = self.tasks.lock().insert(key, cancel) {
            let _ = previous.send(true);
        }

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + initial_delay, period.max(MIN_PERIOD));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => break,
                    _ = interval.tick() => {}
                }
                if *cancelled.borrow() {
                    break;
                }
                if tick().await.is_break() {
                    break;
                }
            }
            trace!("Tick schedule of {} stopped", key);
        });
    }

    /// Stop the schedule of `key`. Does nothing if it is not scheduled.
    pub fn cancel(&self, key: TickKey) {
        if let Some(cancel) = self.tasks.lock().remove(&key) {
            let _ = cancel.send(true);
        }
    }

    pub fn is_scheduled(&self, key: TickKey) -> bool {
        self.tasks.lock().get(&key).map_or(false, |cancel| !cancel.is_closed())
    }

    /// Number of schedules still running
    pub fn len(&self) -> usize {
        self.tasks.lock().values().filter(|cancel| !cancel.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cancel_all(&self) {
        for (_, cancel) in self.tasks.lock().drain() {
            let _ = cancel.send(true);
        }
    }
}

/// Random delay in `0..=max_ms` milliseconds, used to stagger first ticks
pub fn random_offset(max_ms: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
