//! Timer scheduling port and a deterministic, manually advanced implementation.
//!
//! Nodes never own a clock. They receive a `TimerScheduler` through their
//! `NodeContext`, arm timers through it, and keep the returned handles. The
//! host advances the scheduler and routes each fired `TimerCallback` back to
//! the node that armed it.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

use crate::schema::asset::KINDA_SMALL_NUMBER;
use crate::schema::ids::NodeId;

/// Slack used when comparing accumulated fire times with a tick target.
const TIME_TOLERANCE: f64 = 1.0e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("no timer-capable context is available")]
    Unavailable,
    #[error("repeating timer interval must be positive and finite (got {0})")]
    InvalidInterval(f32),
    #[error("timer delay must be finite and non-negative (got {0})")]
    InvalidDelay(f32),
}

/// Opaque reference to a pending timer. The default handle is invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub const INVALID: TimerHandle = TimerHandle(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    pub fn invalidate(&mut self) {
        self.0 = 0;
    }
}

/// Which callback of a node a timer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerEvent {
    Step,
    Completion,
}

/// Routing information carried by a timer: the node to call back and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerCallback {
    pub node: NodeId,
    pub event: TimerEvent,
}

impl TimerCallback {
    pub fn new(node: NodeId, event: TimerEvent) -> Self {
        Self { node, event }
    }
}

/// A timer that came due during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub callback: TimerCallback,
    /// Scheduler time at which the timer fired.
    pub time: f64,
}

/// The scheduling port consumed by latent nodes.
pub trait TimerScheduler {
    /// Whether timers can be scheduled right now.
    fn is_available(&self) -> bool;

    /// Fire `callback` once after `after` seconds. A delay at or below
    /// `KINDA_SMALL_NUMBER` fires on the next tick, never synchronously.
    fn schedule_once(
        &mut self,
        after: f32,
        callback: TimerCallback,
    ) -> Result<TimerHandle, ScheduleError>;

    /// Fire `callback` every `interval` seconds until cancelled. The first
    /// fire happens after `first_delay` when given, otherwise after `interval`.
    fn schedule_repeating(
        &mut self,
        interval: f32,
        first_delay: Option<f32>,
        callback: TimerCallback,
    ) -> Result<TimerHandle, ScheduleError>;

    /// Cancel a timer. Unknown or invalid handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);

    /// Whether `handle` names a timer that has not fired (one-shot) or been
    /// cancelled.
    fn is_pending(&self, handle: TimerHandle) -> bool;

    /// Seconds until the next fire of a pending timer, 0 otherwise.
    fn remaining(&self, handle: TimerHandle) -> f32;

    /// Seconds since the timer was armed or last fired, 0 if not pending.
    fn elapsed(&self, handle: TimerHandle) -> f32;

    fn schedule_next_tick(&mut self, callback: TimerCallback) -> Result<TimerHandle, ScheduleError> {
        self.schedule_once(0.0, callback)
    }
}

#[derive(Debug, Clone)]
struct PendingTimer {
    callback: TimerCallback,
    /// Absolute time of the next fire.
    fire_at: f64,
    /// Time the timer was armed or last fired.
    started_at: f64,
    /// 0 for one-shot timers.
    interval: f64,
    /// Next-tick timers fire on the first tick numbered at or above this.
    due_tick: Option<u64>,
}

/// Deterministic timer queue driven by explicit ticks.
///
/// Drive it with `begin_tick`, then drain `pop_due` (dispatching each timer
/// before asking for the next, so callbacks may cancel later timers), then
/// `end_tick`. Timers due at the same instant fire in the order they were
/// created.
#[derive(Debug, Clone)]
pub struct TimerQueue {
    now: f64,
    tick: u64,
    tick_target: Option<f64>,
    next_id: u64,
    timers: FxHashMap<u64, PendingTimer>,
    available: bool,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            tick: 0,
            tick_target: None,
            next_id: 1,
            timers: FxHashMap::default(),
            available: true,
        }
    }

    /// Current scheduler time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Number of ticks begun so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Tear the queue down: every pending timer is dropped and further
    /// scheduling fails with `ScheduleError::Unavailable`.
    pub fn close(&mut self) {
        self.timers.clear();
        self.available = false;
    }

    pub fn reopen(&mut self) {
        self.available = true;
    }

    /// Start a tick that advances time by `dt` seconds.
    pub fn begin_tick(&mut self, dt: f32) {
        if let Some(target) = self.tick_target.take() {
            self.now = target;
        }
        self.tick += 1;
        let dt = if dt.is_finite() { f64::from(dt.max(0.0)) } else { 0.0 };
        self.tick_target = Some(self.now + dt);
    }

    /// Pop the earliest timer due in the current tick, rearming it if it
    /// repeats. Returns `None` once nothing else is due.
    pub fn pop_due(&mut self) -> Option<FiredTimer> {
        let target = self.tick_target?;
        let tick = self.tick;

        let (&id, _) = self
            .timers
            .iter()
            .filter(|(_, t)| match t.due_tick {
                Some(due) => tick >= due,
                None => t.fire_at <= target + TIME_TOLERANCE,
            })
            .min_by(|(a_id, a), (b_id, b)| {
                a.fire_at.total_cmp(&b.fire_at).then_with(|| a_id.cmp(b_id))
            })?;

        let fire_at;
        let callback;
        let remove;
        {
            let timer = self.timers.get_mut(&id)?;
            fire_at = timer.fire_at.max(self.now);
            callback = timer.callback;
            if timer.interval > 0.0 {
                timer.started_at = fire_at;
                timer.fire_at += timer.interval;
                remove = false;
            } else {
                remove = true;
            }
        }
        if remove {
            self.timers.remove(&id);
        }

        self.now = fire_at;
        trace!(node = %callback.node, event = ?callback.event, time = fire_at, "timer fired");
        Some(FiredTimer {
            handle: TimerHandle(id),
            callback,
            time: fire_at,
        })
    }

    /// Finish the current tick, moving time to its target.
    pub fn end_tick(&mut self) {
        if let Some(target) = self.tick_target.take() {
            self.now = target;
        }
    }

    /// Run one whole tick and collect everything that fired. Callbacks cannot
    /// interleave with firing here, so hosts that dispatch to nodes should
    /// drive `pop_due` themselves.
    pub fn advance(&mut self, dt: f32) -> Vec<FiredTimer> {
        self.begin_tick(dt);
        let mut fired = Vec::new();
        while let Some(timer) = self.pop_due() {
            fired.push(timer);
        }
        self.end_tick();
        fired
    }

    fn insert(&mut self, timer: PendingTimer) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert(id, timer);
        TimerHandle(id)
    }

    fn pending(&self, handle: TimerHandle) -> Option<&PendingTimer> {
        if handle.is_valid() {
            self.timers.get(&handle.0)
        } else {
            None
        }
    }
}

impl TimerScheduler for TimerQueue {
    fn is_available(&self) -> bool {
        self.available
    }

    fn schedule_once(
        &mut self,
        after: f32,
        callback: TimerCallback,
    ) -> Result<TimerHandle, ScheduleError> {
        if !self.available {
            return Err(ScheduleError::Unavailable);
        }
        if !after.is_finite() || after < 0.0 {
            return Err(ScheduleError::InvalidDelay(after));
        }

        let timer = if after <= KINDA_SMALL_NUMBER {
            PendingTimer {
                callback,
                fire_at: self.now,
                started_at: self.now,
                interval: 0.0,
                due_tick: Some(self.tick + 1),
            }
        } else {
            PendingTimer {
                callback,
                fire_at: self.now + f64::from(after),
                started_at: self.now,
                interval: 0.0,
                due_tick: None,
            }
        };
        Ok(self.insert(timer))
    }

    fn schedule_repeating(
        &mut self,
        interval: f32,
        first_delay: Option<f32>,
        callback: TimerCallback,
    ) -> Result<TimerHandle, ScheduleError> {
        if !self.available {
            return Err(ScheduleError::Unavailable);
        }
        // Re-arming adds the interval to an f64 fire time; intervals this
        // short would stall a tick in `pop_due`.
        if !interval.is_finite() || interval <= KINDA_SMALL_NUMBER {
            return Err(ScheduleError::InvalidInterval(interval));
        }
        let delay = first_delay.unwrap_or(interval);
        if !delay.is_finite() || delay < 0.0 {
            return Err(ScheduleError::InvalidDelay(delay));
        }

        Ok(self.insert(PendingTimer {
            callback,
            fire_at: self.now + f64::from(delay),
            started_at: self.now,
            interval: f64::from(interval),
            due_tick: None,
        }))
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if handle.is_valid() {
            self.timers.remove(&handle.0);
        }
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending(handle).is_some()
    }

    fn remaining(&self, handle: TimerHandle) -> f32 {
        self.pending(handle)
            .map(|t| (t.fire_at - self.now).max(0.0) as f32)
            .unwrap_or(0.0)
    }

    fn elapsed(&self, handle: TimerHandle) -> f32 {
        self.pending(handle)
            .map(|t| (self.now - t.started_at).max(0.0) as f32)
            .unwrap_or(0.0)
    }
}
