//! Latent timer node.
//!
//! On "In" the node arms up to two timers through the scheduling port: a
//! repeating step timer (when `step_time > 0`) and a one-shot completion
//! timer. Each step adds `step_time` to a running sum and fires "Step", or
//! "Completed" once the sum reaches `completion_time`. The completion timer
//! fires "Completed" on its own. "Skip" fires "Skipped"; "Restart" cleans up
//! and arms fresh timers.
//!
//! Remaining durations can be captured before a save and re-armed after a
//! load, so a timer resumes where it left off.

use thiserror::Error;
use tracing::debug;

use crate::core::node::{FlowNode, NodeContext};
use crate::core::scheduler::{
    ScheduleError, TimerCallback, TimerEvent, TimerHandle, TimerScheduler,
};
use crate::schema::asset::{TimerNodeConfig, KINDA_SMALL_NUMBER};
use crate::schema::ids::NodeId;
use crate::schema::pin::{TimerOutput, IN};
use crate::schema::save::NodeSaveState;

pub const SKIP: &str = "Skip";
pub const RESTART: &str = "Restart";

/// Remaining time recorded for a completion timer that is due on the next
/// tick. Positive so a restore re-arms it, and below `KINDA_SMALL_NUMBER`
/// so it is re-armed for the next tick again.
const NEXT_TICK_REMAINING: f32 = f32::EPSILON;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimerError {
    #[error("Timer already active")]
    AlreadyActive,
    #[error("No valid timer context")]
    NoSchedulingContext,
    #[error("timer scheduling failed: {0}")]
    Schedule(#[from] ScheduleError),
}

/// The timer node's configuration and per-activation state.
#[derive(Debug, Clone, Default)]
pub struct TimerNode {
    config: TimerNodeConfig,
    sum_of_steps: f32,
    completion_timer: TimerHandle,
    step_timer: TimerHandle,
    remaining_completion_time: f32,
    remaining_step_time: f32,
}

impl TimerNode {
    pub fn new(config: TimerNodeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &TimerNodeConfig {
        &self.config
    }

    pub fn sum_of_steps(&self) -> f32 {
        self.sum_of_steps
    }

    pub fn completion_timer(&self) -> TimerHandle {
        self.completion_timer
    }

    pub fn step_timer(&self) -> TimerHandle {
        self.step_timer
    }

    pub fn remaining_completion_time(&self) -> f32 {
        self.remaining_completion_time
    }

    pub fn remaining_step_time(&self) -> f32 {
        self.remaining_step_time
    }

    /// True while either timer handle is held.
    pub fn is_running(&self) -> bool {
        self.completion_timer.is_valid() || self.step_timer.is_valid()
    }

    /// Handle the "In" pin. Rejected while a timer is already held.
    pub fn activate(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), TimerError> {
        if self.is_running() {
            return Err(TimerError::AlreadyActive);
        }
        self.set_timer(ctx)
    }

    /// Handle the "Skip" pin. Pending timers are left to the node's cleanup,
    /// which the flow runs when the terminal "Skipped" output deactivates
    /// the node.
    pub fn skip(&mut self, ctx: &mut NodeContext<'_>) {
        ctx.emit(TimerOutput::Skipped);
    }

    /// Handle the "Restart" pin: drop the current activation and start over.
    pub fn restart(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), TimerError> {
        self.clear_timers(ctx);
        self.set_timer(ctx)
    }

    fn set_timer(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), TimerError> {
        let node = ctx.node();
        let armed = match ctx.scheduler() {
            Some(scheduler) if scheduler.is_available() => self.arm(scheduler, node),
            _ => Err(TimerError::NoSchedulingContext),
        };

        if armed.is_err() {
            // Fail open: a node that cannot wait must not hang the flow.
            ctx.emit(TimerOutput::Completed);
        }
        armed
    }

    fn arm(&mut self, scheduler: &mut dyn TimerScheduler, node: NodeId) -> Result<(), TimerError> {
        if self.config.has_steps() {
            self.step_timer = scheduler.schedule_repeating(
                self.config.step_time(),
                None,
                TimerCallback::new(node, TimerEvent::Step),
            )?;
        }

        let callback = TimerCallback::new(node, TimerEvent::Completion);
        self.completion_timer = if self.config.completes_next_tick() {
            scheduler.schedule_next_tick(callback)?
        } else {
            scheduler.schedule_once(self.config.completion_time(), callback)?
        };

        debug!(
            %node,
            completion = self.config.completion_time(),
            step = self.config.step_time(),
            "timer armed"
        );
        Ok(())
    }

    fn on_step(&mut self, ctx: &mut NodeContext<'_>) {
        self.sum_of_steps += self.config.step_time();

        if self.sum_of_steps + KINDA_SMALL_NUMBER >= self.config.completion_time() {
            ctx.emit(TimerOutput::Completed);
        } else {
            ctx.emit(TimerOutput::Step);
        }
    }

    fn on_completion(&mut self, ctx: &mut NodeContext<'_>) {
        ctx.emit(TimerOutput::Completed);
    }

    /// Cancel both timers, invalidate the handles, and reset progress.
    fn clear_timers(&mut self, ctx: &mut NodeContext<'_>) {
        if let Some(scheduler) = ctx.scheduler() {
            scheduler.cancel(self.completion_timer);
            scheduler.cancel(self.step_timer);
        }
        self.completion_timer.invalidate();
        self.step_timer.invalidate();

        self.sum_of_steps = 0.0;
        self.remaining_completion_time = 0.0;
        self.remaining_step_time = 0.0;
    }

    /// Record the remaining time of every held timer.
    pub fn capture(&mut self, ctx: &mut NodeContext<'_>) {
        let Some(scheduler) = ctx.scheduler_ref() else {
            return;
        };

        if self.completion_timer.is_valid() {
            self.remaining_completion_time = if scheduler.is_pending(self.completion_timer) {
                scheduler
                    .remaining(self.completion_timer)
                    .max(NEXT_TICK_REMAINING)
            } else {
                0.0
            };
        }

        if self.step_timer.is_valid() {
            self.remaining_step_time = scheduler.remaining(self.step_timer);
        }
    }

    /// Re-arm timers from captured remaining times, then clear them. Does
    /// nothing when neither remaining time is positive.
    pub fn restore(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), TimerError> {
        if self.remaining_step_time <= 0.0 && self.remaining_completion_time <= 0.0 {
            return Ok(());
        }

        let node = ctx.node();
        let restored = match ctx.scheduler() {
            Some(scheduler) if scheduler.is_available() => self.rearm(scheduler, node),
            _ => Err(TimerError::NoSchedulingContext),
        };

        self.remaining_step_time = 0.0;
        self.remaining_completion_time = 0.0;

        if restored.is_err() {
            ctx.emit(TimerOutput::Completed);
        }
        restored
    }

    fn rearm(&mut self, scheduler: &mut dyn TimerScheduler, node: NodeId) -> Result<(), TimerError> {
        if self.remaining_step_time > 0.0 && self.config.has_steps() {
            self.step_timer = scheduler.schedule_repeating(
                self.config.step_time(),
                Some(self.remaining_step_time),
                TimerCallback::new(node, TimerEvent::Step),
            )?;
        }

        if self.remaining_completion_time > 0.0 {
            self.completion_timer = scheduler.schedule_once(
                self.remaining_completion_time,
                TimerCallback::new(node, TimerEvent::Completion),
            )?;
        }

        debug!(
            %node,
            completion = self.remaining_completion_time,
            step = self.remaining_step_time,
            "timer restored"
        );
        Ok(())
    }
}

impl FlowNode for TimerNode {
    fn kind_name(&self) -> &'static str {
        "Timer"
    }

    fn input_pins(&self) -> &'static [&'static str] {
        &[IN, SKIP, RESTART]
    }

    fn output_pins(&self) -> &'static [&'static str] {
        &TimerOutput::ALL
    }

    fn execute_input(&mut self, pin: &str, ctx: &mut NodeContext<'_>) {
        let result = match pin {
            IN => self.activate(ctx),
            SKIP => {
                self.skip(ctx);
                Ok(())
            }
            RESTART => self.restart(ctx),
            _ => Ok(()),
        };
        if let Err(err) = result {
            ctx.log_error(err.to_string());
        }
    }

    fn on_timer(&mut self, event: TimerEvent, ctx: &mut NodeContext<'_>) {
        match event {
            TimerEvent::Step => self.on_step(ctx),
            TimerEvent::Completion => self.on_completion(ctx),
        }
    }

    fn cleanup(&mut self, ctx: &mut NodeContext<'_>) {
        self.clear_timers(ctx);
    }

    fn on_save(&mut self, ctx: &mut NodeContext<'_>) {
        self.capture(ctx);
    }

    fn on_load(&mut self, ctx: &mut NodeContext<'_>) {
        if let Err(err) = self.restore(ctx) {
            ctx.log_error(err.to_string());
        }
    }

    fn save_state(&self) -> NodeSaveState {
        NodeSaveState::Timer {
            remaining_completion_time: self.remaining_completion_time,
            remaining_step_time: self.remaining_step_time,
            sum_of_steps: self.sum_of_steps,
        }
    }

    fn load_state(&mut self, state: &NodeSaveState) {
        if let NodeSaveState::Timer {
            remaining_completion_time,
            remaining_step_time,
            sum_of_steps,
        } = *state
        {
            self.remaining_completion_time = remaining_completion_time;
            self.remaining_step_time = remaining_step_time;
            self.sum_of_steps = sum_of_steps;
        }
    }

    fn description(&self) -> String {
        if self.config.completes_next_tick() {
            return "Completes in next tick".to_string();
        }
        if self.config.has_steps() {
            format!(
                "{:.2}, step by {:.2}",
                self.config.completion_time(),
                self.config.step_time()
            )
        } else {
            format!("{:.2}", self.config.completion_time())
        }
    }

    fn status(&self, ctx: &NodeContext<'_>) -> String {
        if self.config.has_steps() {
            return format!("Progress: {:.2}", self.sum_of_steps);
        }
        match ctx.scheduler_ref() {
            Some(scheduler) if self.completion_timer.is_valid() => {
                format!("Progress: {:.2}", scheduler.elapsed(self.completion_timer))
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::{FiredTimer, TimerQueue};
    use crate::schema::pin::Signal;

    const NODE: NodeId = NodeId(7);

    fn timer(completion: f32, step: f32) -> TimerNode {
        TimerNode::new(TimerNodeConfig::new(completion, step).unwrap())
    }

    fn input(node: &mut TimerNode, queue: &mut TimerQueue, pin: &str) -> Vec<Signal> {
        let mut ctx = NodeContext::new(NODE, Some(queue), None);
        node.execute_input(pin, &mut ctx);
        ctx.into_effects().signals
    }

    /// Advance one tick, dispatching each due timer to the node. Terminal
    /// outputs clean the node up before the next timer is popped, the way a
    /// flow deactivates a finished node.
    fn tick(node: &mut TimerNode, queue: &mut TimerQueue, dt: f32) -> Vec<(f64, &'static str)> {
        let mut out = Vec::new();
        queue.begin_tick(dt);
        while let Some(FiredTimer { callback, time, .. }) = queue.pop_due() {
            let mut ctx = NodeContext::new(NODE, Some(&mut *queue), None);
            node.on_timer(callback.event, &mut ctx);
            let finishing = ctx.is_finishing();
            if finishing {
                node.cleanup(&mut ctx);
            }
            out.extend(ctx.signals().iter().map(|s| (time, s.pin)));
        }
        queue.end_tick();
        out
    }

    #[test]
    fn completion_only() {
        let mut queue = TimerQueue::new();
        let mut node = timer(3.0, 0.0);
        assert!(input(&mut node, &mut queue, IN).is_empty());
        assert!(node.completion_timer().is_valid());
        assert!(!node.step_timer().is_valid());

        assert!(tick(&mut node, &mut queue, 2.9).is_empty());
        let fired = tick(&mut node, &mut queue, 0.1);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, "Completed");
        assert!(!node.is_running());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn steps_then_completed_on_last_step() {
        let mut queue = TimerQueue::new();
        let mut node = timer(6.0, 2.0);
        input(&mut node, &mut queue, IN);

        let fired = tick(&mut node, &mut queue, 7.0);
        assert_eq!(
            fired,
            vec![(2.0, "Step"), (4.0, "Step"), (6.0, "Completed")]
        );
        assert_eq!(queue.pending_count(), 0);
        assert!((node.sum_of_steps()).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_completion_waits_for_next_tick() {
        let mut queue = TimerQueue::new();
        let mut node = timer(0.0, 0.0);
        let signals = input(&mut node, &mut queue, IN);
        assert!(signals.is_empty(), "must not complete inside activation");
        assert!(node.completion_timer().is_valid());

        let fired = tick(&mut node, &mut queue, 0.0);
        assert_eq!(fired, vec![(0.0, "Completed")]);
    }

    #[test]
    fn second_activation_rejected() {
        let mut queue = TimerQueue::new();
        let mut node = timer(5.0, 1.0);
        input(&mut node, &mut queue, IN);
        let handles = (node.completion_timer(), node.step_timer());
        assert_eq!(queue.pending_count(), 2);

        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        assert_eq!(node.activate(&mut ctx), Err(TimerError::AlreadyActive));
        assert!(ctx.signals().is_empty());
        drop(ctx);

        assert_eq!(queue.pending_count(), 2);
        assert_eq!((node.completion_timer(), node.step_timer()), handles);
    }

    #[test]
    fn already_active_is_logged_through_input() {
        let mut queue = TimerQueue::new();
        let mut node = timer(5.0, 0.0);
        input(&mut node, &mut queue, IN);

        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        node.execute_input(IN, &mut ctx);
        assert_eq!(ctx.errors(), ["Timer already active".to_string()]);
        assert!(ctx.signals().is_empty());
    }

    #[test]
    fn no_context_fails_open() {
        let mut node = timer(5.0, 1.0);
        let mut ctx = NodeContext::detached(NODE);
        assert_eq!(node.activate(&mut ctx), Err(TimerError::NoSchedulingContext));
        assert_eq!(ctx.signals(), [Signal::from(TimerOutput::Completed)]);
        assert!(!node.is_running());
    }

    #[test]
    fn closed_scheduler_fails_open() {
        let mut queue = TimerQueue::new();
        queue.close();
        let mut node = timer(5.0, 0.0);
        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        node.execute_input(IN, &mut ctx);
        assert_eq!(ctx.signals()[0].pin, "Completed");
        assert_eq!(ctx.errors().len(), 1);
    }

    #[test]
    fn skip_emits_once_and_leaves_timers() {
        let mut queue = TimerQueue::new();
        let mut node = timer(5.0, 1.0);
        input(&mut node, &mut queue, IN);

        let signals = input(&mut node, &mut queue, SKIP);
        assert_eq!(signals, vec![Signal::from(TimerOutput::Skipped)]);
        assert!(node.is_running());
        assert_eq!(queue.pending_count(), 2);
    }

    #[test]
    fn skip_while_idle_still_emits() {
        let mut queue = TimerQueue::new();
        let mut node = timer(5.0, 1.0);
        let signals = input(&mut node, &mut queue, SKIP);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].pin, "Skipped");
    }

    #[test]
    fn restart_resets_progress() {
        let mut queue = TimerQueue::new();
        let mut node = timer(6.0, 2.0);
        input(&mut node, &mut queue, IN);
        tick(&mut node, &mut queue, 4.5);
        assert!((node.sum_of_steps() - 4.0).abs() < f32::EPSILON);
        let old = node.completion_timer();

        assert!(input(&mut node, &mut queue, RESTART).is_empty());
        assert!((node.sum_of_steps()).abs() < f32::EPSILON);
        assert_ne!(node.completion_timer(), old);
        assert_eq!(queue.pending_count(), 2);

        // Full six seconds from the restart, not from the first activation.
        let fired = tick(&mut node, &mut queue, 5.9);
        assert_eq!(fired.iter().filter(|(_, p)| *p == "Step").count(), 2);
        let fired = tick(&mut node, &mut queue, 0.1);
        assert_eq!(fired.last().map(|(_, p)| *p), Some("Completed"));
    }

    #[test]
    fn capture_and_restore() {
        let mut queue = TimerQueue::new();
        let mut node = timer(6.0, 2.0);
        input(&mut node, &mut queue, IN);
        tick(&mut node, &mut queue, 3.0);

        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        node.on_save(&mut ctx);
        drop(ctx);
        assert!((node.remaining_completion_time() - 3.0).abs() < 1e-5);
        assert!((node.remaining_step_time() - 1.0).abs() < 1e-5);

        let state = node.save_state();
        let mut loaded = timer(6.0, 2.0);
        loaded.load_state(&state);
        let mut fresh = TimerQueue::new();
        let mut ctx = NodeContext::new(NODE, Some(&mut fresh), None);
        loaded.on_load(&mut ctx);
        assert!(ctx.signals().is_empty());
        drop(ctx);

        assert!((loaded.remaining_completion_time()).abs() < f32::EPSILON);
        assert!((loaded.remaining_step_time()).abs() < f32::EPSILON);
        assert!(loaded.is_running());

        let fired = tick(&mut loaded, &mut fresh, 4.0);
        assert_eq!(fired, vec![(1.0, "Step"), (3.0, "Completed")]);
    }

    #[test]
    fn restore_without_remaining_is_noop() {
        let mut queue = TimerQueue::new();
        let mut node = timer(6.0, 2.0);
        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        assert_eq!(node.restore(&mut ctx), Ok(()));
        assert!(ctx.signals().is_empty());
        drop(ctx);
        assert_eq!(queue.pending_count(), 0);
        assert!(!node.is_running());
    }

    #[test]
    fn restore_twice_arms_once() {
        let mut node = timer(4.0, 0.0);
        node.load_state(&NodeSaveState::Timer {
            remaining_completion_time: 2.5,
            remaining_step_time: 0.0,
            sum_of_steps: 0.0,
        });
        let mut queue = TimerQueue::new();
        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        node.restore(&mut ctx).unwrap();
        node.restore(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(queue.pending_count(), 1);
        assert!((queue.remaining(node.completion_timer()) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn capture_of_next_tick_completion_survives() {
        let mut queue = TimerQueue::new();
        let mut node = timer(0.0, 0.0);
        input(&mut node, &mut queue, IN);

        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        node.capture(&mut ctx);
        drop(ctx);
        assert!(node.remaining_completion_time() > 0.0);

        let mut loaded = timer(0.0, 0.0);
        loaded.load_state(&node.save_state());
        let mut fresh = TimerQueue::new();
        let mut ctx = NodeContext::new(NODE, Some(&mut fresh), None);
        loaded.on_load(&mut ctx);
        drop(ctx);
        assert_eq!(tick(&mut loaded, &mut fresh, 0.0), vec![(0.0, "Completed")]);
    }

    #[test]
    fn capture_without_timers_leaves_zero() {
        let mut queue = TimerQueue::new();
        let mut node = timer(6.0, 2.0);
        let mut ctx = NodeContext::new(NODE, Some(&mut queue), None);
        node.capture(&mut ctx);
        assert!((node.remaining_completion_time()).abs() < f32::EPSILON);
        assert!((node.remaining_step_time()).abs() < f32::EPSILON);
    }

    #[test]
    fn descriptions() {
        assert_eq!(timer(0.0, 0.0).description(), "Completes in next tick");
        assert_eq!(timer(3.0, 0.0).description(), "3.00");
        assert_eq!(timer(6.0, 1.5).description(), "6.00, step by 1.50");
    }

    #[test]
    fn status_strings() {
        let mut queue = TimerQueue::new();
        let mut plain = timer(5.0, 0.0);
        {
            let ctx = NodeContext::new(NODE, Some(&mut queue), None);
            assert_eq!(plain.status(&ctx), "");
        }
        input(&mut plain, &mut queue, IN);
        tick(&mut plain, &mut queue, 1.25);
        {
            let ctx = NodeContext::new(NODE, Some(&mut queue), None);
            assert_eq!(plain.status(&ctx), "Progress: 1.25");
        }

        let mut stepped = timer(6.0, 2.0);
        let mut other = TimerQueue::new();
        input(&mut stepped, &mut other, IN);
        tick(&mut stepped, &mut other, 4.0);
        let ctx = NodeContext::detached(NODE);
        assert_eq!(stepped.status(&ctx), "Progress: 4.00");
    }
}
