//! The node trait and the per-call context nodes run against.

use std::fmt;

use tracing::error;

use crate::core::scheduler::{TimerEvent, TimerScheduler};
use crate::core::world::{ActorRegistry, WorldEvent};
use crate::schema::ids::NodeId;
use crate::schema::pin::{self, Signal};
use crate::schema::save::NodeSaveState;

/// Everything a node may touch during one call: its own id, the scheduling
/// port, the actor registry, and the sinks for signals and errors.
///
/// The scheduler and registry are `None` when the host has no such context.
pub struct NodeContext<'a> {
    node: NodeId,
    scheduler: Option<SchedulerPort<'a>>,
    world: Option<&'a ActorRegistry>,
    signals: Vec<Signal>,
    finish_requested: bool,
    errors: Vec<String>,
    notes: Vec<String>,
}

/// A scheduler borrowed for arming timers, or only for inspecting them.
enum SchedulerPort<'a> {
    Exclusive(&'a mut dyn TimerScheduler),
    Shared(&'a dyn TimerScheduler),
}

/// What a node asked for during a call, collected once the call returns.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeEffects {
    pub signals: Vec<Signal>,
    /// The node finished without firing an output (Finish node).
    pub finish_requested: bool,
    pub errors: Vec<String>,
    /// Messages the node wants shown in the host's message log.
    pub notes: Vec<String>,
}

impl<'a> NodeContext<'a> {
    pub fn new(
        node: NodeId,
        scheduler: Option<&'a mut dyn TimerScheduler>,
        world: Option<&'a ActorRegistry>,
    ) -> Self {
        Self {
            node,
            scheduler: scheduler.map(SchedulerPort::Exclusive),
            world,
            signals: Vec::new(),
            finish_requested: false,
            errors: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// A context for queries: timers can be inspected but not armed.
    pub fn read_only(
        node: NodeId,
        scheduler: Option<&'a dyn TimerScheduler>,
        world: Option<&'a ActorRegistry>,
    ) -> Self {
        Self {
            scheduler: scheduler.map(SchedulerPort::Shared),
            ..Self::new(node, None, world)
        }
    }

    /// A context with no scheduler and no world.
    pub fn detached(node: NodeId) -> Self {
        Self::new(node, None, None)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The scheduler, when this context may arm and cancel timers.
    pub fn scheduler(&mut self) -> Option<&mut (dyn TimerScheduler + 'a)> {
        match self.scheduler.as_mut()? {
            SchedulerPort::Exclusive(scheduler) => Some(&mut **scheduler),
            SchedulerPort::Shared(_) => None,
        }
    }

    pub fn scheduler_ref(&self) -> Option<&(dyn TimerScheduler + 'a)> {
        match self.scheduler.as_ref()? {
            SchedulerPort::Exclusive(scheduler) => Some(&**scheduler),
            SchedulerPort::Shared(scheduler) => Some(*scheduler),
        }
    }

    /// Whether a timer-capable context is available right now.
    pub fn can_schedule(&self) -> bool {
        match &self.scheduler {
            Some(SchedulerPort::Exclusive(scheduler)) => scheduler.is_available(),
            _ => false,
        }
    }

    pub fn world(&self) -> Option<&'a ActorRegistry> {
        self.world
    }

    /// Fire an output pin. `finish` marks the output as terminal for the
    /// current activation. Emission is one-way; routing happens after the
    /// node call returns.
    pub fn trigger_output(&mut self, pin: &'static str, finish: bool) {
        self.signals.push(Signal { pin, finish });
    }

    /// Fire a typed output.
    pub fn emit(&mut self, output: impl Into<Signal>) {
        self.signals.push(output.into());
    }

    /// Finish the node without firing anything.
    pub fn finish(&mut self) {
        self.finish_requested = true;
    }

    /// True once the node fired a terminal output or asked to finish.
    pub fn is_finishing(&self) -> bool {
        self.finish_requested || self.signals.iter().any(|s| s.finish)
    }

    /// Report a non-fatal error to the host's diagnostic channel.
    pub fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(node = %self.node, "{}", message);
        self.errors.push(message);
    }

    /// Add a line to the host's message log without raising an error.
    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_effects(self) -> NodeEffects {
        NodeEffects {
            signals: self.signals,
            finish_requested: self.finish_requested,
            errors: self.errors,
            notes: self.notes,
        }
    }
}

impl fmt::Debug for NodeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("node", &self.node)
            .field("scheduler", &self.scheduler.is_some())
            .field("world", &self.world.is_some())
            .field("signals", &self.signals)
            .field("finish_requested", &self.finish_requested)
            .field("errors", &self.errors)
            .field("notes", &self.notes)
            .finish()
    }
}

/// A unit of execution in a flow graph.
pub trait FlowNode: fmt::Debug {
    fn kind_name(&self) -> &'static str;

    fn input_pins(&self) -> &'static [&'static str] {
        &[pin::IN]
    }

    fn output_pins(&self) -> &'static [&'static str] {
        &[pin::OUT]
    }

    /// An output of this node was wired to `target` when the flow was built.
    fn on_output_wired(&mut self, _output: &'static str, _target: NodeId) {}

    /// Handle an activated input pin.
    fn execute_input(&mut self, pin: &str, ctx: &mut NodeContext<'_>);

    /// A timer armed by this node came due.
    fn on_timer(&mut self, _event: TimerEvent, _ctx: &mut NodeContext<'_>) {}

    /// Something changed in the actor registry while the node is active.
    fn on_world_event(&mut self, _event: &WorldEvent, _ctx: &mut NodeContext<'_>) {}

    /// Release everything the activation holds. Called when the node finishes.
    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// Capture runtime state into persisted fields before saving.
    fn on_save(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// Resume after persisted fields were restored.
    fn on_load(&mut self, _ctx: &mut NodeContext<'_>) {}

    fn save_state(&self) -> NodeSaveState {
        NodeSaveState::Stateless
    }

    fn load_state(&mut self, _state: &NodeSaveState) {}

    fn description(&self) -> String {
        String::new()
    }

    fn status(&self, _ctx: &NodeContext<'_>) -> String {
        String::new()
    }

    /// Finishing this node finishes the whole flow.
    fn can_finish_graph(&self) -> bool {
        false
    }
}
