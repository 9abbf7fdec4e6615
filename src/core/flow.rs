//! Flow instances: a running copy of a flow asset.
//!
//! The instance owns the node objects, routes output signals along the
//! asset's connections, deactivates nodes that fire terminal outputs, and
//! dispatches timer callbacks and world events to the nodes that asked for
//! them. Routed inputs are queued and drained in order, so an emitting node
//! never waits on the nodes downstream of it.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::core::node::{FlowNode, NodeContext, NodeEffects};
use crate::core::nodes;
use crate::core::scheduler::{TimerQueue, TimerScheduler};
use crate::core::world::ActorRegistry;
use crate::schema::asset::{AssetError, FlowAsset};
use crate::schema::ids::NodeId;
use crate::schema::pin::{self, ActivationState, FiredOutput, SignalMode};
use crate::schema::save::{FlowSaveData, NodeSaveData, SaveError};
use crate::schema::settings::FlowSettings;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("save error: {0}")]
    Save(#[from] SaveError),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("{node} ({kind}) has no {direction} pin named {pin}")]
    UnknownPin {
        node: NodeId,
        kind: &'static str,
        direction: &'static str,
        pin: String,
    },
    #[error("save data belongs to flow '{found}', expected '{expected}'")]
    AssetMismatch { expected: String, found: String },
    #[error("flow has already been started")]
    AlreadyStarted,
    #[error("flow is not running")]
    NotRunning,
}

/// The services a flow runs against: its timer queue and the actor registry.
/// One world drives one flow instance.
#[derive(Debug, Default)]
pub struct FlowWorld {
    pub timers: TimerQueue,
    pub actors: ActorRegistry,
}

impl FlowWorld {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Running,
    Finished,
}

/// How active nodes are marked when the flow finishes around them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishPolicy {
    #[default]
    Keep,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Note,
    Error,
}

/// An entry in the flow's message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMessage {
    pub node: Option<NodeId>,
    pub severity: MessageSeverity,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PinTarget {
    node: NodeId,
    input: &'static str,
}

#[derive(Debug)]
struct NodeSlot {
    node: Box<dyn FlowNode>,
    signal_mode: SignalMode,
    activation: ActivationState,
}

/// A running flow.
#[derive(Debug)]
pub struct FlowInstance {
    asset_name: String,
    order: Vec<NodeId>,
    nodes: FxHashMap<NodeId, NodeSlot>,
    connections: FxHashMap<(NodeId, &'static str), PinTarget>,
    start: NodeId,
    state: FlowState,
    settings: FlowSettings,
    pending: VecDeque<PinTarget>,
    fired: Vec<FiredOutput>,
    messages: Vec<FlowMessage>,
}

fn find_pin(pins: &'static [&'static str], name: &str) -> Option<&'static str> {
    pins.iter().copied().find(|p| *p == name)
}

impl FlowInstance {
    /// Instantiate every node of the asset and resolve its connections.
    pub fn new(asset: &FlowAsset, settings: FlowSettings) -> Result<FlowInstance, FlowError> {
        let mut order = Vec::with_capacity(asset.nodes().len());
        let mut nodes = FxHashMap::default();
        for def in asset.nodes() {
            order.push(def.id);
            nodes.insert(
                def.id,
                NodeSlot {
                    node: nodes::instantiate(&def.kind),
                    signal_mode: def.signal_mode,
                    activation: ActivationState::NeverActivated,
                },
            );
        }

        let mut connections = FxHashMap::default();
        for conn in asset.connections() {
            let from = nodes
                .get(&conn.from)
                .ok_or(FlowError::UnknownNode(conn.from))?;
            let output = find_pin(from.node.output_pins(), &conn.output).ok_or_else(|| {
                FlowError::UnknownPin {
                    node: conn.from,
                    kind: from.node.kind_name(),
                    direction: "output",
                    pin: conn.output.clone(),
                }
            })?;

            let to = nodes.get(&conn.to).ok_or(FlowError::UnknownNode(conn.to))?;
            let input = find_pin(to.node.input_pins(), &conn.input).ok_or_else(|| {
                FlowError::UnknownPin {
                    node: conn.to,
                    kind: to.node.kind_name(),
                    direction: "input",
                    pin: conn.input.clone(),
                }
            })?;

            if let Some(from) = nodes.get_mut(&conn.from) {
                from.node.on_output_wired(output, conn.to);
            }
            connections.insert(
                (conn.from, output),
                PinTarget {
                    node: conn.to,
                    input,
                },
            );
        }

        Ok(FlowInstance {
            asset_name: asset.name.clone(),
            order,
            nodes,
            connections,
            start: asset.start_node(),
            state: FlowState::Idle,
            settings,
            pending: VecDeque::new(),
            fired: Vec::new(),
            messages: Vec::new(),
        })
    }

    /// Rebuild a flow from its asset and a save record, then let each saved
    /// node resume according to its signal mode.
    pub fn load(
        asset: &FlowAsset,
        settings: FlowSettings,
        save: &FlowSaveData,
        world: &mut FlowWorld,
    ) -> Result<FlowInstance, FlowError> {
        if !save.asset.is_empty() && save.asset != asset.name {
            return Err(FlowError::AssetMismatch {
                expected: asset.name.clone(),
                found: save.asset.clone(),
            });
        }

        let mut flow = Self::new(asset, settings)?;
        flow.state = if save.finished {
            FlowState::Finished
        } else {
            FlowState::Running
        };

        for record in &save.nodes {
            let Some(slot) = flow.nodes.get_mut(&record.node) else {
                flow.note(None, format!("saved {} no longer exists in the asset", record.node));
                continue;
            };
            slot.activation = record.activation;
            slot.node.load_state(&record.state);
            let signal_mode = slot.signal_mode;

            if record.activation != ActivationState::Active {
                continue;
            }
            match signal_mode {
                SignalMode::Enabled => {
                    let effects = flow.call(record.node, world, |node, ctx| node.on_load(ctx));
                    flow.apply(record.node, effects, world);
                }
                SignalMode::Disabled => {
                    flow.note(
                        Some(record.node),
                        "Signal disabled while loading node from save".to_string(),
                    );
                    flow.deactivate(record.node, ActivationState::Completed, world);
                }
                SignalMode::PassThrough => {
                    flow.note(
                        Some(record.node),
                        "Signal pass-through on loading node from save".to_string(),
                    );
                    flow.pass_through(record.node, world);
                }
            }
        }

        flow.drain(world);
        info!(flow = %flow.asset_name, nodes = save.nodes.len(), "flow loaded");
        Ok(flow)
    }

    /// Execute the Start node.
    pub fn start(&mut self, world: &mut FlowWorld) -> Result<(), FlowError> {
        if self.state != FlowState::Idle {
            return Err(FlowError::AlreadyStarted);
        }
        self.state = FlowState::Running;
        info!(flow = %self.asset_name, "flow started");

        self.deliver(
            PinTarget {
                node: self.start,
                input: pin::IN,
            },
            world,
        );
        self.drain(world);
        Ok(())
    }

    /// Activate an input pin from outside the graph.
    pub fn trigger_input(
        &mut self,
        node: NodeId,
        pin: &str,
        world: &mut FlowWorld,
    ) -> Result<(), FlowError> {
        if self.state != FlowState::Running {
            return Err(FlowError::NotRunning);
        }
        let slot = self.nodes.get(&node).ok_or(FlowError::UnknownNode(node))?;

        let Some(input) = find_pin(slot.node.input_pins(), pin) else {
            self.report(Some(node), format!("Input Pin name {} invalid", pin));
            return Ok(());
        };

        self.deliver(PinTarget { node, input }, world);
        self.drain(world);
        Ok(())
    }

    /// Advance the world by `dt` seconds: deliver queued world events to
    /// active nodes, then fire due timers one at a time in time order.
    pub fn tick(&mut self, world: &mut FlowWorld, dt: f32) {
        let events = world.actors.drain_events();
        if self.state == FlowState::Running {
            for event in &events {
                for id in self.order.clone() {
                    if self.activation(id) != Some(ActivationState::Active) {
                        continue;
                    }
                    let effects = self.call(id, world, |node, ctx| node.on_world_event(event, ctx));
                    self.apply(id, effects, world);
                    self.drain(world);
                }
            }
        }

        world.timers.begin_tick(dt);
        while let Some(fired) = world.timers.pop_due() {
            let id = fired.callback.node;
            if self.state != FlowState::Running
                || self.activation(id) != Some(ActivationState::Active)
            {
                trace!(node = %id, "dropping timer for inactive node");
                continue;
            }
            let effects = self.call(id, world, |node, ctx| {
                node.on_timer(fired.callback.event, ctx)
            });
            self.apply(id, effects, world);
            self.drain(world);
        }
        world.timers.end_tick();
    }

    /// Finish the flow: every active node is deactivated and cleaned up.
    pub fn finish(&mut self, world: &mut FlowWorld, policy: FinishPolicy) {
        if self.state == FlowState::Finished {
            return;
        }
        let state = match policy {
            FinishPolicy::Keep => ActivationState::Completed,
            FinishPolicy::Abort => ActivationState::Aborted,
        };
        for id in self.order.clone() {
            self.deactivate(id, state, world);
        }
        self.pending.clear();
        self.state = FlowState::Finished;
        info!(flow = %self.asset_name, ?policy, "flow finished");
    }

    /// Snapshot every active node. Nodes capture their runtime state first.
    pub fn save(&mut self, world: &mut FlowWorld) -> FlowSaveData {
        let mut nodes = Vec::new();
        for id in self.order.clone() {
            if self.activation(id) != Some(ActivationState::Active) {
                continue;
            }
            let effects = self.call(id, world, |node, ctx| node.on_save(ctx));
            self.apply(id, effects, world);

            if let Some(slot) = self.nodes.get(&id) {
                nodes.push(NodeSaveData {
                    node: id,
                    activation: slot.activation,
                    state: slot.node.save_state(),
                });
            }
        }
        self.drain(world);

        debug!(flow = %self.asset_name, nodes = nodes.len(), "flow saved");
        FlowSaveData {
            asset: self.asset_name.clone(),
            finished: self.state == FlowState::Finished,
            nodes,
        }
    }

    pub fn name(&self) -> &str {
        &self.asset_name
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn FlowNode> {
        self.nodes.get(&id).map(|slot| slot.node.as_ref())
    }

    pub fn activation(&self, id: NodeId) -> Option<ActivationState> {
        self.nodes.get(&id).map(|slot| slot.activation)
    }

    pub fn active_nodes(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.activation(*id) == Some(ActivationState::Active))
            .collect()
    }

    /// Every output fired since the last drain, oldest first.
    pub fn fired(&self) -> &[FiredOutput] {
        &self.fired
    }

    pub fn drain_fired(&mut self) -> Vec<FiredOutput> {
        std::mem::take(&mut self.fired)
    }

    pub fn messages(&self) -> &[FlowMessage] {
        &self.messages
    }

    pub fn drain_messages(&mut self) -> Vec<FlowMessage> {
        std::mem::take(&mut self.messages)
    }

    pub fn description(&self, id: NodeId) -> Option<String> {
        self.nodes.get(&id).map(|slot| slot.node.description())
    }

    pub fn status(&self, id: NodeId, world: &FlowWorld) -> Option<String> {
        let slot = self.nodes.get(&id)?;
        let ctx = NodeContext::read_only(
            id,
            Some(&world.timers as &dyn TimerScheduler),
            Some(&world.actors),
        );
        Some(slot.node.status(&ctx))
    }

    /// Run `f` against a node with a context built from `world`.
    fn call<F>(&mut self, id: NodeId, world: &mut FlowWorld, f: F) -> NodeEffects
    where
        F: FnOnce(&mut dyn FlowNode, &mut NodeContext<'_>),
    {
        let Some(slot) = self.nodes.get_mut(&id) else {
            return NodeEffects::default();
        };
        let FlowWorld { timers, actors } = world;
        let mut ctx = NodeContext::new(
            id,
            Some(timers as &mut dyn TimerScheduler),
            Some(&*actors),
        );
        f(slot.node.as_mut(), &mut ctx);
        ctx.into_effects()
    }

    /// Handle one routed or external input according to the node's signal mode.
    fn deliver(&mut self, target: PinTarget, world: &mut FlowWorld) {
        let Some(slot) = self.nodes.get_mut(&target.node) else {
            return;
        };
        let mode = slot.signal_mode;
        if mode != SignalMode::Disabled {
            slot.activation = ActivationState::Active;
        }

        match mode {
            SignalMode::Enabled => {
                trace!(node = %target.node, pin = target.input, "input");
                let effects = self.call(target.node, world, |node, ctx| {
                    node.execute_input(target.input, ctx)
                });
                self.apply(target.node, effects, world);
            }
            SignalMode::Disabled => {
                if self.settings.log_on_signal_disabled {
                    self.note(
                        Some(target.node),
                        format!("Node disabled while triggering input {}", target.input),
                    );
                }
            }
            SignalMode::PassThrough => {
                if self.settings.log_on_signal_passthrough {
                    self.note(
                        Some(target.node),
                        format!("Signal pass-through on triggering input {}", target.input),
                    );
                }
                self.pass_through(target.node, world);
            }
        }
    }

    /// Fire every connected output without running node logic, then finish.
    fn pass_through(&mut self, id: NodeId, world: &mut FlowWorld) {
        let outputs = match self.nodes.get(&id) {
            Some(slot) => slot.node.output_pins(),
            None => return,
        };
        for output in outputs {
            if self.connections.contains_key(&(id, *output)) {
                self.fire(id, output, world);
            }
        }
        self.deactivate(id, ActivationState::Completed, world);
        let finishes_graph = self
            .nodes
            .get(&id)
            .is_some_and(|slot| slot.node.can_finish_graph());
        if finishes_graph {
            self.finish(world, FinishPolicy::Keep);
        }
    }

    /// Apply what a node asked for: log its errors, deactivate it on
    /// terminal outputs, and route each output.
    fn apply(&mut self, id: NodeId, effects: NodeEffects, world: &mut FlowWorld) {
        for text in effects.errors {
            self.messages.push(FlowMessage {
                node: Some(id),
                severity: MessageSeverity::Error,
                text,
            });
        }
        for text in effects.notes {
            self.messages.push(FlowMessage {
                node: Some(id),
                severity: MessageSeverity::Note,
                text,
            });
        }

        for signal in effects.signals {
            if signal.finish {
                self.deactivate(id, ActivationState::Completed, world);
            }
            self.fire(id, signal.pin, world);
        }

        if effects.finish_requested {
            self.deactivate(id, ActivationState::Completed, world);
            let finishes_graph = self
                .nodes
                .get(&id)
                .is_some_and(|slot| slot.node.can_finish_graph());
            if finishes_graph {
                self.finish(world, FinishPolicy::Keep);
            }
        }
    }

    /// Record an output and queue the connected input, if any.
    fn fire(&mut self, id: NodeId, output: &str, world: &mut FlowWorld) {
        let Some(slot) = self.nodes.get(&id) else {
            return;
        };
        let Some(output) = find_pin(slot.node.output_pins(), output) else {
            self.report(Some(id), format!("Output Pin name {} invalid", output));
            return;
        };

        debug!(node = %id, pin = output, time = world.timers.now(), "output fired");
        self.fired.push(FiredOutput {
            node: id,
            pin: output.to_string(),
            time: world.timers.now(),
        });

        if let Some(target) = self.connections.get(&(id, output)) {
            self.pending.push_back(*target);
        }
    }

    fn deactivate(&mut self, id: NodeId, state: ActivationState, world: &mut FlowWorld) {
        match self.nodes.get_mut(&id) {
            Some(slot) if slot.activation == ActivationState::Active => slot.activation = state,
            _ => return,
        }
        let effects = self.call(id, world, |node, ctx| node.cleanup(ctx));
        for text in effects.errors {
            self.messages.push(FlowMessage {
                node: Some(id),
                severity: MessageSeverity::Error,
                text,
            });
        }
    }

    /// Deliver queued inputs until none are left or the chain limit is hit.
    fn drain(&mut self, world: &mut FlowWorld) {
        let mut hops = 0usize;
        while let Some(target) = self.pending.pop_front() {
            if self.state != FlowState::Running {
                self.pending.clear();
                break;
            }
            hops += 1;
            if hops > self.settings.max_signal_chain {
                self.report(
                    Some(target.node),
                    format!(
                        "Signal chain exceeded {} hops; dropping remaining inputs",
                        self.settings.max_signal_chain
                    ),
                );
                self.pending.clear();
                break;
            }
            self.deliver(target, world);
        }
    }

    fn report(&mut self, node: Option<NodeId>, text: String) {
        error!(flow = %self.asset_name, node = ?node, "{}", text);
        self.messages.push(FlowMessage {
            node,
            severity: MessageSeverity::Error,
            text,
        });
    }

    fn note(&mut self, node: Option<NodeId>, text: String) {
        warn!(flow = %self.asset_name, node = ?node, "{}", text);
        self.messages.push(FlowMessage {
            node,
            severity: MessageSeverity::Note,
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids::ActorId;

    fn flow(ron: &str) -> FlowInstance {
        FlowInstance::new(&FlowAsset::parse_ron(ron).unwrap(), FlowSettings::default()).unwrap()
    }

    fn pins(flow: &FlowInstance) -> Vec<(u32, &str)> {
        flow.fired()
            .iter()
            .map(|f| (f.node.0, f.pin.as_str()))
            .collect()
    }

    #[test]
    fn start_reroute_finish() {
        let mut world = FlowWorld::new();
        let mut flow = flow(
            r#"(
                name: "simple",
                nodes: [(id: 1, kind: Start), (id: 2, kind: Reroute), (id: 3, kind: Finish)],
                connections: [
                    (from: 1, output: "Out", to: 2, input: "In"),
                    (from: 2, output: "Out", to: 3, input: "In"),
                ],
            )"#,
        );
        flow.start(&mut world).unwrap();
        assert_eq!(pins(&flow), vec![(1, "Out"), (2, "Out")]);
        assert_eq!(flow.state(), FlowState::Finished);
        assert_eq!(flow.activation(NodeId(3)), Some(ActivationState::Completed));
        assert!(matches!(flow.start(&mut world), Err(FlowError::AlreadyStarted)));
    }

    #[test]
    fn unknown_pin_in_asset_rejected() {
        let asset = FlowAsset::parse_ron(
            r#"(
                nodes: [(id: 1, kind: Start), (id: 2, kind: Timer(completion_time: 1.0))],
                connections: [(from: 1, output: "Out", to: 2, input: "Pause")],
            )"#,
        )
        .unwrap();
        let err = FlowInstance::new(&asset, FlowSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            FlowError::UnknownPin {
                direction: "input",
                ..
            }
        ));
    }

    #[test]
    fn invalid_external_pin_logged() {
        let mut world = FlowWorld::new();
        let mut flow = flow(r#"(nodes: [(id: 1, kind: Start), (id: 2, kind: Counter(goal: 2))])"#);
        flow.start(&mut world).unwrap();
        flow.trigger_input(NodeId(2), "Bogus", &mut world).unwrap();
        let messages = flow.drain_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, MessageSeverity::Error);
        assert_eq!(messages[0].text, "Input Pin name Bogus invalid");
        assert!(matches!(
            flow.trigger_input(NodeId(9), "In", &mut world),
            Err(FlowError::UnknownNode(NodeId(9)))
        ));
    }

    #[test]
    fn trigger_before_start_rejected() {
        let mut world = FlowWorld::new();
        let mut flow = flow(r#"(nodes: [(id: 1, kind: Start), (id: 2, kind: Reroute)])"#);
        assert!(matches!(
            flow.trigger_input(NodeId(2), "In", &mut world),
            Err(FlowError::NotRunning)
        ));
    }

    #[test]
    fn disabled_node_ignores_input() {
        let mut world = FlowWorld::new();
        let mut flow = flow(
            r#"(
                nodes: [
                    (id: 1, kind: Start),
                    (id: 2, kind: Reroute, signal_mode: Disabled),
                    (id: 3, kind: Finish),
                ],
                connections: [
                    (from: 1, output: "Out", to: 2, input: "In"),
                    (from: 2, output: "Out", to: 3, input: "In"),
                ],
            )"#,
        );
        flow.start(&mut world).unwrap();
        assert_eq!(pins(&flow), vec![(1, "Out")]);
        assert_eq!(flow.state(), FlowState::Running);
        assert_eq!(flow.activation(NodeId(2)), Some(ActivationState::NeverActivated));
        assert_eq!(flow.messages()[0].severity, MessageSeverity::Note);
    }

    #[test]
    fn pass_through_fires_connected_outputs() {
        let mut world = FlowWorld::new();
        let mut flow = flow(
            r#"(
                nodes: [
                    (id: 1, kind: Start),
                    (id: 2, kind: Timer(completion_time: 5.0), signal_mode: PassThrough),
                    (id: 3, kind: Reroute),
                ],
                connections: [
                    (from: 1, output: "Out", to: 2, input: "In"),
                    (from: 2, output: "Completed", to: 3, input: "In"),
                ],
            )"#,
        );
        flow.start(&mut world).unwrap();
        assert_eq!(pins(&flow), vec![(1, "Out"), (2, "Completed"), (3, "Out")]);
        assert_eq!(world.timers.pending_count(), 0);
        assert_eq!(flow.activation(NodeId(2)), Some(ActivationState::Completed));
    }

    #[test]
    fn pass_through_finish_ends_flow() {
        let mut world = FlowWorld::new();
        let mut flow = flow(
            r#"(
                nodes: [
                    (id: 1, kind: Start),
                    (id: 2, kind: Reroute),
                    (id: 3, kind: Finish, signal_mode: PassThrough),
                ],
                connections: [
                    (from: 1, output: "Out", to: 2, input: "In"),
                    (from: 2, output: "Out", to: 3, input: "In"),
                ],
            )"#,
        );
        flow.start(&mut world).unwrap();
        assert_eq!(flow.state(), FlowState::Finished);
        assert_eq!(flow.activation(NodeId(3)), Some(ActivationState::Completed));
        assert!(matches!(
            flow.trigger_input(NodeId(2), "In", &mut world),
            Err(FlowError::NotRunning)
        ));
    }

    #[test]
    fn reroute_cycle_is_cut() {
        let mut world = FlowWorld::new();
        let asset = FlowAsset::parse_ron(
            r#"(
                nodes: [(id: 1, kind: Start), (id: 2, kind: Reroute), (id: 3, kind: Reroute)],
                connections: [
                    (from: 1, output: "Out", to: 2, input: "In"),
                    (from: 2, output: "Out", to: 3, input: "In"),
                    (from: 3, output: "Out", to: 2, input: "In"),
                ],
            )"#,
        )
        .unwrap();
        let settings = FlowSettings {
            max_signal_chain: 10,
            ..FlowSettings::default()
        };
        let mut flow = FlowInstance::new(&asset, settings).unwrap();
        flow.start(&mut world).unwrap();
        assert_eq!(flow.fired().len(), 11);
        assert!(flow
            .messages()
            .iter()
            .any(|m| m.text.starts_with("Signal chain exceeded 10 hops")));
    }

    #[test]
    fn abort_marks_active_nodes() {
        let mut world = FlowWorld::new();
        let mut flow = flow(
            r#"(
                nodes: [(id: 1, kind: Start), (id: 2, kind: Timer(completion_time: 5.0, step_time: 1.0))],
                connections: [(from: 1, output: "Out", to: 2, input: "In")],
            )"#,
        );
        flow.start(&mut world).unwrap();
        assert_eq!(flow.active_nodes(), vec![NodeId(2)]);
        assert_eq!(world.timers.pending_count(), 2);

        flow.finish(&mut world, FinishPolicy::Abort);
        assert_eq!(flow.activation(NodeId(2)), Some(ActivationState::Aborted));
        assert_eq!(world.timers.pending_count(), 0);
        assert_eq!(flow.state(), FlowState::Finished);
    }

    #[test]
    fn observer_reacts_on_tick() {
        let mut world = FlowWorld::new();
        let mut flow = flow(
            r#"(
                nodes: [
                    (id: 1, kind: Start),
                    (id: 2, kind: OnActorRegistered(identity_tags: ["Enemy"], match_type: HasAny, success_limit: 1)),
                    (id: 3, kind: Finish),
                ],
                connections: [
                    (from: 1, output: "Out", to: 2, input: "Start"),
                    (from: 2, output: "Completed", to: 3, input: "In"),
                ],
            )"#,
        );
        flow.start(&mut world).unwrap();
        assert_eq!(flow.status(NodeId(2), &world).unwrap(), "No actors found");

        world.actors.register(ActorId(10), "raptor", &["Enemy.Raptor"]);
        flow.tick(&mut world, 0.016);
        assert_eq!(
            pins(&flow),
            vec![(1, "Out"), (2, "Success"), (2, "Completed")]
        );
        assert_eq!(flow.state(), FlowState::Finished);
    }

    #[test]
    fn descriptions_by_node() {
        let flow = flow(
            r#"(nodes: [(id: 1, kind: Start), (id: 2, kind: Timer(completion_time: 2.0, step_time: 0.5))])"#,
        );
        assert_eq!(flow.description(NodeId(2)).unwrap(), "2.00, step by 0.50");
        assert_eq!(flow.description(NodeId(1)).unwrap(), "");
        assert!(flow.description(NodeId(5)).is_none());
        assert_eq!(flow.node(NodeId(2)).unwrap().kind_name(), "Timer");
    }
}
