//! World observer nodes: react to actors matching identity tags entering
//! or leaving the actor registry.

use rustc_hash::FxHashSet;

use crate::core::node::{FlowNode, NodeContext};
use crate::core::world::WorldEvent;
use crate::schema::asset::ObserverConfig;
use crate::schema::ids::ActorId;
use crate::schema::pin::ObserverOutput;
use crate::schema::save::NodeSaveState;

pub const START: &str = "Start";
pub const STOP: &str = "Stop";

const MISSING_IDENTITY_TAG: &str = "Missing Identity Tag";
const NO_ACTORS_FOUND: &str = "No actors found";

/// Which registry transition counts as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    /// An actor starts matching the identity tags.
    Registered,
    /// An observed actor stops matching or leaves the registry.
    Unregistered,
}

#[derive(Debug, Clone)]
pub struct ObserverNode {
    kind: ObserverKind,
    config: ObserverConfig,
    observed: FxHashSet<ActorId>,
    observing: bool,
    success_count: u32,
}

impl ObserverNode {
    pub fn new(kind: ObserverKind, config: ObserverConfig) -> Self {
        Self {
            kind,
            config,
            observed: FxHashSet::default(),
            observing: false,
            success_count: 0,
        }
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    pub fn observed(&self) -> &FxHashSet<ActorId> {
        &self.observed
    }

    fn start_observing(&mut self, ctx: &mut NodeContext<'_>) {
        let Some(world) = ctx.world() else {
            ctx.log_error("No actor registry available");
            return;
        };
        self.observing = true;

        for actor in world.actors_matching(&self.config.identity_tags, self.config.match_type) {
            self.observe_actor(actor, ctx);
            // Observing may finish the node; stop collecting once it does.
            if ctx.is_finishing() {
                return;
            }
        }
    }

    /// Pick observation back up after a load. Actors that already match
    /// were counted before the save, so they are tracked without firing.
    fn resume_observing(&mut self, ctx: &mut NodeContext<'_>) {
        let Some(world) = ctx.world() else {
            ctx.log_error("No actor registry available");
            return;
        };
        self.observing = true;
        self.observed
            .extend(world.actors_matching(&self.config.identity_tags, self.config.match_type));
    }

    fn observe_actor(&mut self, actor: ActorId, ctx: &mut NodeContext<'_>) {
        if self.observed.insert(actor) && self.kind == ObserverKind::Registered {
            self.on_event_received(ctx);
        }
    }

    fn forget_actor(&mut self, ctx: &mut NodeContext<'_>) {
        if self.kind == ObserverKind::Unregistered {
            self.on_event_received(ctx);
        }
    }

    fn on_event_received(&mut self, ctx: &mut NodeContext<'_>) {
        ctx.emit(ObserverOutput::Success);

        self.success_count += 1;
        if self.config.success_limit > 0 && self.success_count == self.config.success_limit {
            ctx.emit(ObserverOutput::Completed);
        }
    }
}

impl FlowNode for ObserverNode {
    fn kind_name(&self) -> &'static str {
        match self.kind {
            ObserverKind::Registered => "OnActorRegistered",
            ObserverKind::Unregistered => "OnActorUnregistered",
        }
    }

    fn input_pins(&self) -> &'static [&'static str] {
        &[START, STOP]
    }

    fn output_pins(&self) -> &'static [&'static str] {
        &ObserverOutput::ALL
    }

    fn execute_input(&mut self, pin: &str, ctx: &mut NodeContext<'_>) {
        if self.config.identity_tags.is_empty() {
            ctx.log_error(MISSING_IDENTITY_TAG);
            return;
        }
        match pin {
            START => self.start_observing(ctx),
            STOP => ctx.emit(ObserverOutput::Stopped),
            _ => {}
        }
    }

    fn on_world_event(&mut self, event: &WorldEvent, ctx: &mut NodeContext<'_>) {
        if !self.observing {
            return;
        }
        let Some(world) = ctx.world() else {
            return;
        };
        let tags = &self.config.identity_tags;
        let match_type = self.config.match_type;

        match event {
            WorldEvent::ActorRegistered(id) | WorldEvent::TagsAdded(id, _) => {
                if !self.observed.contains(id) && world.actor_matches(*id, tags, match_type) {
                    self.observe_actor(*id, ctx);
                }
            }
            WorldEvent::TagsRemoved(id, _) => {
                if self.observed.contains(id) && !world.actor_matches(*id, tags, match_type) {
                    self.observed.remove(id);
                    self.forget_actor(ctx);
                }
            }
            WorldEvent::ActorUnregistered(id) => {
                if self.observed.remove(id) {
                    self.forget_actor(ctx);
                }
            }
        }
    }

    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) {
        self.observed.clear();
        self.observing = false;
        self.success_count = 0;
    }

    fn on_load(&mut self, ctx: &mut NodeContext<'_>) {
        if !self.config.identity_tags.is_empty() {
            self.resume_observing(ctx);
        }
    }

    fn save_state(&self) -> NodeSaveState {
        NodeSaveState::Observer {
            success_count: self.success_count,
        }
    }

    fn load_state(&mut self, state: &NodeSaveState) {
        if let NodeSaveState::Observer { success_count } = *state {
            self.success_count = success_count;
        }
    }

    fn description(&self) -> String {
        if self.config.identity_tags.is_empty() {
            MISSING_IDENTITY_TAG.to_string()
        } else {
            self.config.identity_tags.join(", ")
        }
    }

    fn status(&self, _ctx: &NodeContext<'_>) -> String {
        if self.observing && self.observed.is_empty() {
            NO_ACTORS_FOUND.to_string()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::world::ActorRegistry;
    use crate::schema::asset::TagMatch;
    use crate::schema::ids::NodeId;

    fn config(tags: &[&str], limit: u32) -> ObserverConfig {
        ObserverConfig {
            identity_tags: tags.iter().map(|t| t.to_string()).collect(),
            match_type: TagMatch::HasAny,
            success_limit: limit,
        }
    }

    fn pins(ctx: &NodeContext<'_>) -> Vec<&'static str> {
        ctx.signals().iter().map(|s| s.pin).collect()
    }

    #[test]
    fn registered_sees_existing_actors() {
        let mut world = ActorRegistry::new();
        world.register(ActorId(1), "raptor", &["Enemy.Raptor"]);
        world.register(ActorId(2), "goat", &["Prey"]);

        let mut node = ObserverNode::new(ObserverKind::Registered, config(&["Enemy"], 0));
        let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
        node.execute_input(START, &mut ctx);
        assert_eq!(pins(&ctx), vec!["Success"]);
        assert_eq!(node.success_count(), 1);
    }

    #[test]
    fn limit_completes_and_stops_iterating() {
        let mut world = ActorRegistry::new();
        world.register(ActorId(1), "a", &["Enemy"]);
        world.register(ActorId(2), "b", &["Enemy"]);

        let mut node = ObserverNode::new(ObserverKind::Registered, config(&["Enemy"], 1));
        let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
        node.execute_input(START, &mut ctx);
        assert_eq!(pins(&ctx), vec!["Success", "Completed"]);
        assert_eq!(node.observed().len(), 1);
    }

    #[test]
    fn registered_reacts_to_new_and_retagged_actors() {
        let mut world = ActorRegistry::new();
        let mut node = ObserverNode::new(ObserverKind::Registered, config(&["Enemy"], 0));
        {
            let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
            node.execute_input(START, &mut ctx);
            assert!(ctx.signals().is_empty());
            assert_eq!(node.status(&ctx), "No actors found");
        }

        world.register(ActorId(1), "raptor", &["Enemy"]);
        world.register(ActorId(2), "goat", &["Prey"]);
        world.add_tags(ActorId(2), &["Enemy.Turncoat"]);

        let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
        for event in world.clone().drain_events() {
            node.on_world_event(&event, &mut ctx);
        }
        assert_eq!(pins(&ctx), vec!["Success", "Success"]);
        assert_eq!(node.status(&ctx), "");
    }

    #[test]
    fn unregistered_fires_when_observed_actor_leaves() {
        let mut world = ActorRegistry::new();
        world.register(ActorId(1), "raptor", &["Enemy"]);
        world.register(ActorId(2), "trex", &["Enemy"]);
        world.drain_events();

        let mut node = ObserverNode::new(ObserverKind::Unregistered, config(&["Enemy"], 2));
        {
            let mut ctx = NodeContext::new(NodeId(6), None, Some(&world));
            node.execute_input(START, &mut ctx);
            assert!(ctx.signals().is_empty());
        }

        world.unregister(ActorId(1));
        world.remove_tags(ActorId(2), &["Enemy"]);
        let events = world.drain_events();

        let mut ctx = NodeContext::new(NodeId(6), None, Some(&world));
        for event in &events {
            node.on_world_event(event, &mut ctx);
        }
        assert_eq!(pins(&ctx), vec!["Success", "Success", "Completed"]);
    }

    #[test]
    fn missing_tags_logged() {
        let world = ActorRegistry::new();
        let mut node = ObserverNode::new(ObserverKind::Registered, config(&[], 1));
        let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
        node.execute_input(START, &mut ctx);
        assert_eq!(ctx.errors(), ["Missing Identity Tag".to_string()]);
        assert_eq!(node.description(), "Missing Identity Tag");
    }

    #[test]
    fn stop_emits_stopped() {
        let world = ActorRegistry::new();
        let mut node = ObserverNode::new(ObserverKind::Registered, config(&["Enemy"], 1));
        let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
        node.execute_input(STOP, &mut ctx);
        assert_eq!(ctx.signals()[0].pin, "Stopped");
        assert!(ctx.signals()[0].finish);
    }

    #[test]
    fn load_does_not_recount_present_actors() {
        let mut world = ActorRegistry::new();
        world.register(ActorId(1), "raptor", &["Enemy"]);

        let mut node = ObserverNode::new(ObserverKind::Registered, config(&["Enemy"], 3));
        node.load_state(&NodeSaveState::Observer { success_count: 1 });
        let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
        node.on_load(&mut ctx);
        assert!(ctx.signals().is_empty());
        assert_eq!(node.observed().len(), 1);
        assert_eq!(node.success_count(), 1);
    }

    #[test]
    fn events_ignored_before_start() {
        let mut world = ActorRegistry::new();
        world.register(ActorId(1), "raptor", &["Enemy"]);
        let mut node = ObserverNode::new(ObserverKind::Registered, config(&["Enemy"], 0));
        let mut ctx = NodeContext::new(NodeId(5), None, Some(&world));
        node.on_world_event(&WorldEvent::ActorRegistered(ActorId(1)), &mut ctx);
        assert!(ctx.signals().is_empty());
    }
}
