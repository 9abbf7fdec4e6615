//! Execution sequence: fires its numbered outputs in order, then finishes.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::node::{FlowNode, NodeContext};
use crate::schema::asset::SequenceConfig;
use crate::schema::ids::NodeId;
use crate::schema::pin;
use crate::schema::save::NodeSaveState;

/// With execution state saved, each connected node is triggered at most
/// once per activation, and a loaded sequence only triggers connections
/// it has not reached before.
#[derive(Debug, Clone)]
pub struct ExecutionSequenceNode {
    config: SequenceConfig,
    wired: FxHashMap<&'static str, NodeId>,
    executed: FxHashSet<NodeId>,
}

impl ExecutionSequenceNode {
    pub fn new(config: SequenceConfig) -> Self {
        Self {
            config,
            wired: FxHashMap::default(),
            executed: FxHashSet::default(),
        }
    }

    pub fn executed(&self) -> Vec<NodeId> {
        let mut executed: Vec<NodeId> = self.executed.iter().copied().collect();
        executed.sort();
        executed
    }

    /// Unconnected outputs have no target to remember and are skipped.
    fn execute_new_connections(&mut self, ctx: &mut NodeContext<'_>) {
        for &output in self.output_pins() {
            let Some(target) = self.wired.get(output) else {
                continue;
            };
            if self.executed.insert(*target) {
                ctx.trigger_output(output, false);
            }
        }
        ctx.finish();
    }
}

impl FlowNode for ExecutionSequenceNode {
    fn kind_name(&self) -> &'static str {
        "ExecutionSequence"
    }

    fn output_pins(&self) -> &'static [&'static str] {
        pin::numbered_pins(self.config.outputs)
    }

    fn on_output_wired(&mut self, output: &'static str, target: NodeId) {
        self.wired.insert(output, target);
    }

    fn execute_input(&mut self, _pin: &str, ctx: &mut NodeContext<'_>) {
        if self.config.save_execution_state {
            self.execute_new_connections(ctx);
        } else {
            for &output in self.output_pins() {
                ctx.trigger_output(output, false);
            }
            ctx.finish();
        }
    }

    fn on_load(&mut self, ctx: &mut NodeContext<'_>) {
        self.execute_new_connections(ctx);
    }

    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) {
        self.executed.clear();
    }

    fn save_state(&self) -> NodeSaveState {
        NodeSaveState::Sequence {
            executed: self.executed(),
        }
    }

    fn load_state(&mut self, state: &NodeSaveState) {
        if let NodeSaveState::Sequence { executed } = state {
            self.executed = executed.iter().copied().collect();
        }
    }

    fn description(&self) -> String {
        if self.config.save_execution_state {
            "Saves pin execution state".to_string()
        } else {
            String::new()
        }
    }
}
