//! Logical gates over numbered input pins.

use rustc_hash::FxHashSet;

use crate::core::node::{FlowNode, NodeContext};
use crate::schema::asset::LogicalOrConfig;
use crate::schema::pin::{self, MAX_NUMBERED_PINS};
use crate::schema::save::NodeSaveState;

pub const ENABLE: &str = "Enable";
pub const DISABLE: &str = "Disable";

static OR_PINS: [&str; MAX_NUMBERED_PINS + 2] = [
    ENABLE, DISABLE, "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13",
    "14", "15",
];

/// Fires once every numbered input has been executed during the activation.
#[derive(Debug, Clone)]
pub struct LogicalAndNode {
    inputs: usize,
    executed: FxHashSet<&'static str>,
}

impl LogicalAndNode {
    pub fn new(inputs: usize) -> Self {
        Self {
            inputs: inputs.clamp(1, MAX_NUMBERED_PINS),
            executed: FxHashSet::default(),
        }
    }

    /// Executed inputs in pin order.
    pub fn executed_inputs(&self) -> Vec<&'static str> {
        self.input_pins()
            .iter()
            .copied()
            .filter(|p| self.executed.contains(p))
            .collect()
    }
}

impl FlowNode for LogicalAndNode {
    fn kind_name(&self) -> &'static str {
        "LogicalAnd"
    }

    fn input_pins(&self) -> &'static [&'static str] {
        pin::numbered_pins(self.inputs)
    }

    fn execute_input(&mut self, pin: &str, ctx: &mut NodeContext<'_>) {
        let Some(input) = self.input_pins().iter().copied().find(|p| *p == pin) else {
            return;
        };
        self.executed.insert(input);
        if self.executed.len() == self.inputs {
            ctx.trigger_output(pin::OUT, true);
        }
    }

    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) {
        self.executed.clear();
    }

    fn save_state(&self) -> NodeSaveState {
        NodeSaveState::LogicalAnd {
            executed_inputs: self
                .executed_inputs()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    fn load_state(&mut self, state: &NodeSaveState) {
        if let NodeSaveState::LogicalAnd { executed_inputs } = state {
            let pins = self.input_pins();
            self.executed = executed_inputs
                .iter()
                .filter_map(|name| pins.iter().copied().find(|p| *p == name.as_str()))
                .collect();
        }
    }
}

/// Passes on any numbered input while enabled. Reaching the execution limit
/// disables the gate until its Enable input is triggered.
#[derive(Debug, Clone)]
pub struct LogicalOrNode {
    config: LogicalOrConfig,
    enabled: bool,
    execution_count: u32,
}

impl LogicalOrNode {
    pub fn new(config: LogicalOrConfig) -> Self {
        Self {
            config: LogicalOrConfig {
                inputs: config.inputs.clamp(1, MAX_NUMBERED_PINS),
                ..config
            },
            enabled: config.enabled,
            execution_count: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }
}

impl FlowNode for LogicalOrNode {
    fn kind_name(&self) -> &'static str {
        "LogicalOr"
    }

    fn input_pins(&self) -> &'static [&'static str] {
        &OR_PINS[..self.config.inputs + 2]
    }

    fn execute_input(&mut self, pin: &str, ctx: &mut NodeContext<'_>) {
        match pin {
            ENABLE => {
                if !self.enabled {
                    self.execution_count = 0;
                    self.enabled = true;
                }
            }
            DISABLE => {
                if self.enabled {
                    self.enabled = false;
                    ctx.finish();
                }
            }
            numbered if self.enabled && pin::is_numbered(numbered) => {
                self.execution_count = self.execution_count.saturating_add(1);
                let limit = self.config.execution_limit;
                if limit > 0 && self.execution_count == limit {
                    self.enabled = false;
                }
                ctx.trigger_output(pin::OUT, true);
            }
            _ => {}
        }
    }

    fn save_state(&self) -> NodeSaveState {
        NodeSaveState::LogicalOr {
            enabled: self.enabled,
            execution_count: self.execution_count,
        }
    }

    fn load_state(&mut self, state: &NodeSaveState) {
        if let NodeSaveState::LogicalOr {
            enabled,
            execution_count,
        } = *state
        {
            self.enabled = enabled;
            self.execution_count = execution_count;
        }
    }

    fn description(&self) -> String {
        match self.config.execution_limit {
            0 => String::new(),
            limit => format!("Limit: {}", limit),
        }
    }

    fn status(&self, _ctx: &NodeContext<'_>) -> String {
        if self.enabled {
            self.execution_count.to_string()
        } else {
            "Disabled".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids::NodeId;

    fn press(node: &mut dyn FlowNode, pin: &str) -> (Vec<&'static str>, bool) {
        let mut ctx = NodeContext::detached(NodeId(6));
        node.execute_input(pin, &mut ctx);
        let effects = ctx.into_effects();
        let pins = effects.signals.iter().map(|s| s.pin).collect();
        (pins, effects.finish_requested)
    }

    #[test]
    fn and_waits_for_every_input() {
        let mut node = LogicalAndNode::new(3);
        assert_eq!(node.input_pins(), ["0", "1", "2"]);
        assert!(press(&mut node, "0").0.is_empty());
        assert!(press(&mut node, "0").0.is_empty());
        assert!(press(&mut node, "2").0.is_empty());
        assert_eq!(press(&mut node, "1").0, vec!["Out"]);
    }

    #[test]
    fn and_state_survives_save() {
        let mut node = LogicalAndNode::new(2);
        press(&mut node, "1");
        let state = node.save_state();
        assert_eq!(
            state,
            NodeSaveState::LogicalAnd {
                executed_inputs: vec!["1".to_string()]
            }
        );

        let mut loaded = LogicalAndNode::new(2);
        loaded.load_state(&state);
        assert_eq!(loaded.executed_inputs(), vec!["1"]);
        assert_eq!(press(&mut loaded, "0").0, vec!["Out"]);

        loaded.cleanup(&mut NodeContext::detached(NodeId(6)));
        assert!(loaded.executed_inputs().is_empty());
    }

    #[test]
    fn or_limit_disables_until_enabled() {
        let mut node = LogicalOrNode::new(LogicalOrConfig {
            inputs: 2,
            execution_limit: 2,
            enabled: true,
        });
        assert_eq!(node.input_pins(), ["Enable", "Disable", "0", "1"]);
        assert_eq!(press(&mut node, "0").0, vec!["Out"]);
        assert_eq!(press(&mut node, "1").0, vec!["Out"]);
        assert!(!node.is_enabled());
        assert!(press(&mut node, "0").0.is_empty());

        press(&mut node, ENABLE);
        assert_eq!(node.execution_count(), 0);
        assert_eq!(press(&mut node, "1").0, vec!["Out"]);
    }

    #[test]
    fn or_unlimited_and_disable() {
        let mut node = LogicalOrNode::new(LogicalOrConfig {
            execution_limit: 0,
            ..LogicalOrConfig::default()
        });
        for _ in 0..5 {
            assert_eq!(press(&mut node, "0").0, vec!["Out"]);
        }
        assert_eq!(node.description(), "");
        assert_eq!(press(&mut node, DISABLE), (vec![], true));
        assert_eq!(press(&mut node, DISABLE), (vec![], false));
        assert_eq!(node.status(&NodeContext::detached(NodeId(6))), "Disabled");
    }

    #[test]
    fn or_state_survives_save() {
        let mut node = LogicalOrNode::new(LogicalOrConfig::default());
        press(&mut node, "0");
        assert_eq!(
            node.save_state(),
            NodeSaveState::LogicalOr {
                enabled: false,
                execution_count: 1
            }
        );

        let mut loaded = LogicalOrNode::new(LogicalOrConfig::default());
        loaded.load_state(&node.save_state());
        assert!(press(&mut loaded, "1").0.is_empty());
    }
}
