//! Counter node: counts increments towards a goal.

use crate::core::node::{FlowNode, NodeContext};
use crate::schema::pin::CounterOutput;
use crate::schema::save::NodeSaveState;

pub const INCREMENT: &str = "Increment";
pub const DECREMENT: &str = "Decrement";
pub const SKIP: &str = "Skip";

#[derive(Debug, Clone)]
pub struct CounterNode {
    goal: u32,
    current_sum: i32,
}

impl CounterNode {
    pub fn new(goal: u32) -> Self {
        Self {
            goal,
            current_sum: 0,
        }
    }

    pub fn current_sum(&self) -> i32 {
        self.current_sum
    }
}

impl FlowNode for CounterNode {
    fn kind_name(&self) -> &'static str {
        "Counter"
    }

    fn input_pins(&self) -> &'static [&'static str] {
        &[INCREMENT, DECREMENT, SKIP]
    }

    fn output_pins(&self) -> &'static [&'static str] {
        &CounterOutput::ALL
    }

    fn execute_input(&mut self, pin: &str, ctx: &mut NodeContext<'_>) {
        match pin {
            INCREMENT => {
                self.current_sum = self.current_sum.saturating_add(1);
                if i64::from(self.current_sum) == i64::from(self.goal) {
                    ctx.emit(CounterOutput::Goal);
                } else {
                    ctx.emit(CounterOutput::Step);
                }
            }
            DECREMENT => {
                self.current_sum = self.current_sum.saturating_sub(1);
                if self.current_sum == 0 {
                    ctx.emit(CounterOutput::Zero);
                } else {
                    ctx.emit(CounterOutput::Step);
                }
            }
            SKIP => ctx.emit(CounterOutput::Skipped),
            _ => {}
        }
    }

    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) {
        self.current_sum = 0;
    }

    fn save_state(&self) -> NodeSaveState {
        NodeSaveState::Counter {
            current_sum: self.current_sum,
        }
    }

    fn load_state(&mut self, state: &NodeSaveState) {
        if let NodeSaveState::Counter { current_sum } = *state {
            self.current_sum = current_sum;
        }
    }

    fn description(&self) -> String {
        self.goal.to_string()
    }

    fn status(&self, _ctx: &NodeContext<'_>) -> String {
        self.current_sum.to_string()
    }
}
