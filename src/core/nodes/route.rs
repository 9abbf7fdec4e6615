//! Route nodes: Start, Finish, Reroute.

use crate::core::node::{FlowNode, NodeContext};
use crate::schema::pin::OUT;

/// Execution of a flow always begins here. No inputs; fires "Out" and finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartNode;

impl FlowNode for StartNode {
    fn kind_name(&self) -> &'static str {
        "Start"
    }

    fn input_pins(&self) -> &'static [&'static str] {
        &[]
    }

    fn execute_input(&mut self, _pin: &str, ctx: &mut NodeContext<'_>) {
        ctx.trigger_output(OUT, true);
    }
}

/// Reaching this node finishes the flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishNode;

impl FlowNode for FinishNode {
    fn kind_name(&self) -> &'static str {
        "Finish"
    }

    fn output_pins(&self) -> &'static [&'static str] {
        &[]
    }

    fn execute_input(&mut self, _pin: &str, ctx: &mut NodeContext<'_>) {
        ctx.finish();
    }

    fn can_finish_graph(&self) -> bool {
        true
    }
}

/// Passes its input straight through.
#[derive(Debug, Clone, Copy, Default)]
pub struct RerouteNode;

impl FlowNode for RerouteNode {
    fn kind_name(&self) -> &'static str {
        "Reroute"
    }

    fn execute_input(&mut self, _pin: &str, ctx: &mut NodeContext<'_>) {
        ctx.trigger_output(OUT, true);
    }
}
