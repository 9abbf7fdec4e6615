//! Built-in node types.

pub mod counter;
pub mod log;
pub mod logic;
pub mod observer;
pub mod route;
pub mod sequence;
pub mod timer;

use crate::core::node::FlowNode;
use crate::schema::asset::NodeKind;

pub use counter::CounterNode;
pub use log::LogNode;
pub use logic::{LogicalAndNode, LogicalOrNode};
pub use observer::{ObserverKind, ObserverNode};
pub use route::{FinishNode, RerouteNode, StartNode};
pub use sequence::ExecutionSequenceNode;
pub use timer::{TimerError, TimerNode};

/// Create a fresh node instance for an authored node kind.
pub fn instantiate(kind: &NodeKind) -> Box<dyn FlowNode> {
    match kind {
        NodeKind::Start => Box::new(StartNode),
        NodeKind::Finish => Box::new(FinishNode),
        NodeKind::Reroute => Box::new(RerouteNode),
        NodeKind::Timer(config) => Box::new(TimerNode::new(*config)),
        NodeKind::Counter { goal } => Box::new(CounterNode::new(*goal)),
        NodeKind::OnActorRegistered(config) => {
            Box::new(ObserverNode::new(ObserverKind::Registered, config.clone()))
        }
        NodeKind::OnActorUnregistered(config) => {
            Box::new(ObserverNode::new(ObserverKind::Unregistered, config.clone()))
        }
        NodeKind::ExecutionSequence(config) => Box::new(ExecutionSequenceNode::new(*config)),
        NodeKind::LogicalAnd { inputs } => Box::new(LogicalAndNode::new(*inputs)),
        NodeKind::LogicalOr(config) => Box::new(LogicalOrNode::new(*config)),
        NodeKind::Log(config) => Box::new(LogNode::new(config.clone())),
    }
}
