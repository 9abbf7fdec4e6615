//! Flow runtime: timer scheduling, nodes, world registry, and flow instances.

pub mod flow;
pub mod node;
pub mod nodes;
pub mod scheduler;
pub mod world;
