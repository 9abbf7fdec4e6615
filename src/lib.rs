//! Narrative Flow: a runtime for latent flow graphs in games.
//!
//! Flow assets are authored in RON as nodes wired output-to-input. A
//! `FlowInstance` runs one asset against a `FlowWorld` (a deterministic
//! timer queue plus an actor registry), routing signals between nodes.
//! Latent nodes such as the Timer keep working across ticks and survive a
//! save/load round trip.

pub mod core;
pub mod schema;
