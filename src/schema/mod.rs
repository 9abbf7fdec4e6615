//! Plain data shared between the runtime and the host: ids, pins, authored
//! assets, settings, and save records.

pub mod asset;
pub mod ids;
pub mod pin;
pub mod save;
pub mod settings;
