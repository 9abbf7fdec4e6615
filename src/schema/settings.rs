//! Runtime settings for flow instances, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("max_signal_chain must be at least 1")]
    ZeroSignalChain,
}

/// Knobs shared by every flow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    /// Log a note when an input reaches a node whose signal mode is `Disabled`.
    pub log_on_signal_disabled: bool,
    /// Log a note when an input is passed through a `PassThrough` node.
    pub log_on_signal_passthrough: bool,
    /// Upper bound on routed inputs handled for one external trigger or
    /// timer callback. Guards against reroute cycles.
    pub max_signal_chain: usize,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            log_on_signal_disabled: true,
            log_on_signal_passthrough: true,
            max_signal_chain: 1024,
        }
    }
}

impl FlowSettings {
    /// Load settings from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<FlowSettings, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse settings from a RON string. Missing fields take their defaults.
    pub fn parse_ron(input: &str) -> Result<FlowSettings, SettingsError> {
        let settings: FlowSettings = ron::from_str(input)?;
        if settings.max_signal_chain == 0 {
            return Err(SettingsError::ZeroSignalChain);
        }
        Ok(settings)
    }
}
