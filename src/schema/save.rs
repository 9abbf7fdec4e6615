//! Save records for flow instances. Persisted as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::ids::NodeId;
use super::pin::ActivationState;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonSer(#[from] ron::Error),
}

/// Per-node persisted fields. Timer handles are never saved, only the
/// durations needed to re-arm them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum NodeSaveState {
    #[default]
    Stateless,
    Timer {
        remaining_completion_time: f32,
        remaining_step_time: f32,
        sum_of_steps: f32,
    },
    Counter {
        current_sum: i32,
    },
    Observer {
        success_count: u32,
    },
    /// Nodes an execution sequence already triggered.
    Sequence {
        executed: Vec<NodeId>,
    },
    LogicalAnd {
        executed_inputs: Vec<String>,
    },
    LogicalOr {
        enabled: bool,
        execution_count: u32,
    },
}

/// Saved record of one node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSaveData {
    pub node: NodeId,
    pub activation: ActivationState,
    pub state: NodeSaveState,
}

/// Saved record of a whole flow instance. Connections are not saved, so an
/// asset can be rewired between releases without breaking old saves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSaveData {
    pub asset: String,
    pub finished: bool,
    pub nodes: Vec<NodeSaveData>,
}

impl FlowSaveData {
    pub fn to_ron(&self) -> Result<String, SaveError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn from_ron(input: &str) -> Result<FlowSaveData, SaveError> {
        Ok(ron::from_str(input)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SaveError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<FlowSaveData, SaveError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSaveData> {
        self.nodes.iter().find(|n| n.node == id)
    }
}
