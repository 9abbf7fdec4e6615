//! Authored flow assets: typed node configurations and connections,
//! parsed from RON and validated before a flow can be instantiated.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::ids::NodeId;
use super::pin::{SignalMode, MAX_NUMBERED_PINS};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f32 },
    #[error("step_time {0} is too short to schedule; use 0 for no steps")]
    StepTooShort(f32),
    #[error("counter goal must be at least 1")]
    ZeroGoal,
    #[error("{field} must be between 1 and {max} (got {value})", max = MAX_NUMBERED_PINS)]
    PinCount { field: &'static str, value: usize },
    #[error("{kind} nodes do not support signal mode {mode:?}")]
    SignalModeNotAllowed { kind: &'static str, mode: SignalMode },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration on {node}: {source}")]
    Config {
        node: NodeId,
        #[source]
        source: ConfigError,
    },
    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),
    #[error("flow asset has no Start node")]
    MissingStart,
    #[error("flow asset has more than one Start node ({0} and {1})")]
    MultipleStarts(NodeId, NodeId),
    #[error("connection references unknown node {0}")]
    UnknownNode(NodeId),
    #[error("output pin {pin} on {node} is connected more than once")]
    DuplicateConnection { node: NodeId, pin: String },
}

/// Smallest duration treated as "not zero". Anything at or below this
/// completes on the next scheduler tick instead.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Authored configuration of a latent timer node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerNodeConfig {
    completion_time: f32,
    step_time: f32,
}

impl TimerNodeConfig {
    /// Build a validated config. Durations must be finite and non-negative,
    /// and a non-zero step must be longer than `KINDA_SMALL_NUMBER`.
    pub fn new(completion_time: f32, step_time: f32) -> Result<Self, ConfigError> {
        check_duration("completion_time", completion_time)?;
        check_duration("step_time", step_time)?;
        if step_time > 0.0 && step_time <= KINDA_SMALL_NUMBER {
            return Err(ConfigError::StepTooShort(step_time));
        }
        Ok(Self {
            completion_time,
            step_time,
        })
    }

    pub fn completion_time(&self) -> f32 {
        self.completion_time
    }

    pub fn step_time(&self) -> f32 {
        self.step_time
    }

    /// True when the node completes on the next tick rather than after a delay.
    pub fn completes_next_tick(&self) -> bool {
        self.completion_time <= KINDA_SMALL_NUMBER
    }

    pub fn has_steps(&self) -> bool {
        self.step_time > 0.0
    }
}

impl Default for TimerNodeConfig {
    fn default() -> Self {
        Self {
            completion_time: 1.0,
            step_time: 0.0,
        }
    }
}

fn check_duration(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration { field, value })
    }
}

/// How an observer's identity tags are compared with an actor's tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TagMatch {
    /// Any query tag matches an actor tag or one of its parents.
    HasAny,
    /// Every query tag matches an actor tag or one of its parents.
    HasAll,
    /// Any query tag equals an actor tag.
    #[default]
    HasAnyExact,
    /// Every query tag equals an actor tag.
    HasAllExact,
}

/// Authored configuration shared by the world observer nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    pub identity_tags: Vec<String>,
    pub match_type: TagMatch,
    /// Number of successes after which the node completes. 0 = unlimited.
    pub success_limit: u32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            identity_tags: Vec::new(),
            match_type: TagMatch::default(),
            success_limit: 1,
        }
    }
}

/// Authored configuration of an execution sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Number of numbered outputs, "0" upwards.
    pub outputs: usize,
    /// Remember which connected nodes already ran, so a loaded sequence
    /// only triggers connections added since.
    pub save_execution_state: bool,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            outputs: 2,
            save_execution_state: true,
        }
    }
}

/// Authored configuration of a logical OR gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalOrConfig {
    pub inputs: usize,
    /// Executions after which the gate disables itself. 0 = unlimited.
    pub execution_limit: u32,
    /// Whether the gate starts out enabled.
    pub enabled: bool,
}

impl Default for LogicalOrConfig {
    fn default() -> Self {
        Self {
            inputs: 2,
            execution_limit: 1,
            enabled: true,
        }
    }
}

/// Level a Log node writes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogVerbosity {
    Error,
    #[default]
    Warning,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub message: String,
    pub verbosity: LogVerbosity,
    /// Also add the message to the flow's message log.
    pub print_to_log: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            message: "Log!".to_string(),
            verbosity: LogVerbosity::default(),
            print_to_log: true,
        }
    }
}

/// The node types a flow asset can contain.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    Finish,
    Reroute,
    Timer(TimerNodeConfig),
    Counter { goal: u32 },
    OnActorRegistered(ObserverConfig),
    OnActorUnregistered(ObserverConfig),
    ExecutionSequence(SequenceConfig),
    LogicalAnd { inputs: usize },
    LogicalOr(LogicalOrConfig),
    Log(LogConfig),
}

impl NodeKind {
    /// Check the parts of a configuration its type cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            NodeKind::Timer(config) => {
                // Configs built by hand skip the constructor checks.
                TimerNodeConfig::new(config.completion_time, config.step_time).map(|_| ())
            }
            NodeKind::Counter { goal: 0 } => Err(ConfigError::ZeroGoal),
            NodeKind::ExecutionSequence(config) => check_pin_count("outputs", config.outputs),
            NodeKind::LogicalAnd { inputs } => check_pin_count("inputs", *inputs),
            NodeKind::LogicalOr(config) => check_pin_count("inputs", config.inputs),
            _ => Ok(()),
        }
    }

    /// Whether nodes of this kind may be authored with `mode`.
    pub fn allows_signal_mode(&self, mode: SignalMode) -> bool {
        !matches!(
            (self, mode),
            (NodeKind::ExecutionSequence(_), SignalMode::PassThrough)
        )
    }
}

fn check_pin_count(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if (1..=MAX_NUMBERED_PINS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::PinCount { field, value })
    }
}

/// One node of an authored flow.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    pub id: NodeId,
    pub kind: NodeKind,
    pub signal_mode: SignalMode,
}

impl NodeDefinition {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            signal_mode: SignalMode::Enabled,
        }
    }
}

/// A wire from an output pin to an input pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from: NodeId,
    pub output: String,
    pub to: NodeId,
    pub input: String,
}

/// A validated flow asset: unique node ids, exactly one Start node, and
/// at most one connection per output pin.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowAsset {
    pub name: String,
    nodes: Vec<NodeDefinition>,
    connections: Vec<Connection>,
    start: NodeId,
}

// RON shapes differ from the typed ones (plain integer ids, optional
// fields), so we deserialize into intermediate structs first.

#[derive(Debug, Deserialize)]
#[serde(rename = "FlowAsset")]
struct RonFlowAsset {
    #[serde(default)]
    name: String,
    nodes: Vec<RonNode>,
    #[serde(default)]
    connections: Vec<RonConnection>,
}

#[derive(Debug, Deserialize)]
struct RonNode {
    id: u32,
    kind: RonNodeKind,
    #[serde(default)]
    signal_mode: SignalMode,
}

#[derive(Debug, Deserialize)]
enum RonNodeKind {
    Start,
    Finish,
    Reroute,
    Timer {
        #[serde(default = "default_completion_time")]
        completion_time: f32,
        #[serde(default)]
        step_time: f32,
    },
    Counter {
        #[serde(default = "default_goal")]
        goal: u32,
    },
    OnActorRegistered {
        #[serde(default)]
        identity_tags: Vec<String>,
        #[serde(default)]
        match_type: TagMatch,
        #[serde(default = "default_success_limit")]
        success_limit: u32,
    },
    OnActorUnregistered {
        #[serde(default)]
        identity_tags: Vec<String>,
        #[serde(default)]
        match_type: TagMatch,
        #[serde(default = "default_success_limit")]
        success_limit: u32,
    },
    ExecutionSequence {
        #[serde(default = "default_pin_count")]
        outputs: usize,
        #[serde(default = "default_true")]
        save_execution_state: bool,
    },
    LogicalAnd {
        #[serde(default = "default_pin_count")]
        inputs: usize,
    },
    LogicalOr {
        #[serde(default = "default_pin_count")]
        inputs: usize,
        #[serde(default = "default_execution_limit")]
        execution_limit: u32,
        #[serde(default = "default_true")]
        enabled: bool,
    },
    Log {
        #[serde(default = "default_log_message")]
        message: String,
        #[serde(default)]
        verbosity: LogVerbosity,
        #[serde(default = "default_true")]
        print_to_log: bool,
    },
}

#[derive(Debug, Deserialize)]
struct RonConnection {
    from: u32,
    output: String,
    to: u32,
    input: String,
}

fn default_completion_time() -> f32 {
    1.0
}

fn default_goal() -> u32 {
    2
}

fn default_success_limit() -> u32 {
    1
}

fn default_pin_count() -> usize {
    2
}

fn default_execution_limit() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_message() -> String {
    "Log!".to_string()
}

impl RonNodeKind {
    fn into_kind(self) -> Result<NodeKind, ConfigError> {
        let kind = match self {
            Self::Start => NodeKind::Start,
            Self::Finish => NodeKind::Finish,
            Self::Reroute => NodeKind::Reroute,
            Self::Timer {
                completion_time,
                step_time,
            } => NodeKind::Timer(TimerNodeConfig::new(completion_time, step_time)?),
            Self::Counter { goal } => NodeKind::Counter { goal },
            Self::OnActorRegistered {
                identity_tags,
                match_type,
                success_limit,
            } => NodeKind::OnActorRegistered(ObserverConfig {
                identity_tags,
                match_type,
                success_limit,
            }),
            Self::OnActorUnregistered {
                identity_tags,
                match_type,
                success_limit,
            } => NodeKind::OnActorUnregistered(ObserverConfig {
                identity_tags,
                match_type,
                success_limit,
            }),
            Self::ExecutionSequence {
                outputs,
                save_execution_state,
            } => NodeKind::ExecutionSequence(SequenceConfig {
                outputs,
                save_execution_state,
            }),
            Self::LogicalAnd { inputs } => NodeKind::LogicalAnd { inputs },
            Self::LogicalOr {
                inputs,
                execution_limit,
                enabled,
            } => NodeKind::LogicalOr(LogicalOrConfig {
                inputs,
                execution_limit,
                enabled,
            }),
            Self::Log {
                message,
                verbosity,
                print_to_log,
            } => NodeKind::Log(LogConfig {
                message,
                verbosity,
                print_to_log,
            }),
        };
        kind.validate()?;
        Ok(kind)
    }
}

impl FlowAsset {
    /// Validate nodes and connections into a flow asset.
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<NodeDefinition>,
        connections: Vec<Connection>,
    ) -> Result<FlowAsset, AssetError> {
        let mut ids = FxHashSet::default();
        let mut start: Option<NodeId> = None;

        for def in &nodes {
            if !ids.insert(def.id) {
                return Err(AssetError::DuplicateNode(def.id));
            }
            if let NodeKind::Start = def.kind {
                if let Some(first) = start {
                    return Err(AssetError::MultipleStarts(first, def.id));
                }
                start = Some(def.id);
            }
            def.kind.validate().map_err(|source| AssetError::Config {
                node: def.id,
                source,
            })?;
            if !def.kind.allows_signal_mode(def.signal_mode) {
                return Err(AssetError::Config {
                    node: def.id,
                    source: ConfigError::SignalModeNotAllowed {
                        kind: "ExecutionSequence",
                        mode: def.signal_mode,
                    },
                });
            }
        }

        let start = start.ok_or(AssetError::MissingStart)?;

        let mut wired: FxHashMap<(NodeId, &str), NodeId> = FxHashMap::default();
        for conn in &connections {
            for id in [conn.from, conn.to] {
                if !ids.contains(&id) {
                    return Err(AssetError::UnknownNode(id));
                }
            }
            if wired.insert((conn.from, conn.output.as_str()), conn.to).is_some() {
                return Err(AssetError::DuplicateConnection {
                    node: conn.from,
                    pin: conn.output.clone(),
                });
            }
        }

        Ok(FlowAsset {
            name: name.into(),
            nodes,
            connections,
            start,
        })
    }

    /// Load a flow asset from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<FlowAsset, AssetError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a flow asset from a RON string.
    pub fn parse_ron(input: &str) -> Result<FlowAsset, AssetError> {
        let raw: RonFlowAsset = ron::from_str(input)?;

        let mut nodes = Vec::with_capacity(raw.nodes.len());
        for node in raw.nodes {
            let id = NodeId(node.id);
            let kind = node
                .kind
                .into_kind()
                .map_err(|source| AssetError::Config { node: id, source })?;
            nodes.push(NodeDefinition {
                id,
                kind,
                signal_mode: node.signal_mode,
            });
        }

        let connections = raw
            .connections
            .into_iter()
            .map(|c| Connection {
                from: NodeId(c.from),
                output: c.output,
                to: NodeId(c.to),
                input: c.input,
            })
            .collect();

        Self::new(raw.name, nodes, connections)
    }

    pub fn nodes(&self) -> &[NodeDefinition] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn start_node(&self) -> NodeId {
        self.start
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|def| def.id == id)
    }
}
