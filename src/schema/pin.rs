//! Pins, output signals, and node activation bookkeeping.

use serde::{Deserialize, Serialize};

use super::ids::NodeId;

/// Default input pin of most nodes.
pub const IN: &str = "In";
/// Default output pin of most nodes.
pub const OUT: &str = "Out";

/// Upper bound on numbered pins ("0", "1", ...) a node can carry.
pub const MAX_NUMBERED_PINS: usize = 16;

static NUMBERED: [&str; MAX_NUMBERED_PINS] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15",
];

/// The first `count` numbered pin names, capped at `MAX_NUMBERED_PINS`.
pub fn numbered_pins(count: usize) -> &'static [&'static str] {
    &NUMBERED[..count.min(MAX_NUMBERED_PINS)]
}

/// True for pin names made of digits only.
pub fn is_numbered(pin: &str) -> bool {
    !pin.is_empty() && pin.bytes().all(|b| b.is_ascii_digit())
}

/// A typed output of a node. Each variant maps to exactly one output pin
/// and says whether firing it ends the node's current activation.
pub trait OutputPin: Copy {
    fn pin_name(self) -> &'static str;

    /// True if firing this output finishes the node (it is deactivated and
    /// cleaned up before the signal is routed).
    fn finishes(self) -> bool;
}

/// Outputs of the latent timer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerOutput {
    Completed,
    Step,
    Skipped,
}

impl TimerOutput {
    pub const ALL: [&'static str; 3] = ["Completed", "Step", "Skipped"];
}

impl OutputPin for TimerOutput {
    fn pin_name(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Step => "Step",
            Self::Skipped => "Skipped",
        }
    }

    fn finishes(self) -> bool {
        !matches!(self, Self::Step)
    }
}

/// Outputs of the counter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterOutput {
    Zero,
    Step,
    Goal,
    Skipped,
}

impl CounterOutput {
    pub const ALL: [&'static str; 4] = ["Zero", "Step", "Goal", "Skipped"];
}

impl OutputPin for CounterOutput {
    fn pin_name(self) -> &'static str {
        match self {
            Self::Zero => "Zero",
            Self::Step => "Step",
            Self::Goal => "Goal",
            Self::Skipped => "Skipped",
        }
    }

    fn finishes(self) -> bool {
        !matches!(self, Self::Step)
    }
}

/// Outputs of the world observer nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObserverOutput {
    Success,
    Completed,
    Stopped,
}

impl ObserverOutput {
    pub const ALL: [&'static str; 3] = ["Success", "Completed", "Stopped"];
}

impl OutputPin for ObserverOutput {
    fn pin_name(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Completed => "Completed",
            Self::Stopped => "Stopped",
        }
    }

    fn finishes(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// A single output emission: the pin name plus the "interrupts other
/// outputs" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub pin: &'static str,
    pub finish: bool,
}

impl<O: OutputPin> From<O> for Signal {
    fn from(output: O) -> Self {
        Signal {
            pin: output.pin_name(),
            finish: output.finishes(),
        }
    }
}

/// How a node reacts to input activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignalMode {
    /// Node logic is fully executed.
    #[default]
    Enabled,
    /// Inputs are ignored; a loaded node is finished straight away.
    Disabled,
    /// Node logic is skipped; every connected output fires and the node finishes.
    PassThrough,
}

/// Lifecycle state of a node instance inside a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActivationState {
    #[default]
    NeverActivated,
    Active,
    Completed,
    Aborted,
}

/// Record of an output pin that fired, kept by the flow for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiredOutput {
    pub node: NodeId,
    pub pin: String,
    /// Scheduler time at which the output fired, in seconds.
    pub time: f64,
}
