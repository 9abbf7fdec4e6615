//! Log node: writes an authored message, then passes the signal on.

use tracing::{debug, error, info, trace, warn};

use crate::core::node::{FlowNode, NodeContext};
use crate::schema::asset::{LogConfig, LogVerbosity};
use crate::schema::pin;

#[derive(Debug, Clone)]
pub struct LogNode {
    config: LogConfig,
}

impl LogNode {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }
}

impl FlowNode for LogNode {
    fn kind_name(&self) -> &'static str {
        "Log"
    }

    fn execute_input(&mut self, _pin: &str, ctx: &mut NodeContext<'_>) {
        let node = ctx.node();
        let message = &self.config.message;
        match self.config.verbosity {
            LogVerbosity::Error => error!(%node, "{}", message),
            LogVerbosity::Warning => warn!(%node, "{}", message),
            LogVerbosity::Info => info!(%node, "{}", message),
            LogVerbosity::Debug => debug!(%node, "{}", message),
            LogVerbosity::Trace => trace!(%node, "{}", message),
        }
        if self.config.print_to_log {
            ctx.note(message.clone());
        }
        ctx.trigger_output(pin::OUT, true);
    }

    fn description(&self) -> String {
        self.config.message.clone()
    }
}
