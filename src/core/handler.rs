//! Command handler: applies tool calls to the domain store and turns the
//! outcome into client events for the model.

use serde_json::Value;
use tracing::{debug, info};

use crate::core::dispatch::ToolCall;
use crate::core::realtime::openai::ClientEvent;
use crate::core::tools::CallError;
use crate::domain::DomainModule;

/// What a domain wants said back after a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Ask the model to speak this instruction
    Narrate(String),
    /// Return data on the function result channel. `summary` is narrated
    /// instead when the call has no id to answer.
    Output { output: Value, summary: String },
    /// Nothing to send
    Silent,
}

/// Single writer of the domain store.
pub struct CommandHandler<D: DomainModule> {
    domain: D,
}

impl<D: DomainModule> CommandHandler<D> {
    pub fn new(domain: D) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    pub fn snapshot(&self) -> D::Snapshot {
        self.domain.snapshot()
    }

    /// Apply a validated call and build the follow-up events.
    pub fn handle(&mut self, call: &ToolCall) -> Result<Vec<ClientEvent>, CallError> {
        let reply = self.domain.apply_call(call)?;
        info!(tool = %call.name, domain = %D::KIND, "Applied tool call");

        let events = match reply {
            Reply::Narrate(text) => vec![ClientEvent::narration(text)],
            Reply::Output { output, summary } => match &call.call_id {
                Some(call_id) => vec![
                    ClientEvent::function_output(call_id.as_str(), output.to_string()),
                    ClientEvent::response_create(),
                ],
                None => {
                    debug!(tool = %call.name, "No call_id, narrating summary instead");
                    vec![ClientEvent::narration(summary)]
                }
            },
            Reply::Silent => Vec::new(),
        };
        Ok(events)
    }

    /// Apply a direct UI action. Never produces model traffic.
    pub fn apply_action(&mut self, action: D::Action) {
        debug!(?action, domain = %D::KIND, "Applying direct action");
        self.domain.apply_action(action);
    }
}
