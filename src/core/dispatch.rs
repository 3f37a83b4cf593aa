//! Event dispatcher: one per session.
//!
//! Announces the tool table once the model reports `session.created` and
//! routes every function call found in a `response.done` to the command
//! handler, in output order. A failing call is logged and skipped; the
//! remaining calls of the same response still run.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::handler::CommandHandler;
use crate::core::realtime::openai::{ClientEvent, ConversationItem, ServerEvent};
use crate::core::tools::{CallError, SessionOptions, ToolRegistry};
use crate::domain::DomainModule;

/// A parsed, schema-checked function call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub call_id: Option<String>,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            call_id: None,
            arguments,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// Parse a `function_call` output item and validate it against the
    /// registry. Missing arguments read as an empty object.
    pub fn from_item(item: &ConversationItem, registry: &ToolRegistry) -> Result<Self, CallError> {
        let name = item
            .name
            .as_deref()
            .ok_or_else(|| CallError::malformed("<unnamed>", "function call has no name"))?;

        if registry.get(name).is_none() {
            return Err(CallError::UnknownTool(name.to_string()));
        }

        let raw = item
            .arguments
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or("{}");
        let arguments: Value = serde_json::from_str(raw)
            .map_err(|e| CallError::malformed(name, format!("invalid JSON arguments: {e}")))?;

        registry.validate(name, &arguments)?;

        Ok(Self {
            name: name.to_string(),
            call_id: item.call_id.clone(),
            arguments,
        })
    }
}

/// Per-session protocol state.
#[derive(Debug)]
pub struct EventDispatcher {
    registry: Arc<ToolRegistry>,
    options: SessionOptions,
    session_ready: bool,
    tools_configured: bool,
}

impl EventDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, options: SessionOptions) -> Self {
        Self {
            registry,
            options,
            session_ready: false,
            tools_configured: false,
        }
    }

    pub fn is_session_ready(&self) -> bool {
        self.session_ready
    }

    pub fn tools_configured(&self) -> bool {
        self.tools_configured
    }

    /// The `session.update` never reached the channel; announce again on the
    /// next `session.created`.
    pub fn tools_not_delivered(&mut self) {
        if self.tools_configured {
            warn!("Tool configuration was not delivered");
            self.tools_configured = false;
        }
    }

    /// Process one inbound event; returns the events to send, in order.
    pub fn handle<D: DomainModule>(
        &mut self,
        event: &ServerEvent,
        handler: &mut CommandHandler<D>,
    ) -> Vec<ClientEvent> {
        match event {
            ServerEvent::SessionCreated { session } => {
                self.session_ready = true;
                if self.tools_configured {
                    debug!("Duplicate session.created, tools already configured");
                    return Vec::new();
                }
                self.tools_configured = true;
                info!(
                    session_id = session.id.as_deref().unwrap_or("unknown"),
                    tools = self.registry.len(),
                    "Session created, configuring tools"
                );
                vec![self.registry.session_update(&self.options)]
            }
            ServerEvent::SessionUpdated { session } => {
                debug!(tools = session.tools.len(), "Session updated");
                Vec::new()
            }
            ServerEvent::ResponseDone { response } => {
                let mut outbound = Vec::new();
                for item in response.function_calls() {
                    outbound.extend(self.dispatch_call(item, handler));
                }
                outbound
            }
            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = error.code.as_deref().unwrap_or(""),
                    "Realtime API error: {}",
                    error.message
                );
                Vec::new()
            }
            ServerEvent::Other => Vec::new(),
        }
    }

    fn dispatch_call<D: DomainModule>(
        &self,
        item: &ConversationItem,
        handler: &mut CommandHandler<D>,
    ) -> Vec<ClientEvent> {
        let result =
            ToolCall::from_item(item, &self.registry).and_then(|call| handler.handle(&call));

        match result {
            Ok(events) => events,
            Err(CallError::UnknownTool(name)) => {
                warn!(tool = %name, "Ignoring call to unknown tool");
                Vec::new()
            }
            Err(e) => {
                warn!("Skipping function call: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Cart;
    use serde_json::json;

    fn dispatcher() -> EventDispatcher {
        EventDispatcher::new(
            Arc::new(<Cart as DomainModule>::registry()),
            SessionOptions::default(),
        )
    }

    fn session_created() -> ServerEvent {
        ServerEvent::parse(&json!({ "type": "session.created", "session": {} }).to_string())
            .unwrap()
    }

    #[test]
    fn test_tools_announced_once() {
        let mut dispatcher = dispatcher();
        let mut handler = CommandHandler::new(Cart::default());

        assert_eq!(dispatcher.handle(&session_created(), &mut handler).len(), 1);
        assert!(dispatcher.tools_configured());
        assert!(dispatcher.handle(&session_created(), &mut handler).is_empty());
    }

    #[test]
    fn test_undelivered_tools_are_announced_again() {
        let mut dispatcher = dispatcher();
        let mut handler = CommandHandler::new(Cart::default());

        dispatcher.handle(&session_created(), &mut handler);
        dispatcher.tools_not_delivered();
        assert!(!dispatcher.tools_configured());

        let outbound = dispatcher.handle(&session_created(), &mut handler);
        assert!(matches!(outbound[..], [ClientEvent::SessionUpdate { .. }]));
        assert!(dispatcher.tools_configured());
    }
}
