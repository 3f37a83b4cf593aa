//! OpenAI Realtime event types carried on the `oai-events` data channel.
//!
//! All events are JSON objects discriminated by `type`.
//!
//! Client events (sent to the model):
//! - session.update - Announce tools and session options
//! - conversation.item.create - Return a function call result
//! - response.create - Ask the model to respond (optionally with instructions)
//!
//! Server events (received from the model):
//! - session.created - Session created
//! - session.updated - Session configuration updated
//! - response.done - Response complete, possibly carrying function calls
//! - error - Error occurred
//!
//! Every other server event type is accepted and mapped to [`ServerEvent::Other`].

use serde::{Deserialize, Serialize};

/// `type` of a conversation item requesting a function call.
pub const FUNCTION_CALL_ITEM: &str = "function_call";

/// `type` of a conversation item returning a function call result.
pub const FUNCTION_CALL_OUTPUT_ITEM: &str = "function_call_output";

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Tool definition in wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item, used both for inbound response output and for
/// outbound function call results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts; kept opaque since nothing here reads message text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name for a function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// JSON-encoded arguments for a function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function output for a function call result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    pub fn is_function_call(&self) -> bool {
        self.item_type == FUNCTION_CALL_ITEM
    }

    /// A `function_call_output` item answering `call_id`.
    pub fn function_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: FUNCTION_CALL_OUTPUT_ITEM.to_string(),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }
}

/// Response configuration sent with `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// =============================================================================
// Client Events
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        item: ConversationItem,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
}

impl ClientEvent {
    /// `response.create` asking the model to speak `instructions`.
    pub fn narration(instructions: impl Into<String>) -> Self {
        ClientEvent::ResponseCreate {
            response: Some(ResponseConfig {
                instructions: Some(instructions.into()),
            }),
        }
    }

    /// Bare `response.create`, letting the model answer from the conversation.
    pub fn response_create() -> Self {
        ClientEvent::ResponseCreate { response: None }
    }

    /// `conversation.item.create` carrying a function call result.
    pub fn function_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_output(call_id, output),
            previous_item_id: None,
        }
    }

    /// Wire name of the event, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate { .. } => "response.create",
        }
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error { error: ApiError },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: Session,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: Session,
    },

    /// Response complete
    #[serde(rename = "response.done")]
    ResponseDone { response: Response },

    /// Any event type this client does not act on
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Parse one channel message.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// API error details.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Session information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolDef>,
}

/// Completed response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Output items; absent and `null` both read as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub output: Vec<ConversationItem>,
}

impl Response {
    /// Function call items in output order.
    pub fn function_calls(&self) -> impl Iterator<Item = &ConversationItem> {
        self.output.iter().filter(|item| item.is_function_call())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ConversationItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ConversationItem>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_narration_serialization() {
        let event = ClientEvent::narration("Say hello");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "response.create", "response": {"instructions": "Say hello"}})
        );
    }

    #[test]
    fn test_bare_response_create_serialization() {
        let value = serde_json::to_value(ClientEvent::response_create()).unwrap();
        assert_eq!(value, json!({"type": "response.create"}));
    }

    #[test]
    fn test_function_output_serialization() {
        let event = ClientEvent::function_output("call_1", "{\"total\":0}");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "function_call_output",
                    "call_id": "call_1",
                    "output": "{\"total\":0}"
                }
            })
        );
        assert_eq!(event.event_type(), "conversation.item.create");
    }

    #[test]
    fn test_session_update_omits_unset_fields() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                tools: Some(vec![]),
                tool_choice: Some("auto".into()),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "session.update", "session": {"tools": [], "tool_choice": "auto"}})
        );
    }

    #[test]
    fn test_parse_session_created() {
        let event = ServerEvent::parse(
            r#"{"type":"session.created","event_id":"ev_1","session":{"id":"sess_1","object":"realtime.session","model":"gpt-4o"}}"#,
        )
        .unwrap();
        match event {
            ServerEvent::SessionCreated { session } => {
                assert_eq!(session.id.as_deref(), Some("sess_1"));
            }
            other => panic!("Expected SessionCreated, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_response_done_with_function_calls() {
        let event = ServerEvent::parse(
            r#"{"type":"response.done","response":{"id":"resp_1","status":"completed","output":[
                {"type":"message","role":"assistant","content":[{"type":"audio","transcript":"ok"}]},
                {"type":"function_call","name":"add_track","call_id":"c1","arguments":"{\"track_id\":\"1\"}"}
            ]}}"#,
        )
        .unwrap();
        let ServerEvent::ResponseDone { response } = event else {
            panic!("Expected ResponseDone");
        };
        let calls: Vec<_> = response.function_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name.as_deref(), Some("add_track"));
        assert_eq!(calls[0].call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_parse_response_done_null_output() {
        let event = ServerEvent::parse(r#"{"type":"response.done","response":{"output":null}}"#)
            .unwrap();
        let ServerEvent::ResponseDone { response } = event else {
            panic!("Expected ResponseDone");
        };
        assert!(response.output.is_empty());
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let event =
            ServerEvent::parse(r#"{"type":"response.audio_transcript.delta","delta":"hi"}"#)
                .unwrap();
        assert_eq!(event, ServerEvent::Other);
    }

    #[test]
    fn test_parse_error_event() {
        let event = ServerEvent::parse(
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad tool"}}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.error_type, "invalid_request_error");
                assert_eq!(error.message, "bad tool");
            }
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(ServerEvent::parse(r#"{"session":{}}"#).is_err());
        assert!(ServerEvent::parse("not json").is_err());
    }
}
