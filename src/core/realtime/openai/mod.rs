//! OpenAI Realtime API over WebRTC.
//!
//! Session establishment is two HTTP calls: an ephemeral client secret is
//! fetched from a local token endpoint, then the SDP offer is posted to the
//! Realtime endpoint with that secret as bearer token. Afterwards all control
//! traffic runs as JSON events on the `oai-events` data channel.
//!
//! # Supported Models
//!
//! - `gpt-4o-realtime-preview-2024-12-17` (default)
//! - `gpt-4o-realtime-preview`
//! - `gpt-4o-mini-realtime-preview`
//! - `gpt-4o-mini-realtime-preview-2024-12-17`

mod config;
pub mod messages;
mod negotiation;

pub use config::{
    DEFAULT_TOKEN_URL, DEFAULT_TOOL_CHOICE, OAI_EVENTS_CHANNEL, OPENAI_REALTIME_URL,
    OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
pub use messages::{
    ApiError, ClientEvent, ConversationItem, Response, ResponseConfig, ServerEvent, Session,
    SessionConfig, ToolDef,
};
pub use negotiation::{Credential, NegotiationEndpoints, Negotiator, SDP_CONTENT_TYPE};
