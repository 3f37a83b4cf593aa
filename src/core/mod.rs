pub mod dispatch;
pub mod handler;
pub mod realtime;
pub mod tools;

// Re-export commonly used types for convenience
pub use dispatch::{EventDispatcher, ToolCall};
pub use handler::{CommandHandler, Reply};
pub use realtime::{
    ChannelError, ChannelSignal, NegotiationError, Negotiator, SessionState, TransportError,
    TransportSession,
};
pub use tools::{CallError, ParamSpec, ParamType, SessionOptions, ToolRegistry, ToolSpec};
