//! Base traits and types for the realtime transport.
//!
//! The transport is split into capabilities so that the session logic can be
//! driven by a real WebRTC peer (feature `live`) or by an in-process fake:
//!
//! - [`MediaDevices`] acquires the local microphone track
//! - [`PeerConnector`] opens a peer connection
//! - [`PeerConnection`] attaches media, opens the event channel and produces
//!   the SDP offer
//! - [`EventChannel`] writes serialized client events
//!
//! Inbound channel activity is delivered as [`ChannelSignal`]s through a
//! [`Subscription`]. Cancelling the subscription is the unregistration step of
//! teardown: nothing is surfaced after it.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised by a transport capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Local media could not be acquired or attached
    #[error("Media error: {0}")]
    Media(String),

    /// Peer connection could not be created or closed
    #[error("Connection error: {0}")]
    Connection(String),

    /// SDP offer/answer could not be produced or applied
    #[error("Session description error: {0}")]
    SessionDescription(String),

    /// Event channel could not be opened or written
    #[error("Channel error: {0}")]
    Channel(String),

    /// No transport compiled into this build
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Result type for transport capability calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failure of a session start. Fatal to that start; the session stays Idle.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("Credential request failed: {0}")]
    CredentialRequest(String),

    #[error("Credential endpoint returned HTTP {0}")]
    CredentialStatus(u16),

    #[error("Credential response has no client_secret.value")]
    MissingCredential,

    #[error("Microphone unavailable: {0}")]
    Media(TransportError),

    #[error("Transport setup failed: {0}")]
    Transport(TransportError),

    #[error("SDP handshake failed: {0}")]
    Handshake(String),

    #[error("Negotiation endpoint returned HTTP {status}: {body}")]
    HandshakeStatus { status: u16, body: String },
}

/// Error on an open event channel. Logged; the session continues.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Remote channel error: {0}")]
    Remote(String),

    #[error("Failed to send client event: {0}")]
    Send(TransportError),

    #[error("Failed to serialize client event: {0}")]
    Serialization(String),
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of a transport session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
}

impl SessionState {
    /// Whether a session is in progress (negotiating or open).
    pub fn is_running(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
        }
    }
}

// =============================================================================
// Channel Signals
// =============================================================================

/// Inbound activity on the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    /// The channel is open and can carry client events
    Open,
    /// A text message from the remote side
    Message(String),
    /// A transport error on the open channel
    Error(String),
    /// The remote side closed the channel
    Closed,
}

/// Create a connected sink/subscription pair.
pub fn subscription() -> (SignalSink, Subscription) {
    let (tx, rx) = mpsc::unbounded_channel();
    let live = Arc::new(AtomicBool::new(true));
    (
        SignalSink {
            tx,
            live: Arc::clone(&live),
        },
        Subscription { rx, live },
    )
}

/// Producer half handed to the transport; cheap to clone into callbacks.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<ChannelSignal>,
    live: Arc<AtomicBool>,
}

impl SignalSink {
    /// Deliver a signal. Returns false once the subscription is cancelled.
    pub fn emit(&self, signal: ChannelSignal) -> bool {
        if !self.live.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(signal).is_ok()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

/// Consumer half owned by the session.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<ChannelSignal>,
    live: Arc<AtomicBool>,
}

impl Subscription {
    /// Next signal in arrival order; `None` once cancelled or when every sink
    /// has been dropped.
    pub async fn next(&mut self) -> Option<ChannelSignal> {
        if !self.live.load(Ordering::Acquire) {
            return None;
        }
        self.rx.recv().await
    }

    /// Unregister: buffered and future signals are discarded.
    pub fn cancel(&mut self) {
        self.live.store(false, Ordering::Release);
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        !self.live.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// Capability Traits
// =============================================================================

/// One encoded chunk of captured audio, ready to be written to the peer.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub payload: Bytes,
    pub duration: Duration,
}

/// A local audio input track.
pub trait LocalAudioTrack: Send + Sync {
    fn id(&self) -> &str;

    /// Take the encoded frame stream. Yields `None` after the first call or for
    /// tracks that do not carry frames.
    fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing. Idempotent.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// Source of local audio tracks.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn acquire_audio(&self) -> TransportResult<Box<dyn LocalAudioTrack>>;
}

/// Factory for peer connections.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self) -> TransportResult<Box<dyn PeerConnection>>;
}

/// A realtime peer connection with one auxiliary event channel.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach a local audio track for sending.
    async fn add_audio_track(&mut self, track: &mut dyn LocalAudioTrack) -> TransportResult<()>;

    /// Open an ordered, reliable message channel. Its lifecycle and messages
    /// are delivered through `sink`.
    async fn open_channel(
        &mut self,
        label: &str,
        sink: SignalSink,
    ) -> TransportResult<Arc<dyn EventChannel>>;

    /// Create the local SDP offer and return it once complete.
    async fn create_offer(&mut self) -> TransportResult<String>;

    /// Apply the remote SDP answer.
    async fn apply_answer(&mut self, sdp: String) -> TransportResult<()>;

    async fn close(&mut self);
}

/// Write side of the event channel.
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn send_text(&self, text: String) -> TransportResult<()>;

    async fn close(&self);
}

// =============================================================================
// Unavailable Transport
// =============================================================================

/// Transport used when no live transport is compiled in. Every start fails
/// with a negotiation error naming the missing feature.
#[derive(Debug, Clone, Default)]
pub struct UnavailableTransport;

const UNAVAILABLE_REASON: &str =
    "built without the `live` feature; rebuild with `--features live` to talk to a model";

#[async_trait]
impl MediaDevices for UnavailableTransport {
    async fn acquire_audio(&self) -> TransportResult<Box<dyn LocalAudioTrack>> {
        Err(TransportError::Unavailable(UNAVAILABLE_REASON.to_string()))
    }
}

#[async_trait]
impl PeerConnector for UnavailableTransport {
    async fn connect(&self) -> TransportResult<Box<dyn PeerConnection>> {
        Err(TransportError::Unavailable(UNAVAILABLE_REASON.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Connecting.to_string(), "connecting");
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_session_state_is_running() {
        assert!(!SessionState::Idle.is_running());
        assert!(SessionState::Connecting.is_running());
        assert!(SessionState::Active.is_running());
    }

    #[tokio::test]
    async fn test_subscription_delivers_in_order() {
        let (sink, mut subscription) = subscription();
        assert!(sink.emit(ChannelSignal::Open));
        assert!(sink.emit(ChannelSignal::Message("a".into())));
        assert!(sink.emit(ChannelSignal::Message("b".into())));

        assert_eq!(subscription.next().await, Some(ChannelSignal::Open));
        assert_eq!(
            subscription.next().await,
            Some(ChannelSignal::Message("a".into()))
        );
        assert_eq!(
            subscription.next().await,
            Some(ChannelSignal::Message("b".into()))
        );
    }

    #[tokio::test]
    async fn test_cancel_discards_buffered_signals() {
        let (sink, mut subscription) = subscription();
        sink.emit(ChannelSignal::Message("late".into()));
        subscription.cancel();

        assert!(subscription.is_cancelled());
        assert!(!sink.is_live());
        assert!(!sink.emit(ChannelSignal::Closed));
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn test_dropping_subscription_stops_sink() {
        let (sink, subscription) = subscription();
        drop(subscription);
        assert!(!sink.emit(ChannelSignal::Open));
    }

    #[tokio::test]
    async fn test_unavailable_transport_fails() {
        let transport = UnavailableTransport;
        match transport.acquire_audio().await {
            Err(TransportError::Unavailable(msg)) => assert!(msg.contains("live")),
            _ => panic!("Expected Unavailable error"),
        }
        assert!(transport.connect().await.is_err());
    }

    #[test]
    fn test_negotiation_error_messages() {
        let err = NegotiationError::CredentialStatus(500);
        assert_eq!(err.to_string(), "Credential endpoint returned HTTP 500");

        let err = NegotiationError::HandshakeStatus {
            status: 401,
            body: "bad token".into(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad token"));
    }
}
