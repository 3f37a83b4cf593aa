//! Realtime transport to the remote speech/language model.
//!
//! # Architecture
//!
//! - `base`: capability traits for media and peer connections, channel
//!   signals and the error taxonomy
//! - `codec`: PCMU companding for the voice track
//! - `openai`: wire events and the credential/SDP negotiation
//! - `session`: the [`TransportSession`] lifecycle owner
//! - `webrtc` (feature `live`): webrtc-rs peer connection with cpal audio
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_voice_control::core::realtime::{
//!     NegotiationEndpoints, Negotiator, TransportSession, default_transport,
//! };
//!
//! let (media, connector) = default_transport(&config.audio);
//! let mut session = TransportSession::new(
//!     Negotiator::new(NegotiationEndpoints::default()),
//!     media,
//!     connector,
//!     "oai-events",
//! );
//! session.start().await?;
//! ```

mod base;
pub mod codec;
pub mod openai;
mod session;
#[cfg(feature = "live")]
pub mod webrtc;

use std::sync::Arc;

pub use base::{
    AudioFrame, ChannelError, ChannelSignal, EventChannel, LocalAudioTrack, MediaDevices,
    NegotiationError, PeerConnection, PeerConnector, SessionState, SignalSink, Subscription,
    TransportError, TransportResult, UnavailableTransport, subscription,
};
pub use openai::{ClientEvent, NegotiationEndpoints, Negotiator, ServerEvent};
pub use session::{Established, Negotiation, TransportSession};

use crate::config::AudioSettings;

/// Media and connector for this build: the WebRTC/cpal transport with the
/// `live` feature, otherwise one that refuses to start.
#[cfg(feature = "live")]
pub fn default_transport(audio: &AudioSettings) -> (Arc<dyn MediaDevices>, Arc<dyn PeerConnector>) {
    (
        Arc::new(webrtc::MicrophoneDevices::new(audio.input_device.clone())),
        Arc::new(webrtc::WebRtcConnector::new(audio.output_device.clone())),
    )
}

#[cfg(not(feature = "live"))]
pub fn default_transport(
    _audio: &AudioSettings,
) -> (Arc<dyn MediaDevices>, Arc<dyn PeerConnector>) {
    (Arc::new(UnavailableTransport), Arc::new(UnavailableTransport))
}
