//! Live transport: webrtc-rs for the peer connection and data channel, cpal
//! for the microphone and speaker, rubato for rate conversion. Audio is
//! negotiated as PCMU at 8 kHz.

mod media;
mod peer;
mod resample;

pub use media::{MicrophoneDevices, MicrophoneTrack};
pub use peer::WebRtcConnector;
pub use resample::StreamResampler;
