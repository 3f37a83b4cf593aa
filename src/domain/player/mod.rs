//! Track playback for the playlist domain.
//!
//! The playlist decides what should be playing; a [`TrackPlayer`] makes it
//! audible. Without the `live` feature there is no player and the playlist
//! only tracks state.

#[cfg(feature = "live")]
mod live;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::Track;
use crate::config::AudioSettings;

#[cfg(feature = "live")]
pub use live::RodioPlayer;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio output unavailable: {0}")]
    Output(String),

    #[error("Player thread failed: {0}")]
    Thread(String),
}

/// Audio output for the selected track.
///
/// Calls never block; loading fetches the track in the background.
pub trait TrackPlayer: fmt::Debug + Send + Sync {
    /// Replace whatever is playing with `track` and start it.
    fn load(&self, track: &Track);

    fn resume(&self);

    fn pause(&self);

    /// Stop and forget the current track.
    fn stop(&self);
}

/// The player for this build, if audio output is available.
#[cfg(feature = "live")]
pub async fn default_track_player(audio: &AudioSettings) -> Option<Arc<dyn TrackPlayer>> {
    match RodioPlayer::start(audio.output_device.clone()).await {
        Ok(player) => Some(Arc::new(player)),
        Err(e) => {
            tracing::warn!("Tracks will not be played: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "live"))]
pub async fn default_track_player(_audio: &AudioSettings) -> Option<Arc<dyn TrackPlayer>> {
    None
}
