//! Microphone capture and remote audio playback with cpal.
//!
//! cpal streams are not `Send` on every platform, so each stream lives on its
//! own thread for its whole life. The thread exits when its stop sender is
//! dropped.

use async_trait::async_trait;
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use webrtc::track::track_remote::TrackRemote;

use crate::core::realtime::base::{
    AudioFrame, LocalAudioTrack, MediaDevices, TransportError, TransportResult,
};
use crate::core::realtime::codec::{
    FRAME_DURATION, FRAME_SAMPLES, PCMU_SAMPLE_RATE, decode_f32, encode_f32,
};

use super::resample::StreamResampler;

/// Encoded frames buffered between the capture callback and the sender.
const FRAME_BUFFER: usize = 50;

/// Upper bound on queued playback audio, in seconds.
const MAX_PLAYBACK_SECONDS: usize = 2;

fn media_error(context: &str, e: impl std::fmt::Display) -> TransportError {
    TransportError::Media(format!("{context}: {e}"))
}

fn input_device(name: Option<&str>) -> TransportResult<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| media_error("Failed to list input devices", e))?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| TransportError::Media(format!("Input device '{name}' not found"))),
        None => host
            .default_input_device()
            .ok_or_else(|| TransportError::Media("No input device available".into())),
    }
}

fn output_device(name: Option<&str>) -> TransportResult<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| media_error("Failed to list output devices", e))?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| TransportError::Media(format!("Output device '{name}' not found"))),
        None => host
            .default_output_device()
            .ok_or_else(|| TransportError::Media("No output device available".into())),
    }
}

// =============================================================================
// Capture
// =============================================================================

/// Microphone source. `None` selects the system default input.
#[derive(Debug, Clone, Default)]
pub struct MicrophoneDevices {
    input_device: Option<String>,
}

impl MicrophoneDevices {
    pub fn new(input_device: Option<String>) -> Self {
        Self { input_device }
    }
}

#[async_trait]
impl MediaDevices for MicrophoneDevices {
    async fn acquire_audio(&self) -> TransportResult<Box<dyn LocalAudioTrack>> {
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let device_name = self.input_device.clone();

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match build_capture_stream(device_name.as_deref(), frames_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Blocks until the track stops or is dropped
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Microphone capture stopped");
            })
            .map_err(|e| media_error("Failed to spawn capture thread", e))?;

        ready_rx
            .await
            .map_err(|_| TransportError::Media("Capture thread exited".into()))??;

        Ok(Box::new(MicrophoneTrack {
            id: "microphone".to_string(),
            frames: Some(frames_rx),
            stop_tx: Some(stop_tx),
        }))
    }
}

fn build_capture_stream(
    name: Option<&str>,
    frames_tx: mpsc::Sender<AudioFrame>,
) -> TransportResult<cpal::Stream> {
    let device = input_device(name)?;
    info!(
        "Using input device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let config: cpal::StreamConfig = device
        .default_input_config()
        .map_err(|e| media_error("Failed to get input config", e))?
        .into();
    let channels = config.channels.max(1) as usize;
    let mut resampler = StreamResampler::new(config.sample_rate.0, PCMU_SAMPLE_RATE)?;
    let mut mono = Vec::new();
    let mut pending = Vec::with_capacity(FRAME_SAMPLES * 2);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                mono.clear();
                mono.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
                if let Err(e) = resampler.process(&mono, &mut pending) {
                    warn!("Dropping microphone audio: {}", e);
                    return;
                }

                while pending.len() >= FRAME_SAMPLES {
                    let payload: Bytes = pending.drain(..FRAME_SAMPLES).map(encode_f32).collect();
                    // A full buffer means the sender is behind; drop the frame
                    let _ = frames_tx.try_send(AudioFrame {
                        payload,
                        duration: FRAME_DURATION,
                    });
                }
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .map_err(|e| media_error("Failed to build input stream", e))?;

    stream
        .play()
        .map_err(|e| media_error("Failed to start input stream", e))?;
    Ok(stream)
}

/// Live microphone track producing PCMU frames.
pub struct MicrophoneTrack {
    id: String,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
}

impl LocalAudioTrack for MicrophoneTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.take()
    }

    fn stop(&mut self) {
        if self.stop_tx.take().is_some() {
            debug!(track = %self.id, "Stopping microphone");
        }
    }

    fn is_live(&self) -> bool {
        self.stop_tx.is_some()
    }
}

impl Drop for MicrophoneTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Playback
// =============================================================================

/// Output stream fed from a shared sample queue.
struct RemotePlayback {
    queue: Arc<Mutex<VecDeque<f32>>>,
    resampler: StreamResampler,
    capacity: usize,
    decoded: Vec<f32>,
    _stop_tx: std_mpsc::Sender<()>,
}

impl RemotePlayback {
    async fn start(device_name: Option<String>) -> TransportResult<Self> {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let stream_queue = Arc::clone(&queue);

        std::thread::Builder::new()
            .name("remote-playback".into())
            .spawn(move || {
                match build_playback_stream(device_name.as_deref(), stream_queue) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        let _ = stop_rx.recv();
                        drop(stream);
                        debug!("Remote playback stopped");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| media_error("Failed to spawn playback thread", e))?;

        let sample_rate = ready_rx
            .await
            .map_err(|_| TransportError::Media("Playback thread exited".into()))??;

        Ok(Self {
            queue,
            resampler: StreamResampler::new(PCMU_SAMPLE_RATE, sample_rate)?,
            capacity: sample_rate as usize * MAX_PLAYBACK_SECONDS,
            decoded: Vec::new(),
            _stop_tx: stop_tx,
        })
    }

    fn push_pcmu(&mut self, payload: &[u8]) {
        let samples: Vec<f32> = payload.iter().copied().map(decode_f32).collect();
        self.decoded.clear();
        if let Err(e) = self.resampler.process(&samples, &mut self.decoded) {
            warn!("Dropping remote audio: {}", e);
            return;
        }

        let mut queue = self.queue.lock();
        queue.extend(self.decoded.iter().copied());
        let overflow = queue.len().saturating_sub(self.capacity);
        if overflow > 0 {
            queue.drain(..overflow);
        }
    }
}

fn build_playback_stream(
    name: Option<&str>,
    queue: Arc<Mutex<VecDeque<f32>>>,
) -> TransportResult<(cpal::Stream, u32)> {
    let device = output_device(name)?;
    info!(
        "Using output device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let config: cpal::StreamConfig = device
        .default_output_config()
        .map_err(|e| media_error("Failed to get output config", e))?
        .into();
    let channels = config.channels.max(1) as usize;
    let sample_rate = config.sample_rate.0;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = queue.lock();
                for frame in data.chunks_mut(channels) {
                    frame.fill(queue.pop_front().unwrap_or(0.0));
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| media_error("Failed to build output stream", e))?;

    stream
        .play()
        .map_err(|e| media_error("Failed to start output stream", e))?;
    Ok((stream, sample_rate))
}

/// Play a remote PCMU track until it ends.
pub(super) async fn play_remote_track(track: Arc<TrackRemote>, output_device: Option<String>) {
    let mut playback = match RemotePlayback::start(output_device).await {
        Ok(playback) => playback,
        Err(e) => {
            warn!("Remote audio will not be played: {}", e);
            return;
        }
    };
    info!("Playing remote audio");

    while let Ok((packet, _)) = track.read_rtp().await {
        playback.push_pcmu(&packet.payload);
    }
    debug!("Remote track ended");
}
