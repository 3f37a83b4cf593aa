//! rodio playback of tracks fetched from their URL.
//!
//! rodio's output stream is not `Send`, so it lives on a dedicated thread that
//! takes commands over a channel. Track bytes are downloaded on the tokio
//! runtime and handed to that thread; a download finishing after a newer load
//! is discarded.

use bytes::Bytes;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{PlayerError, TrackPlayer};
use crate::domain::Track;

#[derive(Debug)]
enum PlayerCommand {
    /// A new track was requested; drop the current one
    Load(u64),
    /// Downloaded audio for a load
    Ready(u64, Bytes),
    Resume,
    Pause,
    Stop,
}

/// Plays tracks on the configured output device (`None` for the default).
#[derive(Debug)]
pub struct RodioPlayer {
    commands: std_mpsc::Sender<PlayerCommand>,
    loads: AtomicU64,
    http: reqwest::Client,
    runtime: Handle,
}

impl RodioPlayer {
    pub async fn start(output_device: Option<String>) -> Result<Self, PlayerError> {
        let (commands_tx, commands_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("track-player".into())
            .spawn(move || {
                let (_stream, handle) = match open_output(output_device.as_deref()) {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                run_player(&handle, commands_rx);
                debug!("Track player stopped");
            })
            .map_err(|e| PlayerError::Thread(e.to_string()))?;

        ready_rx
            .await
            .map_err(|_| PlayerError::Thread("Player thread exited".into()))??;

        Ok(Self {
            commands: commands_tx,
            loads: AtomicU64::new(0),
            http: reqwest::Client::new(),
            runtime: Handle::current(),
        })
    }

    fn send(&self, command: PlayerCommand) {
        if self.commands.send(command).is_err() {
            warn!("Track player is not running");
        }
    }
}

impl TrackPlayer for RodioPlayer {
    fn load(&self, track: &Track) {
        let generation = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(PlayerCommand::Load(generation));

        let commands = self.commands.clone();
        let http = self.http.clone();
        let url = track.url.clone();
        let title = track.title.clone();
        self.runtime.spawn(async move {
            match fetch(&http, &url).await {
                Ok(bytes) => {
                    debug!(%title, bytes = bytes.len(), "Track downloaded");
                    let _ = commands.send(PlayerCommand::Ready(generation, bytes));
                }
                Err(e) => warn!(%url, "Failed to fetch track: {}", e),
            }
        });
    }

    fn resume(&self) {
        self.send(PlayerCommand::Resume);
    }

    fn pause(&self) {
        self.send(PlayerCommand::Pause);
    }

    fn stop(&self) {
        self.send(PlayerCommand::Stop);
    }
}

async fn fetch(http: &reqwest::Client, url: &str) -> reqwest::Result<Bytes> {
    http.get(url).send().await?.error_for_status()?.bytes().await
}

fn open_output(name: Option<&str>) -> Result<(OutputStream, OutputStreamHandle), PlayerError> {
    let output = match name {
        Some(name) => {
            let device = rodio::cpal::default_host()
                .output_devices()
                .map_err(|e| PlayerError::Output(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .ok_or_else(|| PlayerError::Output(format!("Output device '{name}' not found")))?;
            OutputStream::try_from_device(&device)
        }
        None => OutputStream::try_default(),
    };
    output.map_err(|e| PlayerError::Output(e.to_string()))
}

/// Command loop; returns when every sender is gone.
fn run_player(handle: &OutputStreamHandle, commands: std_mpsc::Receiver<PlayerCommand>) {
    let mut sink: Option<Sink> = None;
    let mut current = 0;
    let mut want_playing = false;

    while let Ok(command) = commands.recv() {
        match command {
            PlayerCommand::Load(generation) => {
                sink = None;
                current = generation;
                want_playing = true;
            }
            PlayerCommand::Ready(generation, bytes) if generation == current => {
                match start_sink(handle, bytes) {
                    Ok(started) => {
                        if !want_playing {
                            started.pause();
                        }
                        info!(generation, "Track playback started");
                        sink = Some(started);
                    }
                    Err(e) => warn!("Cannot play track: {}", e),
                }
            }
            PlayerCommand::Ready(generation, _) => {
                debug!(generation, "Discarding superseded track");
            }
            PlayerCommand::Resume => {
                want_playing = true;
                if let Some(sink) = &sink {
                    sink.play();
                }
            }
            PlayerCommand::Pause => {
                want_playing = false;
                if let Some(sink) = &sink {
                    sink.pause();
                }
            }
            PlayerCommand::Stop => {
                sink = None;
                current = 0;
                want_playing = false;
            }
        }
    }
}

fn start_sink(handle: &OutputStreamHandle, bytes: Bytes) -> Result<Sink, PlayerError> {
    let source =
        Decoder::new(Cursor::new(bytes)).map_err(|e| PlayerError::Output(e.to_string()))?;
    let sink = Sink::try_new(handle).map_err(|e| PlayerError::Output(e.to_string()))?;
    sink.append(source);
    Ok(sink)
}
