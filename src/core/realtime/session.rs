//! Transport session: owns the peer connection, the local audio track and the
//! event channel for one call, and drives the Idle/Connecting/Active states.
//!
//! Starting is split in two halves so an owner task can keep serving other
//! work while the handshake is in flight:
//!
//! 1. [`TransportSession::begin`] moves Idle to Connecting and hands out a
//!    [`Negotiation`] tagged with the session generation.
//! 2. [`Negotiation::run`] performs the handshake anywhere (usually a spawned
//!    task) and [`TransportSession::complete`] installs the result, discarding
//!    and tearing down results whose generation is no longer current.
//!
//! [`TransportSession::start`] runs both halves inline.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::base::{
    ChannelError, ChannelSignal, EventChannel, LocalAudioTrack, MediaDevices, NegotiationError,
    PeerConnection, PeerConnector, SessionState, Subscription, subscription,
};
use super::openai::{ClientEvent, Negotiator, ServerEvent};

/// Resources of an established (or establishing) call.
pub struct Established {
    connection: Box<dyn PeerConnection>,
    channel: Arc<dyn EventChannel>,
    audio: Box<dyn LocalAudioTrack>,
    subscription: Subscription,
}

impl Established {
    /// Unregister listeners, then close channel, media and connection in that
    /// order.
    async fn teardown(mut self) {
        self.subscription.cancel();
        self.channel.close().await;
        self.audio.stop();
        self.connection.close().await;
    }
}

impl std::fmt::Debug for Established {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Established")
            .field("audio", &self.audio.id())
            .finish_non_exhaustive()
    }
}

/// An in-flight handshake for one session generation.
pub struct Negotiation {
    generation: u64,
    negotiator: Arc<Negotiator>,
    media: Arc<dyn MediaDevices>,
    connector: Arc<dyn PeerConnector>,
    channel_label: String,
}

impl Negotiation {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Credential, microphone, connection, track, channel, offer, answer.
    /// Anything acquired before a failure is released before returning.
    pub async fn run(self) -> Result<Established, NegotiationError> {
        let credential = self.negotiator.fetch_credential().await?;

        let mut audio = self
            .media
            .acquire_audio()
            .await
            .map_err(NegotiationError::Media)?;

        let mut connection = match self.connector.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                audio.stop();
                return Err(NegotiationError::Transport(e));
            }
        };

        let (sink, mut subscription) = subscription();
        let mut channel: Option<Arc<dyn EventChannel>> = None;

        let handshake = async {
            connection
                .add_audio_track(audio.as_mut())
                .await
                .map_err(NegotiationError::Media)?;

            let opened = connection
                .open_channel(&self.channel_label, sink)
                .await
                .map_err(NegotiationError::Transport)?;
            channel = Some(Arc::clone(&opened));

            let offer = connection
                .create_offer()
                .await
                .map_err(NegotiationError::Transport)?;
            let answer = self.negotiator.exchange_sdp(&credential, offer).await?;
            connection
                .apply_answer(answer)
                .await
                .map_err(NegotiationError::Transport)?;
            Ok::<_, NegotiationError>(opened)
        };

        match handshake.await {
            Ok(channel) => Ok(Established {
                connection,
                channel,
                audio,
                subscription,
            }),
            Err(e) => {
                subscription.cancel();
                if let Some(channel) = channel {
                    channel.close().await;
                }
                audio.stop();
                connection.close().await;
                Err(e)
            }
        }
    }
}

/// Owns one call at a time.
pub struct TransportSession {
    negotiator: Arc<Negotiator>,
    media: Arc<dyn MediaDevices>,
    connector: Arc<dyn PeerConnector>,
    channel_label: String,
    state: SessionState,
    generation: u64,
    live: Option<Established>,
}

impl TransportSession {
    pub fn new(
        negotiator: Negotiator,
        media: Arc<dyn MediaDevices>,
        connector: Arc<dyn PeerConnector>,
        channel_label: impl Into<String>,
    ) -> Self {
        Self {
            negotiator: Arc::new(negotiator),
            media,
            connector,
            channel_label: channel_label.into(),
            state: SessionState::Idle,
            generation: 0,
            live: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Generation of the current (or last) session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether call resources are installed and may produce signals.
    pub fn is_attached(&self) -> bool {
        self.live.is_some()
    }

    /// Idle -> Connecting. Returns `None` if a session is already running.
    pub fn begin(&mut self) -> Option<Negotiation> {
        if self.state.is_running() {
            debug!(state = %self.state, "Start ignored, session already running");
            return None;
        }
        self.generation += 1;
        self.state = SessionState::Connecting;
        info!(generation = self.generation, "Starting session");

        Some(Negotiation {
            generation: self.generation,
            negotiator: Arc::clone(&self.negotiator),
            media: Arc::clone(&self.media),
            connector: Arc::clone(&self.connector),
            channel_label: self.channel_label.clone(),
        })
    }

    /// Install the outcome of a negotiation. Stale outcomes (the session was
    /// stopped or restarted meanwhile) are torn down and ignored.
    pub async fn complete(
        &mut self,
        generation: u64,
        result: Result<Established, NegotiationError>,
    ) -> Result<(), NegotiationError> {
        let current = generation == self.generation && self.state == SessionState::Connecting;

        match result {
            Ok(established) if current => {
                debug!(generation, "Negotiation complete, waiting for channel open");
                self.live = Some(established);
                Ok(())
            }
            Ok(established) => {
                debug!(generation, "Discarding stale negotiation result");
                established.teardown().await;
                Ok(())
            }
            Err(e) if current => {
                error!("Failed to start session: {}", e);
                self.state = SessionState::Idle;
                Err(e)
            }
            Err(e) => {
                debug!(generation, "Ignoring stale negotiation failure: {}", e);
                Ok(())
            }
        }
    }

    /// Negotiate inline.
    pub async fn start(&mut self) -> Result<(), NegotiationError> {
        let Some(negotiation) = self.begin() else {
            return Ok(());
        };
        let generation = negotiation.generation();
        let result = negotiation.run().await;
        self.complete(generation, result).await
    }

    /// Tear down the call and return to Idle. Safe from any state; a
    /// negotiation still in flight will be discarded when it completes.
    pub async fn stop(&mut self) {
        let was = self.state;
        self.state = SessionState::Idle;

        if let Some(live) = self.live.take() {
            live.teardown().await;
        }

        if was.is_running() {
            info!(generation = self.generation, "Session stopped");
        }
    }

    /// Serialize and send an event. Dropped unless Active.
    pub async fn send(&self, event: &ClientEvent) -> bool {
        let channel = match self.live.as_ref() {
            Some(live) if self.state == SessionState::Active => Arc::clone(&live.channel),
            _ => {
                warn!(
                    event = event.event_type(),
                    state = %self.state,
                    "Dropping client event, session not active"
                );
                return false;
            }
        };

        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                error!("{}", ChannelError::Serialization(e.to_string()));
                return false;
            }
        };

        debug!(event = event.event_type(), "Sending client event");
        match channel.send_text(text).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", ChannelError::Send(e));
                false
            }
        }
    }

    /// Next inbound signal. A subscription that ends without an explicit
    /// close reads as `Closed`. Pends forever when nothing is attached.
    pub async fn next_signal(&mut self) -> ChannelSignal {
        match self.live.as_mut() {
            Some(live) => live
                .subscription
                .next()
                .await
                .unwrap_or(ChannelSignal::Closed),
            None => std::future::pending().await,
        }
    }

    /// Apply a signal to the session state; returns the parsed server event
    /// for messages.
    pub async fn handle_signal(&mut self, signal: ChannelSignal) -> Option<ServerEvent> {
        match signal {
            ChannelSignal::Open => {
                if self.state == SessionState::Connecting && self.live.is_some() {
                    self.state = SessionState::Active;
                    info!(generation = self.generation, "Session active");
                }
                None
            }
            ChannelSignal::Message(text) => {
                if self.live.is_none() {
                    return None;
                }
                // The transport may surface the first message before its open
                // callback; a message proves the channel is open.
                if self.state == SessionState::Connecting {
                    self.state = SessionState::Active;
                    info!(
                        generation = self.generation,
                        "Session active, message arrived before open"
                    );
                }
                match ServerEvent::parse(&text) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!("Ignoring unparseable server event: {}", e);
                        None
                    }
                }
            }
            ChannelSignal::Error(message) => {
                error!("{}", ChannelError::Remote(message));
                None
            }
            ChannelSignal::Closed => {
                if self.live.is_some() {
                    info!("Event channel closed by remote");
                    self.stop().await;
                }
                None
            }
        }
    }
}
