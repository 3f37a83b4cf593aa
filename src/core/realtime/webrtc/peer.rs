//! webrtc-rs peer connection carrying one PCMU audio track each way and the
//! event data channel.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_PCMU, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use super::media::play_remote_track;
use crate::core::realtime::base::{
    ChannelSignal, EventChannel, LocalAudioTrack, PeerConnection, PeerConnector, SignalSink,
    TransportError, TransportResult,
};
use crate::core::realtime::codec::PCMU_SAMPLE_RATE;

const PCMU_PAYLOAD_TYPE: u8 = 0;

fn pcmu_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: MIME_TYPE_PCMU.to_owned(),
        clock_rate: PCMU_SAMPLE_RATE,
        channels: 1,
        ..Default::default()
    }
}

fn connection_error(e: webrtc::Error) -> TransportError {
    TransportError::Connection(e.to_string())
}

/// Opens webrtc-rs peer connections. Remote audio is played on `output_device`
/// (`None` for the system default).
#[derive(Debug, Clone, Default)]
pub struct WebRtcConnector {
    output_device: Option<String>,
}

impl WebRtcConnector {
    pub fn new(output_device: Option<String>) -> Self {
        Self { output_device }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(&self) -> TransportResult<Box<dyn PeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: pcmu_capability(),
                    payload_type: PCMU_PAYLOAD_TYPE,
                    ..Default::default()
                },
                RTPCodecType::Audio,
            )
            .map_err(connection_error)?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(connection_error)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();
        let connection = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .map_err(connection_error)?,
        );

        let output_device = self.output_device.clone();
        connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let output_device = output_device.clone();
            Box::pin(async move {
                tokio::spawn(play_remote_track(track, output_device));
            })
        }));
        connection.on_peer_connection_state_change(Box::new(
            |state: RTCPeerConnectionState| {
                debug!(%state, "Peer connection state changed");
                Box::pin(async {})
            },
        ));

        Ok(Box::new(WebRtcPeer {
            connection,
            pumps: Vec::new(),
        }))
    }
}

struct WebRtcPeer {
    connection: Arc<RTCPeerConnection>,
    /// Tasks feeding the local track and draining RTCP
    pumps: Vec<JoinHandle<()>>,
}

#[async_trait]
impl PeerConnection for WebRtcPeer {
    async fn add_audio_track(&mut self, track: &mut dyn LocalAudioTrack) -> TransportResult<()> {
        let local = Arc::new(TrackLocalStaticSample::new(
            pcmu_capability(),
            track.id().to_owned(),
            "waav-voice".to_owned(),
        ));
        let sender = self
            .connection
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| TransportError::Media(e.to_string()))?;

        self.pumps.push(tokio::spawn(async move {
            let mut rtcp = vec![0u8; 1500];
            while sender.read(&mut rtcp).await.is_ok() {}
        }));

        match track.take_frames() {
            Some(mut frames) => self.pumps.push(tokio::spawn(async move {
                while let Some(frame) = frames.recv().await {
                    let sample = Sample {
                        data: frame.payload,
                        duration: frame.duration,
                        ..Default::default()
                    };
                    if let Err(e) = local.write_sample(&sample).await {
                        debug!("Local audio track closed: {}", e);
                        break;
                    }
                }
            })),
            None => debug!(track = track.id(), "Local track carries no frames"),
        }
        Ok(())
    }

    async fn open_channel(
        &mut self,
        label: &str,
        sink: SignalSink,
    ) -> TransportResult<Arc<dyn EventChannel>> {
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };
        let channel = self
            .connection
            .create_data_channel(label, Some(init))
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        wire_channel(&channel, sink);
        Ok(Arc::new(DataChannel { inner: channel }))
    }

    async fn create_offer(&mut self) -> TransportResult<String> {
        let describe = |e: webrtc::Error| TransportError::SessionDescription(e.to_string());

        let offer = self.connection.create_offer(None).await.map_err(describe)?;
        let mut gathered = self.connection.gathering_complete_promise().await;
        self.connection
            .set_local_description(offer)
            .await
            .map_err(describe)?;
        // Non-trickle: the offer must carry every candidate
        let _ = gathered.recv().await;

        self.connection
            .local_description()
            .await
            .map(|description| description.sdp)
            .ok_or_else(|| TransportError::SessionDescription("No local description".into()))
    }

    async fn apply_answer(&mut self, sdp: String) -> TransportResult<()> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| TransportError::SessionDescription(e.to_string()))?;
        self.connection
            .set_remote_description(answer)
            .await
            .map_err(|e| TransportError::SessionDescription(e.to_string()))
    }

    async fn close(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        if let Err(e) = self.connection.close().await {
            warn!("Failed to close peer connection: {}", e);
        }
    }
}

fn wire_channel(channel: &RTCDataChannel, sink: SignalSink) {
    let on_open = sink.clone();
    channel.on_open(Box::new(move || {
        Box::pin(async move {
            on_open.emit(ChannelSignal::Open);
        })
    }));

    let on_message = sink.clone();
    channel.on_message(Box::new(move |message: DataChannelMessage| {
        let sink = on_message.clone();
        Box::pin(async move {
            match String::from_utf8(message.data.to_vec()) {
                Ok(text) => {
                    sink.emit(ChannelSignal::Message(text));
                }
                Err(_) => warn!("Ignoring non-UTF-8 channel message"),
            }
        })
    }));

    let on_error = sink.clone();
    channel.on_error(Box::new(move |err: webrtc::Error| {
        let sink = on_error.clone();
        Box::pin(async move {
            sink.emit(ChannelSignal::Error(err.to_string()));
        })
    }));

    channel.on_close(Box::new(move || {
        let sink = sink.clone();
        Box::pin(async move {
            sink.emit(ChannelSignal::Closed);
        })
    }));
}

struct DataChannel {
    inner: Arc<RTCDataChannel>,
}

#[async_trait]
impl EventChannel for DataChannel {
    async fn send_text(&self, text: String) -> TransportResult<()> {
        self.inner
            .send_text(text)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Channel(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.inner.close().await {
            debug!("Event channel close failed: {}", e);
        }
    }
}
