//! Shared fixtures: an in-process peer connection and mocked HTTP endpoints.
//!
//! The fake transport records everything the session does on a shared
//! [`Wire`] and lets a test play the remote side by injecting channel
//! signals.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use waav_voice_control::core::realtime::{
    AudioFrame, ChannelSignal, EventChannel, LocalAudioTrack, MediaDevices, NegotiationEndpoints,
    Negotiator, PeerConnection, PeerConnector, SignalSink, TransportError, TransportResult,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
pub const TEST_SECRET: &str = "ek_test_secret";
pub const FAKE_OFFER: &str = "v=0\r\no=- fake offer\r\n";
pub const FAKE_ANSWER: &str = "v=0\r\no=- fake answer\r\n";

// =============================================================================
// Fake transport
// =============================================================================

/// Observable state of the fake transport.
#[derive(Default)]
pub struct Wire {
    sink: Mutex<Option<SignalSink>>,
    sent: Mutex<Vec<String>>,
    offers: Mutex<Vec<String>>,
    answers: Mutex<Vec<String>>,
    pub fail_media: AtomicBool,
    pub fail_connect: AtomicBool,
    pub fail_offer: AtomicBool,
    pub tracks_acquired: AtomicUsize,
    pub tracks_stopped: AtomicUsize,
    pub channels_opened: AtomicUsize,
    pub channels_closed: AtomicUsize,
    pub connections_opened: AtomicUsize,
    pub connections_closed: AtomicUsize,
}

impl Wire {
    /// Signal through the most recently opened channel. Returns false when
    /// the session has unsubscribed.
    pub fn signal(&self, signal: ChannelSignal) -> bool {
        self.sink
            .lock()
            .as_ref()
            .is_some_and(|sink| sink.emit(signal))
    }

    pub fn open(&self) -> bool {
        self.signal(ChannelSignal::Open)
    }

    pub fn deliver(&self, event: Value) -> bool {
        self.signal(ChannelSignal::Message(event.to_string()))
    }

    pub fn close_remote(&self) -> bool {
        self.signal(ChannelSignal::Closed)
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).expect("client events are JSON"))
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|event| event["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().clone()
    }

    /// Wait until at least `count` client events were sent.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<Value> {
        let wire = self;
        wait_until(|| wire.sent.lock().len() >= count).await;
        self.sent()
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub struct FakeMedia {
    wire: Arc<Wire>,
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn acquire_audio(&self) -> TransportResult<Box<dyn LocalAudioTrack>> {
        if self.wire.fail_media.load(Ordering::SeqCst) {
            return Err(TransportError::Media("permission denied".into()));
        }
        self.wire.tracks_acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTrack {
            wire: Arc::clone(&self.wire),
            live: true,
        }))
    }
}

struct FakeTrack {
    wire: Arc<Wire>,
    live: bool,
}

impl LocalAudioTrack for FakeTrack {
    fn id(&self) -> &str {
        "fake-mic"
    }

    fn take_frames(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        None
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.wire.tracks_stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

pub struct FakeConnector {
    wire: Arc<Wire>,
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(&self) -> TransportResult<Box<dyn PeerConnection>> {
        if self.wire.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("no route".into()));
        }
        self.wire.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePeer {
            wire: Arc::clone(&self.wire),
        }))
    }
}

struct FakePeer {
    wire: Arc<Wire>,
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn add_audio_track(&mut self, track: &mut dyn LocalAudioTrack) -> TransportResult<()> {
        assert!(track.is_live(), "attached track must be live");
        Ok(())
    }

    async fn open_channel(
        &mut self,
        _label: &str,
        sink: SignalSink,
    ) -> TransportResult<Arc<dyn EventChannel>> {
        *self.wire.sink.lock() = Some(sink);
        self.wire.channels_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeChannel {
            wire: Arc::clone(&self.wire),
        }))
    }

    async fn create_offer(&mut self) -> TransportResult<String> {
        if self.wire.fail_offer.load(Ordering::SeqCst) {
            return Err(TransportError::SessionDescription("no codecs".into()));
        }
        self.wire.offers.lock().push(FAKE_OFFER.to_string());
        Ok(FAKE_OFFER.to_string())
    }

    async fn apply_answer(&mut self, sdp: String) -> TransportResult<()> {
        self.wire.answers.lock().push(sdp);
        Ok(())
    }

    async fn close(&mut self) {
        self.wire.connections_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeChannel {
    wire: Arc<Wire>,
}

#[async_trait]
impl EventChannel for FakeChannel {
    async fn send_text(&self, text: String) -> TransportResult<()> {
        self.wire.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self) {
        self.wire.channels_closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A fresh wire with the media and connector that report to it.
pub fn fake_transport() -> (Arc<Wire>, Arc<dyn MediaDevices>, Arc<dyn PeerConnector>) {
    let wire = Arc::new(Wire::default());
    let media = Arc::new(FakeMedia {
        wire: Arc::clone(&wire),
    });
    let connector = Arc::new(FakeConnector {
        wire: Arc::clone(&wire),
    });
    (wire, media, connector)
}

// =============================================================================
// Mocked endpoints
// =============================================================================

/// Token endpoint at `/session` and SDP endpoint at `/v1/realtime`.
pub async fn mock_endpoints() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_secret": { "value": TEST_SECRET, "expires_at": 0 }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/realtime"))
        .and(query_param("model", TEST_MODEL))
        .and(header("authorization", format!("Bearer {TEST_SECRET}").as_str()))
        .and(header("content-type", "application/sdp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FAKE_ANSWER))
        .mount(&server)
        .await;

    server
}

pub fn negotiator_for(server: &MockServer) -> Negotiator {
    Negotiator::new(NegotiationEndpoints {
        token_url: format!("{}/session", server.uri()),
        realtime_url: format!("{}/v1/realtime", server.uri()),
        model: TEST_MODEL.to_string(),
    })
}

// =============================================================================
// Server events
// =============================================================================

pub fn session_created() -> Value {
    json!({ "type": "session.created", "session": { "id": "sess_test" } })
}

/// `response.done` carrying the given `(name, call_id, arguments)` calls.
pub fn response_done(calls: &[(&str, &str, Value)]) -> Value {
    let output: Vec<Value> = calls
        .iter()
        .map(|(name, call_id, arguments)| {
            json!({
                "type": "function_call",
                "name": name,
                "call_id": call_id,
                "arguments": arguments.to_string(),
            })
        })
        .collect();
    json!({ "type": "response.done", "response": { "output": output } })
}

/// Poll `condition` every few milliseconds; panics after two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
