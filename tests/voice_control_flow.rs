//! End-to-end tests of the voice app with a fake peer and mocked endpoints
//!
//! These tests verify:
//! - Tools are announced once per session, and again in a new session
//! - Function calls mutate the domain in output order
//! - Narrations and function outputs are sent back on the channel
//! - Offline replay produces the same outbound events

mod common;

use common::{
    Wire, count, fake_transport, mock_endpoints, negotiator_for, response_done, session_created,
    wait_until,
};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use tokio::task::JoinHandle;
use waav_voice_control::app::replay::replay;
use waav_voice_control::core::realtime::openai::OAI_EVENTS_CHANNEL;
use waav_voice_control::core::realtime::{ClientEvent, SessionState, TransportSession};
use waav_voice_control::core::tools::SessionOptions;
use waav_voice_control::domain::PlaylistAction;
use waav_voice_control::domain::playlist::demo_track;
use waav_voice_control::{AppHandle, Cart, DomainModule, Playlist, VoiceApp};
use wiremock::MockServer;

struct Harness<D: DomainModule> {
    wire: Arc<Wire>,
    handle: AppHandle<D>,
    task: JoinHandle<()>,
    _server: MockServer,
}

impl<D: DomainModule> Harness<D> {
    async fn spawn(domain: D) -> Self {
        let server = mock_endpoints().await;
        let (wire, media, connector) = fake_transport();
        let session =
            TransportSession::new(negotiator_for(&server), media, connector, OAI_EVENTS_CHANNEL);
        let (handle, task) = VoiceApp::new(session, domain, SessionOptions::default()).spawn();
        Self {
            wire,
            handle,
            task,
            _server: server,
        }
    }

    /// Start a session and bring it to Active. `channels` is the number of
    /// channels the fake will have opened once this session is up.
    async fn connect(&self, channels: usize) {
        self.handle.start().await.unwrap();
        let wire = Arc::clone(&self.wire);
        wait_until(move || count(&wire.channels_opened) >= channels).await;
        assert!(self.wire.open());
        self.wait_for_state(SessionState::Active).await;
    }

    async fn wait_for_state(&self, state: SessionState) {
        let handle = self.handle.clone();
        wait_until(move || handle.snapshot().session == state).await;
    }

    async fn wait_for_domain(&self, condition: impl Fn(&D::Snapshot) -> bool) {
        let handle = self.handle.clone();
        wait_until(move || condition(&handle.snapshot().domain)).await;
    }

    async fn shutdown(self) {
        self.handle.shutdown().await.unwrap();
        self.task.await.unwrap();
    }
}

#[tokio::test]
async fn test_cart_ordering_conversation() {
    let app = Harness::spawn(Cart::default()).await;
    app.connect(1).await;

    app.wire.deliver(session_created());
    let sent = app.wire.wait_for_sent(1).await;
    assert_eq!(sent[0]["type"], "session.update");
    assert_eq!(sent[0]["session"]["tool_choice"], "auto");
    let tools: Vec<_> = sent[0]["session"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        tools,
        vec!["add_item", "remove_item", "update_quantity", "clear_cart", "get_cart"]
    );

    app.wire.deliver(response_done(&[(
        "add_item",
        "call_1",
        json!({ "id": "a1", "item_name": "Tea", "price": 2.5 }),
    )]));
    let sent = app.wire.wait_for_sent(2).await;
    assert_eq!(sent[1]["type"], "response.create");
    assert!(sent[1]["response"]["instructions"].is_string());
    app.wait_for_domain(|cart| cart.items.len() == 1).await;

    let snapshot = app.handle.snapshot().domain;
    assert_eq!(snapshot.items[0].id, "a1");
    assert_eq!(snapshot.items[0].name, "Tea");
    assert_eq!(snapshot.items[0].quantity, 1);

    app.wire.deliver(response_done(&[(
        "update_quantity",
        "call_2",
        json!({ "id": "a1", "quantity": 3 }),
    )]));
    app.wire.wait_for_sent(3).await;
    app.wait_for_domain(|cart| cart.items[0].quantity == 3).await;
    assert!((app.handle.snapshot().domain.total - 7.5).abs() < 1e-9);

    app.wire
        .deliver(response_done(&[("get_cart", "call_3", json!({}))]));
    let sent = app.wire.wait_for_sent(5).await;
    assert_eq!(sent[3]["type"], "conversation.item.create");
    assert_eq!(sent[3]["item"]["type"], "function_call_output");
    assert_eq!(sent[3]["item"]["call_id"], "call_3");
    let output: serde_json::Value =
        serde_json::from_str(sent[3]["item"]["output"].as_str().unwrap()).unwrap();
    assert_eq!(output["total"], json!(7.5));
    assert_eq!(sent[4], json!({ "type": "response.create" }));

    app.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_session_created_announces_tools_once() {
    let app = Harness::spawn(Cart::default()).await;
    app.connect(1).await;

    app.wire.deliver(session_created());
    app.wire.deliver(session_created());
    app.wire.deliver(response_done(&[("clear_cart", "c1", json!({}))]));

    let sent = app.wire.wait_for_sent(2).await;
    assert_eq!(app.wire.sent_types(), vec!["session.update", "response.create"]);
    assert_eq!(sent.len(), 2);
    assert!(app.handle.snapshot().tools_configured);

    app.shutdown().await;
}

#[tokio::test]
async fn test_session_created_before_channel_open_announces_tools() {
    let app = Harness::spawn(Cart::default()).await;
    app.handle.start().await.unwrap();
    let wire = Arc::clone(&app.wire);
    wait_until(move || count(&wire.channels_opened) >= 1).await;
    let handle = app.handle.clone();
    wait_until(move || handle.snapshot().session == SessionState::Connecting).await;

    // Negotiation may still be in flight; the signal queues until it lands
    let wire = Arc::clone(&app.wire);
    wait_until(move || !wire.answers().is_empty()).await;
    app.wire.deliver(session_created());
    app.wire.open();

    let sent = app.wire.wait_for_sent(1).await;
    assert_eq!(sent[0]["type"], "session.update");
    app.wait_for_state(SessionState::Active).await;
    assert!(app.handle.snapshot().tools_configured);

    app.wire.deliver(session_created());
    app.wire
        .deliver(response_done(&[("clear_cart", "c1", json!({}))]));
    app.wire.wait_for_sent(2).await;
    assert_eq!(app.wire.sent_types(), vec!["session.update", "response.create"]);

    app.shutdown().await;
}

#[tokio::test]
async fn test_batched_calls_apply_in_order() {
    let app = Harness::spawn(Playlist::new([demo_track()])).await;
    app.connect(1).await;
    app.wire.deliver(session_created());
    app.wire.wait_for_sent(1).await;

    let mut batch = response_done(&[
        (
            "add_track",
            "c1",
            json!({
                "track_id": "1",
                "title": "Blue in Green",
                "artist": "Miles Davis",
                "url": "https://example.com/blue.mp3"
            }),
        ),
        ("play_track", "c2", json!({ "track_id": "1" })),
        ("remove_track", "c3", json!({ "track_id": "0" })),
        ("no_such_tool", "c4", json!({})),
        ("remove_track", "c5", json!({})),
    ]);
    // Arguments that are not JSON at all, between the play and the remove
    batch["response"]["output"].as_array_mut().unwrap().insert(
        2,
        json!({
            "type": "function_call",
            "name": "remove_track",
            "call_id": "c2b",
            "arguments": "{bad",
        }),
    );
    app.wire.deliver(batch);

    app.wait_for_domain(|playlist| playlist.tracks.len() == 1 && playlist.playing)
        .await;
    let snapshot = app.handle.snapshot().domain;
    assert_eq!(snapshot.tracks[0].id, "1");
    assert_eq!(snapshot.now_playing.as_deref(), Some("1"));

    // add and remove narrate; play is silent; the bad calls are skipped
    // without stopping the rest of the batch
    let sent = app.wire.wait_for_sent(3).await;
    assert_eq!(sent.len(), 3);
    assert_eq!(
        app.wire.sent_types(),
        vec!["session.update", "response.create", "response.create"]
    );

    app.shutdown().await;
}

#[tokio::test]
async fn test_new_session_announces_tools_again() {
    let app = Harness::spawn(Cart::default()).await;

    app.connect(1).await;
    app.wire.deliver(session_created());
    app.wire.wait_for_sent(1).await;

    app.handle.stop().await.unwrap();
    app.wait_for_state(SessionState::Idle).await;
    assert!(!app.handle.snapshot().tools_configured);
    assert_eq!(count(&app.wire.connections_closed), 1);

    app.connect(2).await;
    app.wire.deliver(session_created());
    app.wire.wait_for_sent(2).await;
    assert_eq!(
        app.wire.sent_types(),
        vec!["session.update", "session.update"]
    );

    app.shutdown().await;
}

#[tokio::test]
async fn test_console_actions_apply_without_a_session() {
    let app = Harness::spawn(Playlist::new([demo_track()])).await;

    app.handle
        .act(PlaylistAction::Play(Some("0".to_string())))
        .await
        .unwrap();
    app.wait_for_domain(|playlist| playlist.playing).await;
    assert_eq!(
        app.handle.snapshot().domain.now_playing.as_deref(),
        Some("0")
    );
    assert_eq!(app.handle.snapshot().session, SessionState::Idle);
    assert!(app.wire.sent().is_empty());

    // Resuming with nothing selected after removing the selection does nothing
    app.handle
        .act(PlaylistAction::Remove("0".to_string()))
        .await
        .unwrap();
    app.handle.act(PlaylistAction::Play(None)).await.unwrap();
    app.wait_for_domain(|playlist| playlist.tracks.is_empty()).await;
    let snapshot = app.handle.snapshot().domain;
    assert!(!snapshot.playing);
    assert_eq!(snapshot.now_playing, None);

    app.shutdown().await;
}

#[tokio::test]
async fn test_remote_close_ends_session_but_keeps_state() {
    let app = Harness::spawn(Cart::default()).await;
    app.connect(1).await;
    app.wire.deliver(session_created());
    app.wire.deliver(response_done(&[(
        "add_item",
        "c1",
        json!({ "id": "b2", "item_name": "Scone", "price": 3.0 }),
    )]));
    app.wait_for_domain(|cart| cart.items.len() == 1).await;

    app.wire.close_remote();
    app.wait_for_state(SessionState::Idle).await;
    assert_eq!(app.handle.snapshot().domain.items[0].id, "b2");
    assert_eq!(count(&app.wire.tracks_stopped), 1);

    app.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_tears_down_active_session() {
    let app = Harness::spawn(Cart::default()).await;
    app.connect(1).await;

    let wire = Arc::clone(&app.wire);
    app.shutdown().await;
    assert_eq!(count(&wire.connections_closed), 1);
    assert!(!wire.open());
}

#[test]
fn test_replay_matches_live_outbound() {
    let transcript = [
        session_created(),
        response_done(&[(
            "add_item",
            "c1",
            json!({ "id": "a1", "item_name": "Tea", "price": 2.5 }),
        )]),
        response_done(&[(
            "update_quantity",
            "c2",
            json!({ "id": "a1", "quantity": 0 }),
        )]),
        response_done(&[("get_cart", "c3", json!({}))]),
    ]
    .iter()
    .map(|event| event.to_string())
    .collect::<Vec<_>>()
    .join("\n");

    let outcome = replay(
        Cart::default(),
        SessionOptions::default(),
        Cursor::new(transcript),
    )
    .unwrap();

    // quantity 0 violates the schema minimum and is skipped
    assert_eq!(outcome.snapshot.items[0].quantity, 1);
    let outbound: Vec<&ClientEvent> = outcome.outbound().collect();
    assert_eq!(outbound.len(), 4);
    assert!(matches!(outbound[0], ClientEvent::SessionUpdate { .. }));
    assert!(matches!(
        outbound[2],
        ClientEvent::ConversationItemCreate { .. }
    ));
    assert_eq!(outbound[3], &ClientEvent::response_create());
    assert_eq!(outcome.steps[1].line, 2);
}
