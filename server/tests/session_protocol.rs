use std::time::Duration;

use server::connection::{ConnectionLink, ConnectionState};
use server::registry::SessionRegistry;
use system::{decode_server_message, encode, ClientMessage, Role, ServerMessage, ViewState};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

struct Client {
    link: ConnectionLink,
    rx: UnboundedReceiver<ServerMessage>,
}

impl Client {
    fn connect(registry: &SessionRegistry) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            link: ConnectionLink::new(registry.clone(), tx),
            rx,
        }
    }

    fn send(&mut self, text: &str) {
        self.link.handle_text(text);
    }

    /// Everything received so far, as it would look on the wire.
    fn received(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            let text = encode(&message).unwrap();
            messages.push(decode_server_message(&text).unwrap());
        }
        messages
    }

    fn views(&mut self) -> Vec<ViewState> {
        self.received()
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::ViewSync(view) => Some(view),
                _ => None,
            })
            .collect()
    }
}

fn registry() -> SessionRegistry {
    SessionRegistry::new(Duration::from_secs(30))
}

#[tokio::test]
async fn follower_observes_source_updates_in_order() {
    let registry = registry();
    let mut source = Client::connect(&registry);
    let mut follower = Client::connect(&registry);

    source.send(r#"{"type":"join","sessionId":"nyc1","role":"tracker"}"#);
    follower.send(r#"{"type":"join","sessionId":"NYC1","role":"tracked"}"#);
    source.received();
    follower.received();

    for i in 0..10 {
        source.send(&format!(
            r#"{{"type":"view-update","latitude":{},"longitude":-74.0,"zoom":13}}"#,
            i * 5
        ));
    }

    let latitudes: Vec<f64> = follower.views().iter().map(|v| v.latitude).collect();
    assert_eq!(latitudes.len(), 10);
    assert!(latitudes.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(latitudes.last(), Some(&45.0));
    assert!(source.views().is_empty());
}

#[tokio::test]
async fn follower_cannot_drive() {
    let registry = registry();
    let mut source = Client::connect(&registry);
    let mut follower = Client::connect(&registry);

    source.send(r#"{"type":"join","sessionId":"NYC1","role":"source"}"#);
    follower.send(r#"{"type":"join","sessionId":"NYC1","role":"follower"}"#);
    source.received();

    follower.send(r#"{"type":"view-update","latitude":1,"longitude":1,"zoom":1}"#);
    assert!(source.received().is_empty());
    assert!(registry
        .describe(&"NYC1".parse().unwrap())
        .unwrap()
        .last_view_state
        .is_none());
}

#[tokio::test]
async fn second_source_is_rejected() {
    let registry = registry();
    let mut first = Client::connect(&registry);
    let mut second = Client::connect(&registry);

    first.send(r#"{"type":"join","sessionId":"NYC1","role":"source"}"#);
    second.send(r#"{"type":"join","sessionId":"NYC1","role":"source"}"#);

    assert_eq!(second.received(), vec![ServerMessage::role_taken(Role::Source)]);
    assert_eq!(second.link.state(), &ConnectionState::Unbound);
}

#[tokio::test]
async fn source_loss_reaches_follower_and_stale_updates_are_dropped() {
    let registry = registry();
    let mut source = Client::connect(&registry);
    let mut follower = Client::connect(&registry);

    source.send(r#"{"type":"join","sessionId":"NYC1","role":"source"}"#);
    follower.send(r#"{"type":"join","sessionId":"NYC1","role":"follower"}"#);
    source.send(r#"{"type":"view-update","latitude":1,"longitude":1,"zoom":1}"#);
    follower.received();

    source.link.disconnect();
    let received = follower.received();
    assert_eq!(received.first(), Some(&ServerMessage::SourceLost));

    source.send(r#"{"type":"view-update","latitude":2,"longitude":2,"zoom":2}"#);
    follower.send(r#"{"type":"view-update","latitude":3,"longitude":3,"zoom":3}"#);
    assert!(follower.views().is_empty());

    // the follower can still ask for the last good view
    follower.send(r#"{"type":"resync-request"}"#);
    let views = follower.views();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].latitude, 1.0);
}

#[tokio::test]
async fn reconnecting_participant_reclaims_role_with_token() {
    let registry = registry();
    let mut stale = Client::connect(&registry);
    let mut follower = Client::connect(&registry);

    stale.send(r#"{"type":"join","sessionId":"NYC1","role":"source"}"#);
    let token = match stale.received().first() {
        Some(ServerMessage::JoinOk { token, .. }) => *token,
        other => panic!("unexpected {:?}", other),
    };
    follower.send(r#"{"type":"join","sessionId":"NYC1","role":"follower"}"#);
    follower.received();

    // the old socket is half-open; a new one presents the token
    let mut fresh = Client::connect(&registry);
    fresh.link.handle(ClientMessage::Join {
        session_id: "NYC1".into(),
        role: Role::Source,
        token: Some(token),
    });
    assert!(matches!(
        fresh.received().first(),
        Some(ServerMessage::JoinOk { role: Role::Source, .. })
    ));
    assert!(stale.received().contains(&ServerMessage::Superseded));

    // the stale socket finally closing must not evict the new source
    stale.link.disconnect();
    assert!(!follower.received().contains(&ServerMessage::SourceLost));

    fresh.send(r#"{"type":"view-update","latitude":5,"longitude":5,"zoom":5}"#);
    assert_eq!(follower.views().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_session_disappears_after_grace_period() {
    let registry = registry();
    let mut source = Client::connect(&registry);
    source.send(r#"{"type":"join","sessionId":"NYC1","role":"source"}"#);
    source.link.disconnect();

    tokio::time::sleep(Duration::from_secs(31)).await;
    tokio::task::yield_now().await;
    assert!(registry.is_empty());
}
