mod coalescer;
mod guard;
mod surface;
mod throttle;

pub use coalescer::{FrameCoalescer, FrameScheduler};
pub use guard::{FeedbackGuard, DEFAULT_SUPPRESSION_WINDOW};
pub use surface::{RenderingSurface, SurfaceError};
pub use throttle::{EmitThrottle, DEFAULT_MIN_INTERVAL};

use crate::message::{Camera, ClientMessage, Presence, Role, ServerMessage, ViewState};
use crate::types::{Millis, ParticipantToken, SessionKey, Timestamp};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "kebab-case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    SourceOffline,
    Rejected(String),
}

/// One participant's side of a sync session.
///
/// Transport-agnostic: the host feeds transport lifecycle events, server
/// messages, local camera changes and refresh ticks, and sends whatever
/// `ClientMessage`s come back.
pub struct SyncClient<S: FrameScheduler> {
    session_id: SessionKey,
    role: Role,
    token: Option<ParticipantToken>,
    status: ConnectionStatus,
    presence: Presence,
    last_view: Option<ViewState>,
    latency: Option<Timestamp>,
    source_lost: bool,
    synced: bool,
    superseded: bool,
    coalescer: FrameCoalescer<S>,
    throttle: EmitThrottle,
    guard: FeedbackGuard,
}

impl<S: FrameScheduler> SyncClient<S> {
    pub fn new(session_id: SessionKey, role: Role, scheduler: S) -> Self {
        Self::with_timing(
            session_id,
            role,
            scheduler,
            EmitThrottle::default(),
            FeedbackGuard::default(),
        )
    }

    pub fn with_timing(
        session_id: SessionKey,
        role: Role,
        scheduler: S,
        throttle: EmitThrottle,
        guard: FeedbackGuard,
    ) -> Self {
        Self {
            session_id,
            role,
            token: None,
            status: ConnectionStatus::Connecting,
            presence: Presence::default(),
            last_view: None,
            latency: None,
            source_lost: false,
            synced: true,
            superseded: false,
            coalescer: FrameCoalescer::new(scheduler),
            throttle,
            guard,
        }
    }

    /// Transport connected or reconnected. The status stays `Connecting`
    /// until the server answers the join.
    pub fn on_connected(&mut self) -> Option<ClientMessage> {
        if self.superseded {
            return None;
        }
        self.status = ConnectionStatus::Connecting;
        Some(ClientMessage::Join {
            session_id: self.session_id.to_string(),
            role: self.role,
            token: self.token,
        })
    }

    pub fn on_disconnected(&mut self) {
        self.status = ConnectionStatus::Disconnected;
    }

    pub fn handle_server_message(&mut self, message: ServerMessage, wall_now: Timestamp) {
        log::debug!("Received {:?}", message);
        match message {
            ServerMessage::JoinOk {
                role,
                presence,
                last_view_state,
                token,
                ..
            } => {
                self.token = Some(token);
                self.presence = presence;
                self.status = ConnectionStatus::Connected;
                if role == Role::Follower {
                    if let Some(view) = last_view_state {
                        self.accept_view(view, wall_now);
                    }
                }
            }
            ServerMessage::JoinRejected { message, .. } => {
                log::warn!("Join rejected: {}", message);
                self.status = ConnectionStatus::Rejected(message);
            }
            ServerMessage::ViewSync(view) => self.accept_view(view, wall_now),
            ServerMessage::Presence(presence) => {
                self.presence = presence;
                if presence.source_connected {
                    self.source_lost = false;
                    if self.status == ConnectionStatus::SourceOffline {
                        self.status = ConnectionStatus::Connected;
                    }
                }
            }
            ServerMessage::SourceLost => {
                self.source_lost = true;
                if self.role == Role::Follower {
                    self.status = ConnectionStatus::SourceOffline;
                }
            }
            ServerMessage::Superseded => {
                self.superseded = true;
                self.status = ConnectionStatus::Disconnected;
            }
        }
    }

    fn accept_view(&mut self, view: ViewState, wall_now: Timestamp) {
        self.latency = Some(wall_now - view.timestamp);
        self.last_view = Some(view);
        self.synced = true;
        self.coalescer.receive(view);
    }

    /// Local camera moved. Returns the update to send, if the throttle lets
    /// it through.
    pub fn on_camera_changed(&mut self, now: Millis, camera: Camera) -> Option<ClientMessage> {
        if self.role != Role::Source || self.status != ConnectionStatus::Connected {
            return None;
        }
        self.throttle
            .on_camera_changed(now, camera, &self.guard)
            .map(ClientMessage::ViewUpdate)
    }

    pub fn request_resync(&mut self) -> ClientMessage {
        self.synced = false;
        ClientMessage::ResyncRequest
    }

    pub fn on_frame<R: RenderingSurface + ?Sized>(
        &mut self,
        now: Millis,
        surface: Option<&mut R>,
    ) -> Option<ViewState> {
        self.coalescer.on_frame(now, surface, &mut self.guard)
    }

    pub fn teardown(&mut self) {
        self.coalescer.teardown();
    }

    pub fn session_id(&self) -> &SessionKey {
        &self.session_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn presence(&self) -> Presence {
        self.presence
    }

    pub fn last_view(&self) -> Option<&ViewState> {
        self.last_view.as_ref()
    }

    /// Milliseconds between the server accepting the latest view and this
    /// client receiving it.
    pub fn latency(&self) -> Option<Timestamp> {
        self.latency
    }

    pub fn is_source_lost(&self) -> bool {
        self.source_lost
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn token(&self) -> Option<ParticipantToken> {
        self.token
    }

    pub fn coalescer(&self) -> &FrameCoalescer<S> {
        &self.coalescer
    }

    pub fn coalescer_mut(&mut self) -> &mut FrameCoalescer<S> {
        &mut self.coalescer
    }
}

#[cfg(test)]
mod tests {
    use super::coalescer::testing::*;
    use super::*;

    fn follower() -> SyncClient<ManualScheduler> {
        SyncClient::new("ROOM1".parse().unwrap(), Role::Follower, ManualScheduler::default())
    }

    fn join_ok(role: Role, last_view_state: Option<ViewState>) -> ServerMessage {
        ServerMessage::JoinOk {
            role,
            session_id: "ROOM1".parse().unwrap(),
            presence: Presence {
                source_connected: true,
                follower_connected: true,
            },
            last_view_state,
            token: ParticipantToken::new(),
        }
    }

    #[test]
    fn it_rejoins_with_issued_token_after_reconnect() {
        let mut client = follower();
        assert_eq!(
            client.on_connected(),
            Some(ClientMessage::Join {
                session_id: "ROOM1".into(),
                role: Role::Follower,
                token: None,
            })
        );

        let ok = join_ok(Role::Follower, None);
        let token = match &ok {
            ServerMessage::JoinOk { token, .. } => *token,
            _ => unreachable!(),
        };
        client.handle_server_message(ok, 0);
        client.on_disconnected();
        assert_eq!(client.status(), &ConnectionStatus::Disconnected);

        match client.on_connected() {
            Some(ClientMessage::Join { token: presented, .. }) => {
                assert_eq!(presented, Some(token))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn follower_starts_from_stored_view() {
        let mut client = follower();
        let mut surface = RecordingSurface::default();
        let view = ViewState::stamp(Camera::new(40.7, -74.0, 13.0), 1_000);

        client.handle_server_message(join_ok(Role::Follower, Some(view)), 1_040);
        assert_eq!(client.latency(), Some(40));
        assert_eq!(client.on_frame(0, Some(&mut surface)), Some(view));
    }

    #[test]
    fn source_lost_freezes_until_source_returns() {
        let mut client = follower();
        client.handle_server_message(join_ok(Role::Follower, None), 0);

        client.handle_server_message(ServerMessage::SourceLost, 0);
        assert!(client.is_source_lost());
        assert_eq!(client.status(), &ConnectionStatus::SourceOffline);

        client.handle_server_message(
            ServerMessage::Presence(Presence {
                source_connected: false,
                follower_connected: true,
            }),
            0,
        );
        assert!(client.is_source_lost());

        client.handle_server_message(
            ServerMessage::Presence(Presence {
                source_connected: true,
                follower_connected: true,
            }),
            0,
        );
        assert!(!client.is_source_lost());
        assert_eq!(client.status(), &ConnectionStatus::Connected);
    }

    #[test]
    fn only_a_connected_source_emits() {
        let mut client = follower();
        client.on_connected();
        assert_eq!(client.on_camera_changed(0, Camera::new(1.0, 1.0, 1.0)), None);

        let mut source =
            SyncClient::new("ROOM1".parse().unwrap(), Role::Source, ManualScheduler::default());
        assert_eq!(source.on_camera_changed(0, Camera::new(1.0, 1.0, 1.0)), None);
        source.on_connected();
        assert_eq!(source.on_camera_changed(0, Camera::new(1.0, 1.0, 1.0)), None);
        source.handle_server_message(join_ok(Role::Source, None), 0);
        assert_eq!(
            source.on_camera_changed(0, Camera::new(1.0, 1.0, 1.0)),
            Some(ClientMessage::ViewUpdate(Camera::new(1.0, 1.0, 1.0)))
        );
    }

    #[test]
    fn status_is_connecting_until_join_is_answered() {
        let mut client = follower();
        client.handle_server_message(join_ok(Role::Follower, None), 0);
        client.on_disconnected();

        client.on_connected();
        assert_eq!(client.status(), &ConnectionStatus::Connecting);
        client.handle_server_message(join_ok(Role::Follower, None), 0);
        assert_eq!(client.status(), &ConnectionStatus::Connected);
    }

    #[test]
    fn resync_marks_unsynced_until_next_view() {
        let mut client = follower();
        assert_eq!(client.request_resync(), ClientMessage::ResyncRequest);
        assert!(!client.is_synced());
        client.handle_server_message(
            ServerMessage::ViewSync(ViewState::stamp(Camera::new(1.0, 1.0, 1.0), 0)),
            0,
        );
        assert!(client.is_synced());
    }

    #[test]
    fn superseded_client_stops_rejoining() {
        let mut client = follower();
        client.on_connected();
        client.handle_server_message(ServerMessage::Superseded, 0);
        assert_eq!(client.status(), &ConnectionStatus::Disconnected);
        assert_eq!(client.on_connected(), None);
    }

    #[test]
    fn rejection_is_reported() {
        let mut client = follower();
        client.on_connected();
        client.handle_server_message(ServerMessage::role_taken(Role::Follower), 0);
        assert_eq!(
            client.status(),
            &ConnectionStatus::Rejected("Follower role already taken in this session.".into())
        );
    }
}
