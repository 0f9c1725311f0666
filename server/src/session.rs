use serde::Serialize;
use system::{ConnectionId, ParticipantToken, Presence, Role, ServerMessage, SessionKey, ViewState};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

pub type ConnectionTx = UnboundedSender<ServerMessage>;

/// A connection holding a role slot.
#[derive(Debug, Clone)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub token: ParticipantToken,
    pub tx: ConnectionTx,
}

impl Member {
    pub fn send(&self, message: ServerMessage) {
        log::debug!("Egress to {}: {:?}", self.connection_id, message);
        if self.tx.send(message).is_err() {
            log::debug!("Connection {} is already closed", self.connection_id);
        }
    }
}

pub struct Session {
    pub key: SessionKey,
    pub source: Option<Member>,
    pub follower: Option<Member>,
    pub last_view_state: Option<ViewState>,
    pub(crate) reaper: Option<JoinHandle<()>>,
    /// Set once the registry dropped this record. A retired session must not
    /// accept new members.
    pub(crate) retired: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    pub session_id: SessionKey,
    pub presence: Presence,
    pub last_view_state: Option<ViewState>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            source: None,
            follower: None,
            last_view_state: None,
            reaper: None,
            retired: false,
        }
    }

    pub fn slot(&self, role: Role) -> Option<&Member> {
        match role {
            Role::Source => self.source.as_ref(),
            Role::Follower => self.follower.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, role: Role) -> &mut Option<Member> {
        match role {
            Role::Source => &mut self.source,
            Role::Follower => &mut self.follower,
        }
    }

    pub fn holds(&self, role: Role, connection_id: ConnectionId) -> bool {
        self.slot(role)
            .map_or(false, |member| member.connection_id == connection_id)
    }

    pub fn role_of(&self, connection_id: ConnectionId) -> Option<Role> {
        [Role::Source, Role::Follower]
            .iter()
            .copied()
            .find(|role| self.holds(*role, connection_id))
    }

    pub fn member(&self, connection_id: ConnectionId) -> Option<&Member> {
        self.members()
            .find(|member| member.connection_id == connection_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.source.iter().chain(self.follower.iter())
    }

    pub fn presence(&self) -> Presence {
        Presence {
            source_connected: self.source.is_some(),
            follower_connected: self.follower.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.follower.is_none()
    }

    pub fn describe(&self) -> SessionDescription {
        SessionDescription {
            session_id: self.key.clone(),
            presence: self.presence(),
            last_view_state: self.last_view_state,
        }
    }

    pub(crate) fn cancel_reaper(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            log::debug!("Session {} is occupied again, reaping cancelled", self.key);
            reaper.abort();
        }
    }
}
