use crate::types::{ParticipantToken, SessionKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "tracker")]
    Source,
    #[serde(alias = "tracked")]
    Follower,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Follower => "follower",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map camera position as produced by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
}

impl Camera {
    pub fn new(latitude: f64, longitude: f64, zoom: f64) -> Self {
        Self {
            latitude,
            longitude,
            zoom,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.zoom.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.zoom >= 0.0
    }
}

/// Camera stamped by the server when it was accepted.
///
/// `timestamp` is only meant for latency display. Ordering always follows
/// transport order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub timestamp: Timestamp,
}

impl ViewState {
    pub fn stamp(camera: Camera, timestamp: Timestamp) -> Self {
        Self {
            latitude: camera.latitude,
            longitude: camera.longitude,
            zoom: camera.zoom,
            timestamp,
        }
    }

    pub fn camera(&self) -> Camera {
        Camera::new(self.latitude, self.longitude, self.zoom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub source_connected: bool,
    pub follower_connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    RoleTaken,
    InvalidSessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        session_id: String,
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<ParticipantToken>,
    },
    ViewUpdate(Camera),
    ResyncRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    JoinOk {
        role: Role,
        session_id: SessionKey,
        presence: Presence,
        last_view_state: Option<ViewState>,
        token: ParticipantToken,
    },
    JoinRejected {
        reason: RejectReason,
        message: String,
    },
    ViewSync(ViewState),
    Presence(Presence),
    SourceLost,
    /// The role was reclaimed by another connection presenting the same token.
    Superseded,
}

impl ServerMessage {
    pub fn role_taken(role: Role) -> Self {
        let name = match role {
            Role::Source => "Source",
            Role::Follower => "Follower",
        };
        ServerMessage::JoinRejected {
            reason: RejectReason::RoleTaken,
            message: format!("{} role already taken in this session.", name),
        }
    }

    pub fn invalid_session_id(detail: impl fmt::Display) -> Self {
        ServerMessage::JoinRejected {
            reason: RejectReason::InvalidSessionId,
            message: format!("Invalid session id: {}", detail),
        }
    }
}

#[derive(Debug, Error)]
#[error("malformed message: {0}")]
pub struct ProtocolError(#[from] serde_json::Error);

pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}
