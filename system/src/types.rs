use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type ConnectionId = u32;

/// Monotonic milliseconds, as reported by the host (e.g. `performance.now()`).
pub type Millis = u64;

/// Wall-clock milliseconds since the unix epoch.
pub type Timestamp = i64;

pub const SESSION_ID_MIN_LEN: usize = 4;
pub const SESSION_ID_MAX_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    #[error("session id must be between 4 and 20 characters, got {0}")]
    Length(usize),
    #[error("session id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Case-normalized session identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionKey(String);

impl SessionKey {
    /// First 8 hex digits of a random uuid, upper-cased.
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..8].to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionKey {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let len = normalized.chars().count();
        if !(SESSION_ID_MIN_LEN..=SESSION_ID_MAX_LEN).contains(&len) {
            return Err(SessionIdError::Length(len));
        }
        if let Some(c) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(SessionIdError::InvalidCharacter(c));
        }
        Ok(Self(normalized))
    }
}

impl std::convert::TryFrom<String> for SessionKey {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionKey> for String {
    fn from(key: SessionKey) -> Self {
        key.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a participant across reconnects.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantToken(uuid::Uuid);

impl ParticipantToken {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ParticipantToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
