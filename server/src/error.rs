use system::{Role, SessionIdError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("{0} role already taken")]
    RoleTaken(Role),
    #[error("connection does not hold the source role")]
    NotSource,
    #[error("session is not tracked")]
    SessionGoneOrEmpty,
    #[error("invalid session id: {0}")]
    InvalidSessionId(#[from] SessionIdError),
    #[error("view is out of range")]
    InvalidView,
}
