use crate::error::SyncError;
use crate::session::Session;
use system::{Camera, ConnectionId, Role, ServerMessage, Timestamp, ViewState};

/// Accepts a view from the session's source, stores it as the latest state
/// and relays it to the follower.
pub fn publish(
    session: &mut Session,
    connection_id: ConnectionId,
    camera: Camera,
    now: Timestamp,
) -> Result<ViewState, SyncError> {
    if !session.holds(Role::Source, connection_id) {
        return Err(SyncError::NotSource);
    }
    if !camera.is_valid() {
        return Err(SyncError::InvalidView);
    }

    let view = ViewState::stamp(camera, now);
    session.last_view_state = Some(view);
    if let Some(follower) = &session.follower {
        follower.send(ServerMessage::ViewSync(view));
    }
    Ok(view)
}

/// Sends the stored view to the requesting member only.
pub fn resync(session: &Session, connection_id: ConnectionId) -> Result<Option<ViewState>, SyncError> {
    let member = session
        .member(connection_id)
        .ok_or(SyncError::SessionGoneOrEmpty)?;
    if let Some(view) = session.last_view_state {
        member.send(ServerMessage::ViewSync(view));
    }
    Ok(session.last_view_state)
}

/// Brings a freshly bound follower up to date with the stored view.
pub fn sync_follower(session: &Session) {
    if let (Some(follower), Some(view)) = (&session.follower, session.last_view_state) {
        follower.send(ServerMessage::ViewSync(view));
    }
}
