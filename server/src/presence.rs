use crate::session::Session;
use system::{Role, ServerMessage};

/// Sends the current presence to every member of the session.
pub fn broadcast_presence(session: &Session) {
    let presence = session.presence();
    for member in session.members() {
        member.send(ServerMessage::Presence(presence));
    }
}

/// Tells the follower its view is no longer maintained.
pub fn notify_source_lost(session: &Session) {
    if let Some(follower) = &session.follower {
        follower.send(ServerMessage::SourceLost);
    }
}

/// Called after `role` was vacated.
pub fn member_left(session: &Session, role: Role) {
    if role == Role::Source {
        notify_source_lost(session);
    }
    broadcast_presence(session);
}
