use crate::error::SyncError;
use crate::session::{ConnectionTx, Member, Session};
use system::{ConnectionId, ParticipantToken, Role};

#[derive(Debug)]
pub struct BindOutcome {
    pub token: ParticipantToken,
    /// False when the connection already held this role.
    pub fresh: bool,
    /// The other role this connection held in the same session before.
    pub left: Option<Role>,
    /// Previous holder whose token was reclaimed by this connection.
    pub superseded: Option<Member>,
}

/// Binds `connection_id` to `role`.
///
/// The slot may be taken over from another connection only when the caller
/// presents that holder's token.
pub fn try_bind(
    session: &mut Session,
    role: Role,
    connection_id: ConnectionId,
    token: Option<ParticipantToken>,
    tx: ConnectionTx,
) -> Result<BindOutcome, SyncError> {
    if let Some(holder) = session.slot(role) {
        if holder.connection_id == connection_id {
            return Ok(BindOutcome {
                token: holder.token,
                fresh: false,
                left: None,
                superseded: None,
            });
        }
        if token != Some(holder.token) {
            return Err(SyncError::RoleTaken(role));
        }
    }

    let left = session.role_of(connection_id);
    if let Some(other) = left {
        *session.slot_mut(other) = None;
    }

    let token = token.unwrap_or_else(ParticipantToken::new);
    let superseded = session.slot_mut(role).replace(Member {
        connection_id,
        token,
        tx,
    });
    session.cancel_reaper();

    Ok(BindOutcome {
        token,
        fresh: true,
        left,
        superseded,
    })
}

/// Frees whatever slot `connection_id` holds. A connection that was
/// superseded holds nothing, so this is a no-op for it.
pub fn unbind(session: &mut Session, connection_id: ConnectionId) -> Option<Role> {
    let role = session.role_of(connection_id)?;
    *session.slot_mut(role) = None;
    Some(role)
}
