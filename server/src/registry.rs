use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use system::{
    Camera, ConnectionId, ParticipantToken, Role, ServerMessage, SessionKey, Timestamp, ViewState,
};

use crate::arbiter;
use crate::broadcaster;
use crate::error::SyncError;
use crate::presence;
use crate::session::{ConnectionTx, Session, SessionDescription};

type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    pub key: SessionKey,
    pub role: Role,
    pub token: ParticipantToken,
}

struct Inner {
    sessions: Mutex<HashMap<SessionKey, SharedSession>>,
    grace_period: Duration,
    connection_id_source: AtomicU32,
}

/// All live sessions of the process.
///
/// The table lock only guards lookups, inserts and removals; everything a
/// session holds is mutated under that session's own lock.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                grace_period,
                connection_id_source: AtomicU32::new(1),
            }),
        }
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.inner.connection_id_source.fetch_add(1, Ordering::Relaxed)
    }

    /// Binds a connection to a role in `session_id`, creating the session if
    /// needed. `current` is the session the connection is bound in, if any;
    /// it is left once the new binding succeeded.
    ///
    /// Rejections are reported to the connection through `tx` as well as
    /// returned.
    pub fn join(
        &self,
        connection_id: ConnectionId,
        tx: &ConnectionTx,
        current: Option<&SessionKey>,
        session_id: &str,
        role: Role,
        token: Option<ParticipantToken>,
    ) -> Result<Joined, SyncError> {
        let key: SessionKey = match session_id.parse() {
            Ok(key) => key,
            Err(e) => {
                log::warn!("Connection {} sent invalid session id {:?}", connection_id, session_id);
                let _ = tx.send(ServerMessage::invalid_session_id(&e));
                return Err(e.into());
            }
        };

        let joined = loop {
            let shared = self.get_or_create(&key);
            let mut session = match self.lock(&key, &shared) {
                Some(session) if !session.retired => session,
                Some(retired) => {
                    drop(retired);
                    self.forget(&key, &shared);
                    continue;
                }
                None => continue,
            };
            break Self::bind(&mut *session, connection_id, tx, role, token)?;
        };

        if let Some(previous) = current.filter(|previous| **previous != key) {
            self.leave(connection_id, previous);
        }
        Ok(joined)
    }

    fn bind(
        session: &mut Session,
        connection_id: ConnectionId,
        tx: &ConnectionTx,
        role: Role,
        token: Option<ParticipantToken>,
    ) -> Result<Joined, SyncError> {
        let outcome = match arbiter::try_bind(session, role, connection_id, token, tx.clone()) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!(
                    "Connection {} refused in session {}: {}",
                    connection_id,
                    session.key,
                    e
                );
                let _ = tx.send(ServerMessage::role_taken(role));
                return Err(e);
            }
        };

        if let Some(previous) = &outcome.superseded {
            log::info!(
                "[Session {}] {} reclaimed by connection {} from {}",
                session.key,
                role,
                connection_id,
                previous.connection_id
            );
            previous.send(ServerMessage::Superseded);
        }
        if outcome.fresh {
            log::info!("[Session {}] {} joined ({})", session.key, role, connection_id);
        }

        if let Some(member) = session.slot(role) {
            member.send(ServerMessage::JoinOk {
                role,
                session_id: session.key.clone(),
                presence: session.presence(),
                last_view_state: session.last_view_state,
                token: outcome.token,
            });
        }
        if outcome.left == Some(Role::Source) {
            presence::notify_source_lost(session);
        }
        presence::broadcast_presence(session);
        if role == Role::Follower {
            broadcaster::sync_follower(session);
        }

        Ok(Joined {
            key: session.key.clone(),
            role,
            token: outcome.token,
        })
    }

    pub fn publish(
        &self,
        connection_id: ConnectionId,
        key: &SessionKey,
        camera: Camera,
    ) -> Result<ViewState, SyncError> {
        let now: Timestamp = chrono::Utc::now().timestamp_millis();
        self.with_session(key, |session| {
            broadcaster::publish(session, connection_id, camera, now)
        })
        .unwrap_or(Err(SyncError::SessionGoneOrEmpty))
    }

    pub fn resync(
        &self,
        connection_id: ConnectionId,
        key: &SessionKey,
    ) -> Result<Option<ViewState>, SyncError> {
        self.with_session(key, |session| broadcaster::resync(session, connection_id))
            .unwrap_or(Err(SyncError::SessionGoneOrEmpty))
    }

    /// Releases whatever role the connection holds in `key`. Used both for
    /// transport disconnects and for moving to another session.
    pub fn leave(&self, connection_id: ConnectionId, key: &SessionKey) -> Option<Role> {
        let shared = self.sessions().get(key).cloned()?;
        let mut session = self.lock(key, &shared)?;
        if session.retired {
            return None;
        }

        let role = arbiter::unbind(&mut *session, connection_id)?;
        log::info!("[Session {}] {} left ({})", session.key, role, connection_id);
        presence::member_left(&session, role);
        if session.is_empty() {
            self.schedule_reap(&shared, &mut *session);
        }
        Some(role)
    }

    pub fn describe(&self, key: &SessionKey) -> Option<SessionDescription> {
        self.with_session(key, |session| session.describe())
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    fn schedule_reap(&self, shared: &SharedSession, session: &mut Session) {
        session.cancel_reaper();

        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        let record: Weak<Mutex<Session>> = Arc::downgrade(shared);
        let key = session.key.clone();
        let grace_period = self.inner.grace_period;
        log::debug!("Session {} is empty, reaping in {:?}", key, grace_period);
        session.reaper = Some(tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            if let (Some(inner), Some(record)) = (registry.upgrade(), record.upgrade()) {
                SessionRegistry { inner }.reap(&key, &record);
            }
        }));
    }

    /// Removes `record` if it is still the live session for `key` and still
    /// empty. A newer record under the same key keeps its own timer.
    fn reap(&self, key: &SessionKey, record: &SharedSession) {
        let mut sessions = self.sessions();
        let expired = match sessions.get(key) {
            Some(shared) if Arc::ptr_eq(shared, record) => {
                let mut session = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if session.is_empty() {
                    session.retired = true;
                    session.reaper = None;
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if expired {
            sessions.remove(key);
            log::info!("Session {} removed after grace period", key);
        }
    }

    fn with_session<T, F>(&self, key: &SessionKey, f: F) -> Option<T>
    where
        F: FnOnce(&mut Session) -> T,
    {
        let shared = self.sessions().get(key).cloned()?;
        let mut session = self.lock(key, &shared)?;
        if session.retired {
            return None;
        }
        Some(f(&mut *session))
    }

    fn get_or_create(&self, key: &SessionKey) -> SharedSession {
        self.sessions()
            .entry(key.clone())
            .or_insert_with(|| {
                log::info!("Session {} created", key);
                Arc::new(Mutex::new(Session::new(key.clone())))
            })
            .clone()
    }

    /// Locks one session. A poisoned session is dropped from the table so the
    /// next join starts over; other sessions are unaffected.
    fn lock<'a>(&self, key: &SessionKey, shared: &'a SharedSession) -> Option<MutexGuard<'a, Session>> {
        let result = shared.lock();
        match result {
            Ok(session) => Some(session),
            Err(poisoned) => {
                drop(poisoned);
                log::error!("Session {} is poisoned, dropping it", key);
                self.forget(key, shared);
                None
            }
        }
    }

    /// Drops `shared` from the table unless `key` already maps to a newer
    /// record. Must not be called with a session lock held.
    fn forget(&self, key: &SessionKey, shared: &SharedSession) {
        let mut sessions = self.sessions();
        if sessions
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, shared))
        {
            sessions.remove(key);
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, SharedSession>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
