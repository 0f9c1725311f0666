use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use system::{decode_client_message, encode, ClientMessage, ConnectionId, Role, ServerMessage, SessionKey};

use crate::error::SyncError;
use crate::registry::SessionRegistry;
use crate::session::ConnectionTx;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Unbound,
    Bound { session: SessionKey, role: Role },
    Disconnected,
}

/// Protocol side of one connection, independent of the socket.
pub struct ConnectionLink {
    id: ConnectionId,
    state: ConnectionState,
    registry: SessionRegistry,
    tx: ConnectionTx,
}

impl ConnectionLink {
    pub fn new(registry: SessionRegistry, tx: ConnectionTx) -> Self {
        let id = registry.next_connection_id();
        log::info!("Connection {} opened", id);
        Self {
            id,
            state: ConnectionState::Unbound,
            registry,
            tx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn handle_text(&mut self, text: &str) {
        match decode_client_message(text) {
            Ok(message) => self.handle(message),
            Err(e) => log::warn!("Connection {} sent {}", self.id, e),
        }
    }

    pub fn handle(&mut self, message: ClientMessage) {
        log::debug!("Ingress from {}: {:?}", self.id, message);
        let next = match (&self.state, message) {
            (ConnectionState::Disconnected, message) => {
                log::debug!("Connection {} is closed, ignored {:?}", self.id, message);
                None
            }
            (
                state,
                ClientMessage::Join {
                    session_id,
                    role,
                    token,
                },
            ) => {
                let current = match state {
                    ConnectionState::Bound { session, .. } => Some(session),
                    _ => None,
                };
                self.registry
                    .join(self.id, &self.tx, current, &session_id, role, token)
                    .ok()
                    .map(|joined| ConnectionState::Bound {
                        session: joined.key,
                        role: joined.role,
                    })
            }
            (ConnectionState::Bound { session, .. }, ClientMessage::ViewUpdate(camera)) => {
                match self.registry.publish(self.id, session, camera) {
                    Ok(_) => {}
                    Err(SyncError::InvalidView) => {
                        log::warn!("Connection {} sent out of range view {:?}", self.id, camera)
                    }
                    Err(e) => log::debug!("Dropped view from {}: {}", self.id, e),
                }
                None
            }
            (ConnectionState::Bound { session, .. }, ClientMessage::ResyncRequest) => {
                if let Err(e) = self.registry.resync(self.id, session) {
                    log::debug!("Resync for {} ignored: {}", self.id, e);
                }
                None
            }
            (ConnectionState::Unbound, message) => {
                log::debug!("Connection {} is not bound, ignored {:?}", self.id, message);
                None
            }
        };
        if let Some(state) = next {
            self.state = state;
        }
    }

    pub fn disconnect(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        if let ConnectionState::Bound { session, .. } = &previous {
            self.registry.leave(self.id, session);
        }
        if previous != ConnectionState::Disconnected {
            log::info!("Connection {} closed", self.id);
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ServerMessage);

struct ConnectionActor {
    link: ConnectionLink,
    rx: Option<UnboundedReceiver<ServerMessage>>,
    heartbeat: Instant,
}

impl ConnectionActor {
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.heartbeat) > CLIENT_TIMEOUT {
                log::info!("Connection {} timed out", act.link.id());
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);

        let addr = ctx.address().recipient();
        if let Some(mut rx) = self.rx.take() {
            let id = self.link.id();
            tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    addr.do_send(ConnectionActorMessage(message));
                }
                log::debug!("Egress for connection {} terminated", id);
            });
        }
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.link.disconnect();
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.heartbeat = Instant::now();
                self.link.handle_text(&text);
            }
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ignored binary frame of {} bytes", bin.len());
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(e) => {
                log::warn!("Connection {} protocol error: {}", self.link.id(), e);
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: ConnectionActorMessage, ctx: &mut Self::Context) -> Self::Result {
        match encode(&msg.0) {
            Ok(text) => ctx.text(text),
            Err(e) => log::error!("Failed to encode {:?}: {}", msg.0, e),
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    registry: web::Data<SessionRegistry>,
) -> Result<HttpResponse, Error> {
    let (tx, rx) = unbounded_channel();
    ws::start(
        ConnectionActor {
            link: ConnectionLink::new(registry.get_ref().clone(), tx),
            rx: Some(rx),
            heartbeat: Instant::now(),
        },
        &req,
        stream,
    )
}
