use crate::connection::ws_index;
use crate::handlers::sessions::configure_session_handlers;
use actix_web::web;

mod sessions;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)));

    configure_session_handlers(cfg);
}
