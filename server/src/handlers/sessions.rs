use crate::registry::SessionRegistry;
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use system::SessionKey;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSession {
    session_id: SessionKey,
}

pub fn configure_session_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/sessions")
            .service(web::resource("/new").route(web::get().to(new_session)))
            .service(web::resource("/{session_id}").route(web::get().to(show_session))),
    );
}

pub async fn new_session() -> impl Responder {
    HttpResponse::Ok().json(NewSession {
        session_id: SessionKey::generate(),
    })
}

pub async fn show_session(
    session_id: web::Path<String>,
    registry: web::Data<SessionRegistry>,
) -> impl Responder {
    match session_id.parse::<SessionKey>() {
        Err(e) => HttpResponse::BadRequest().body(e.to_string()),
        Ok(key) => match registry.describe(&key) {
            Some(description) => HttpResponse::Ok().json(description),
            None => HttpResponse::NotFound().finish(),
        },
    }
}
