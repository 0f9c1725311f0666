use std::io;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use server::config::ServerConfig;
use server::handlers;
use server::registry::SessionRegistry;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config =
        ServerConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let registry = SessionRegistry::new(config.grace_period);

    log::info!(
        "GeoSync server ready on http://{}:{}",
        config.hostname,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST"]),
            )
            .app_data(web::Data::new(registry.clone()))
            .configure(handlers::root)
    })
    .bind(config.bind_address())?
    .run()
    .await
}
