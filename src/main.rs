mod app;
mod config;
mod db;
mod dto;
mod errors;
mod handlers;
mod models;
mod services;
mod utils;

#[cfg(test)]
mod tests;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};

use crate::app::{AppData, StartupError};
use crate::config::Settings;
use crate::utils::middleware::SessionAuth;

fn cors(settings: &Settings) -> Cors {
    match &settings.cors_origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials(),
        None => Cors::default(),
    }
}

async fn run() -> Result<(), StartupError> {
    let settings = Settings::from_env()?;
    let pool = db::connect(&settings.database_url).await?;
    let bind_addr = settings.bind_addr.clone();
    let data = AppData::new(pool, settings)?;

    log::info!(
        "serving workspace {} on http://{}",
        data.file_manager.root().display(),
        bind_addr
    );

    HttpServer::new(move || {
        let data = data.clone();
        App::new()
            .wrap(SessionAuth)
            .wrap(cors(&data.settings))
            .wrap(Logger::default())
            .configure(|cfg| data.configure(cfg))
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
    Ok(())
}
