use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Instant;

mod config;
mod controllers;
mod db;
mod manager;
mod models;

use db::Database;
use manager::{BotManager, TelegramWorkerFactory};

pub struct AppState {
    pub db: Arc<Database>,
    pub manager: Arc<BotManager>,
    pub started_at: Instant,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting masterbot backend v{}", controllers::health::VERSION);

    let db = Arc::new(
        Database::new(&config::database_url()).expect("Failed to initialize database"),
    );

    let manager = Arc::new(BotManager::new(db.clone(), Arc::new(TelegramWorkerFactory)));

    match manager.reconcile_startup() {
        Ok(0) => {}
        Ok(n) => log::warn!("Flagged {} stale running bot(s) as error after restart", n),
        Err(e) => log::error!("Startup reconciliation failed: {}", e),
    }

    let app_state = web::Data::new(AppState {
        db: db.clone(),
        manager: manager.clone(),
        started_at: Instant::now(),
    });

    let port = config::port();
    log::info!("Listening on 0.0.0.0:{}", port);

    let result = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(app_state.clone())
            .configure(controllers::health::config_routes)
            .configure(controllers::auth::config_routes)
            .configure(controllers::bots::config_routes)
            .configure(controllers::stats::config_routes)
            .service(Files::new("/", config::public_dir()).index_file("index.html"))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await;

    log::info!("Server shutting down; stopping all bots");
    manager.stop_all().await;

    result
}
