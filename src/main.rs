use actix_web::{middleware, web, App, HttpServer};
use log::info;

use zeta_backend::config::AppConfig;
use zeta_backend::configure_api;
use zeta_backend::db::connect_db;
use zeta_backend::gemini::GeminiClient;
use zeta_backend::response::json_error_handler;
use zeta_backend::transcript::TranscriptCache;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();
    let db = connect_db(&config).await;
    let gemini = GeminiClient::new(&config);
    let cache = web::Data::new(TranscriptCache::new());
    let server_port = config.server_port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(gemini.clone()))
            .app_data(cache.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .configure(configure_api)
    })
    .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
