pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod gemini;
pub mod response;
pub mod routes;
pub mod transcript;

use actix_web::web;

pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::scope("/user").configure(routes::user::config))
            .service(web::scope("/character").configure(routes::character::config))
            .service(web::scope("/chat").configure(routes::chat::config))
            .service(web::scope("/comment").configure(routes::comment::config))
            .service(web::scope("/admin").configure(routes::admin::config)),
    );
}
