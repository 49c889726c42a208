use actix_web::body::BoxBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App, Error};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{json, Value};

use zeta_backend::config::AppConfig;
use zeta_backend::configure_api;
use zeta_backend::db;
use zeta_backend::gemini::GeminiClient;
use zeta_backend::response::json_error_handler;
use zeta_backend::transcript::TranscriptCache;

pub async fn test_db() -> DatabaseConnection {
    // one pooled connection, otherwise every checkout is a fresh :memory: db
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.max_connections(1);
    let db = Database::connect(opts)
        .await
        .expect("in-memory sqlite connect");
    db::init_schema(&db).await;
    db::seed_admin(&db).await;
    db
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server_port: 0,
        sqlite_path: ":memory:".to_string(),
        database_url: None,
        jwt_secret: "test-secret".to_string(),
        token_header: "token".to_string(),
        gemini_api_key: "test-key".to_string(),
        gemini_model: "gemini-2.5-flash".to_string(),
    }
}

pub async fn spawn_app(
    db: DatabaseConnection,
) -> impl Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error> {
    let config = test_config();
    let gemini = GeminiClient::new(&config);
    test::init_service(
        App::new()
            .app_data(web::Data::new(config))
            .app_data(web::Data::new(db))
            .app_data(web::Data::new(gemini))
            .app_data(web::Data::new(TranscriptCache::new()))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .configure(configure_api),
    )
    .await
}

pub async fn post_json<S>(app: &S, path: &str, token: Option<&str>, body: Value) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let mut req = test::TestRequest::post().uri(path).set_json(&body);
    if let Some(token) = token {
        req = req.insert_header(("token", token));
    }
    let res = test::call_service(app, req.to_request()).await;
    test::read_body_json(res).await
}

pub async fn register<S>(app: &S, username: &str, password: &str) -> Value
where
    S: Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    post_json(
        app,
        "/api/user/register",
        None,
        json!({
            "username": username,
            "password": password,
            "hintQuestion": "first pet",
            "hintAnswer": "rex",
        }),
    )
    .await
}

pub async fn login<S>(app: &S, username: &str, password: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let body = post_json(
        app,
        "/api/user/login",
        None,
        json!({ "username": username, "password": password }),
    )
    .await;
    assert_eq!(body["code"], 0, "login failed: {}", body["msg"]);
    body["data"]["token"].as_str().expect("token").to_string()
}

pub async fn admin_token<S>(app: &S) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    login(app, "admin", "admin1234").await
}

pub async fn create_character<S>(app: &S, token: &str, name: &str, persona: &str, public: bool)
where
    S: Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let body = post_json(
        app,
        "/api/character/create",
        Some(token),
        json!({"name": name, "persona": persona, "isPublic": public}),
    )
    .await;
    assert_ok(&body);
}

pub fn assert_ok(body: &Value) {
    assert_eq!(body["code"], 0, "expected success, got: {}", body["msg"]);
}
