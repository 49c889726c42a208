use log::info;
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
    Statement,
};
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::config::AppConfig;
use crate::entity::user;

pub const ADMIN_USERNAME: &str = "admin";
// well-known bootstrap credentials, a development convenience only
const ADMIN_PASSWORD: &str = "admin1234";
const ADMIN_IMG: &str = "https://cdn-icons-png.flaticon.com/512/6024/6024190.png";
const ADMIN_HINT_QUESTION: &str = "master passphrase";
const ADMIN_HINT_ANSWER: &str = "master";

pub async fn connect_db(config: &AppConfig) -> DatabaseConnection {
    ensure_sqlite_path(config);
    let url = config.database_url();
    let db = Database::connect(&url)
        .await
        .unwrap_or_else(|e| panic!("db connect failed: {}", e));
    init_schema(&db).await;
    seed_admin(&db).await;
    db
}

fn ensure_sqlite_path(config: &AppConfig) {
    let raw = config.database_url();
    let path = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("sqlite:"))
        .unwrap_or(raw.as_str());
    if path.starts_with(':') || path.contains("mode=memory") {
        return;
    }
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = OpenOptions::new().create(true).write(true).open(path);
}

pub async fn init_schema(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    let exists_stmt = Statement::from_string(
        backend,
        "SELECT name FROM sqlite_master WHERE type='table' AND name='t_user' LIMIT 1",
    );
    let exists = db.query_one(exists_stmt).await.ok().flatten().is_some();
    if exists {
        return;
    }

    let sql = include_str!("../changelog-sqlite.sql");
    for stmt in split_sql(sql) {
        let _ = db.execute(Statement::from_string(backend, stmt)).await;
    }
}

/// Inserts the one well-known admin identity if no admin row exists yet.
pub async fn seed_admin(db: &DatabaseConnection) {
    let existing = user::Entity::find()
        .filter(user::Column::IsAdmin.eq(true))
        .one(db)
        .await
        .ok()
        .flatten();
    if existing.is_some() {
        return;
    }

    let admin = user::ActiveModel {
        username: Set(ADMIN_USERNAME.to_string()),
        password: Set(ADMIN_PASSWORD.to_string()),
        img: Set(Some(ADMIN_IMG.to_string())),
        is_admin: Set(true),
        hint_question: Set(Some(ADMIN_HINT_QUESTION.to_string())),
        hint_answer: Set(Some(ADMIN_HINT_ANSWER.to_string())),
        ..Default::default()
    };
    match user::Entity::insert(admin).exec(db).await {
        Ok(_) => info!("seeded admin identity '{}'", ADMIN_USERNAME),
        Err(e) => log::error!("admin seed failed: {}", e),
    }
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
