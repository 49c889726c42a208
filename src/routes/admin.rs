use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, Statement,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::entity::{character, comment, user};
use crate::error::AppError;
use crate::response::ResponseDto;
use crate::transcript::TranscriptCache;

/// Value a recovery answer is reset to; recovery can then proceed without
/// the original secret until the user changes it again.
pub const RESET_HINT_ANSWER: &str = "0000";

/// Shown wherever a comment still points at a character that was deleted.
pub const DELETED_CHARACTER_LABEL: &str = "deleted character";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/user/list").route(web::post().to(user_list)))
        .service(web::resource("/user/ban").route(web::post().to(user_ban)))
        .service(web::resource("/user/resetHint").route(web::post().to(user_reset_hint)))
        .service(web::resource("/chat/log").route(web::post().to(chat_log)))
        .service(web::resource("/character/list").route(web::post().to(character_list)))
        .service(web::resource("/character/remove").route(web::post().to(character_remove)))
        .service(web::resource("/comment/list").route(web::post().to(comment_list)))
        .service(web::resource("/comment/remove").route(web::post().to(comment_remove)));
}

#[derive(Deserialize)]
struct TargetIdRequest {
    id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminUserDto {
    id: i32,
    username: String,
    img: Option<String>,
    is_admin: bool,
    hint_question: Option<String>,
    hint_answer: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatLogDto {
    username: String,
    character_name: String,
    role: String,
    content: String,
    created: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicCharacterDto {
    id: i32,
    name: String,
    persona: String,
    img: Option<String>,
    owner_id: Option<i32>,
    owner_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminCommentDto {
    id: i32,
    character_name: String,
    username: String,
    content: String,
    created: Option<String>,
}

#[derive(Serialize)]
struct EmptyResponse {}

async fn user_list(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let users = user::Entity::find()
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let list: Vec<AdminUserDto> = users
        .into_iter()
        .map(|u| AdminUserDto {
            id: u.id,
            username: u.username,
            img: u.img,
            is_admin: u.is_admin,
            hint_question: u.hint_question,
            hint_answer: u.hint_answer,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn user_ban(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<TranscriptCache>,
    auth: AuthUser,
    payload: web::Json<TargetIdRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let target = find_non_admin_target(db.get_ref(), payload.id).await?;
    // hard delete, no cascade: characters and chat rows of this user remain
    user::Entity::delete_by_id(target.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    cache.evict_user(target.id).await;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn user_reset_hint(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<TargetIdRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let target = find_non_admin_target(db.get_ref(), payload.id).await?;
    let active = user::ActiveModel {
        id: Set(target.id),
        hint_answer: Set(Some(RESET_HINT_ANSWER.to_string())),
        ..Default::default()
    };
    user::Entity::update(active)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn chat_log(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let rows = query_all(
        db.get_ref(),
        "SELECT u.username AS username, c.name AS character_name, h.role AS role, \
         h.content AS content, h.created AS created \
         FROM t_chat_message h \
         JOIN t_user u ON h.user_id = u.id \
         JOIN t_character c ON h.character_id = c.id \
         ORDER BY h.created DESC",
        vec![],
    )
    .await?;

    let list: Vec<ChatLogDto> = rows
        .iter()
        .map(|row| ChatLogDto {
            username: row.try_get("", "username").unwrap_or_default(),
            character_name: row.try_get("", "character_name").unwrap_or_default(),
            role: row.try_get("", "role").unwrap_or_default(),
            content: row.try_get("", "content").unwrap_or_default(),
            created: get_naive_datetime(row, "created").map(to_rfc3339),
        })
        .collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn character_list(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let rows = query_all(
        db.get_ref(),
        "SELECT c.id AS id, c.name AS name, c.persona AS persona, c.img AS img, \
         c.owner_id AS owner_id, u.username AS owner_name \
         FROM t_character c \
         JOIN t_user u ON c.owner_id = u.id \
         WHERE c.is_public = 1",
        vec![],
    )
    .await?;

    let list: Vec<PublicCharacterDto> = rows
        .iter()
        .map(|row| PublicCharacterDto {
            id: row.try_get("", "id").unwrap_or_default(),
            name: row.try_get("", "name").unwrap_or_default(),
            persona: row.try_get("", "persona").unwrap_or_default(),
            img: row.try_get("", "img").ok(),
            owner_id: row.try_get("", "owner_id").ok(),
            owner_name: row.try_get("", "owner_name").unwrap_or_default(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn character_remove(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<TranscriptCache>,
    auth: AuthUser,
    payload: web::Json<TargetIdRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    character::Entity::delete_by_id(payload.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    cache.evict_character(payload.id).await;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn comment_list(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    // LEFT JOIN: comments outlive their character on purpose
    let rows = query_all(
        db.get_ref(),
        "SELECT cm.id AS id, c.name AS character_name, cm.username AS username, \
         cm.content AS content, cm.created AS created \
         FROM t_comment cm \
         LEFT JOIN t_character c ON cm.character_id = c.id \
         ORDER BY cm.created DESC",
        vec![],
    )
    .await?;

    let list: Vec<AdminCommentDto> = rows
        .iter()
        .map(|row| AdminCommentDto {
            id: row.try_get("", "id").unwrap_or_default(),
            character_name: row
                .try_get::<Option<String>>("", "character_name")
                .ok()
                .flatten()
                .unwrap_or_else(|| DELETED_CHARACTER_LABEL.to_string()),
            username: row.try_get("", "username").unwrap_or_default(),
            content: row.try_get("", "content").unwrap_or_default(),
            created: get_naive_datetime(row, "created").map(to_rfc3339),
        })
        .collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn comment_remove(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<TargetIdRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    comment::Entity::delete_by_id(payload.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn find_non_admin_target(
    db: &DatabaseConnection,
    id: i32,
) -> Result<user::Model, AppError> {
    let target = user::Entity::find()
        .filter(user::Column::Id.eq(id))
        .one(db)
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("user not found"))?;
    if target.is_admin {
        return Err(AppError::fail("the admin identity cannot be targeted"));
    }
    Ok(target)
}

async fn query_all(
    db: &DatabaseConnection,
    sql: &str,
    values: Vec<sea_orm::Value>,
) -> Result<Vec<sea_orm::QueryResult>, AppError> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, sql, values);
    db.query_all(stmt)
        .await
        .map_err(|_| AppError::system_exception())
}

fn to_rfc3339(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn get_naive_datetime(row: &sea_orm::QueryResult, col: &str) -> Option<NaiveDateTime> {
    row.try_get::<NaiveDateTime>("", col)
        .ok()
        .or_else(|| {
            row.try_get::<DateTime<Utc>>("", col)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            row.try_get::<String>("", col)
                .ok()
                .and_then(parse_db_datetime)
        })
}

fn parse_db_datetime(input: String) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&input, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(&input)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}
