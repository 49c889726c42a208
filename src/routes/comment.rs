use actix_web::{web, HttpResponse};
use chrono::{SecondsFormat, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::entity::{character, comment};
use crate::error::AppError;
use crate::response::ResponseDto;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/add").route(web::post().to(add)))
        .service(web::resource("/list").route(web::post().to(list)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCommentRequest {
    character_id: i32,
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCommentRequest {
    character_id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentDto {
    id: i32,
    character_id: i32,
    username: String,
    content: String,
    created: Option<String>,
}

#[derive(Serialize)]
struct EmptyResponse {}

async fn add(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<AddCommentRequest>,
) -> Result<HttpResponse, AppError> {
    let content = match &payload.content {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => return Err(AppError::param_error("content cannot be null")),
    };

    let target = character::Entity::find_by_id(payload.character_id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("character not found"))?;
    if !target.is_public {
        return Err(AppError::fail("character is not public"));
    }

    // attribution is the commenter's username, taken from the session context
    let model = comment::ActiveModel {
        character_id: Set(target.id),
        username: Set(auth.username),
        content: Set(content),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };
    model
        .insert(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn list(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
    payload: web::Json<ListCommentRequest>,
) -> Result<HttpResponse, AppError> {
    let rows = comment::Entity::find()
        .filter(comment::Column::CharacterId.eq(payload.character_id))
        .order_by_desc(comment::Column::Created)
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    let list: Vec<CommentDto> = rows
        .into_iter()
        .map(|m| CommentDto {
            id: m.id,
            character_id: m.character_id,
            username: m.username,
            content: m.content,
            created: m
                .created
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, false)),
        })
        .collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}
