use actix_web::{web, HttpResponse};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::entity::character;
use crate::error::AppError;
use crate::response::ResponseDto;
use crate::transcript::TranscriptCache;

const DEFAULT_CHARACTER_IMG: &str = "https://cdn-icons-png.flaticon.com/512/4140/4140048.png";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/create").route(web::post().to(create)))
        .service(web::resource("/list").route(web::post().to(list)))
        .service(web::resource("/remove").route(web::post().to(remove)))
        .service(web::resource("/market").route(web::post().to(market)))
        .service(web::resource("/adopt").route(web::post().to(adopt)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCharacterRequest {
    name: Option<String>,
    persona: Option<String>,
    img: Option<String>,
    is_public: Option<bool>,
}

#[derive(Deserialize)]
struct CharacterIdRequest {
    id: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CharacterDto {
    id: i32,
    owner_id: Option<i32>,
    name: String,
    persona: String,
    img: Option<String>,
    is_public: bool,
}

#[derive(Serialize)]
struct EmptyResponse {}

async fn create(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CreateCharacterRequest>,
) -> Result<HttpResponse, AppError> {
    let name = match &payload.name {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => return Err(AppError::param_error("name cannot be null")),
    };
    let persona = match &payload.persona {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => return Err(AppError::param_error("persona cannot be null")),
    };
    let img = payload
        .img
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CHARACTER_IMG.to_string());

    let model = character::ActiveModel {
        owner_id: Set(Some(auth.user_id)),
        name: Set(name),
        persona: Set(persona),
        img: Set(Some(img)),
        is_public: Set(payload.is_public.unwrap_or(false)),
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
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let rows = character::Entity::find()
        .filter(character::Column::OwnerId.eq(auth.user_id))
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let list: Vec<CharacterDto> = rows.into_iter().map(to_dto).collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

async fn remove(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<TranscriptCache>,
    auth: AuthUser,
    payload: web::Json<CharacterIdRequest>,
) -> Result<HttpResponse, AppError> {
    let found = character::Entity::find_by_id(payload.id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("character not found"))?;

    if found.owner_id != Some(auth.user_id) && !auth.is_admin {
        return Err(AppError::fail("not your character"));
    }

    character::Entity::delete_by_id(found.id)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    // comments referencing it stay and degrade to the deletion sentinel
    cache.evict_character(found.id).await;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn market(
    db: web::Data<DatabaseConnection>,
    _auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let rows = character::Entity::find()
        .filter(character::Column::IsPublic.eq(true))
        .all(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    let list: Vec<CharacterDto> = rows.into_iter().map(to_dto).collect();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(list))))
}

/// Adoption clones a public character into a fresh private row owned by the
/// caller. The source row is never touched.
async fn adopt(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<CharacterIdRequest>,
) -> Result<HttpResponse, AppError> {
    let source = character::Entity::find_by_id(payload.id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("character not found"))?;
    if !source.is_public {
        return Err(AppError::fail("character is not public"));
    }

    let clone = character::ActiveModel {
        owner_id: Set(Some(auth.user_id)),
        name: Set(source.name),
        persona: Set(source.persona),
        img: Set(source.img),
        is_public: Set(false),
        ..Default::default()
    };
    clone
        .insert(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

fn to_dto(model: character::Model) -> CharacterDto {
    CharacterDto {
        id: model.id,
        owner_id: model.owner_id,
        name: model.name,
        persona: model.persona,
        img: model.img,
        is_public: model.is_public,
    }
}
