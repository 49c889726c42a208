use actix_web::{web, HttpResponse};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::entity::{character, chat_message};
use crate::error::AppError;
use crate::gemini::{ChatOutcome, GeminiClient};
use crate::response::ResponseDto;
use crate::transcript::{TranscriptCache, Turn, ROLE_ASSISTANT, ROLE_USER};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/history").route(web::post().to(history)))
        .service(web::resource("/send").route(web::post().to(send)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRequest {
    character_id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest {
    character_id: i32,
    content: Option<String>,
}

#[derive(Serialize)]
struct SendResponse {
    reply: String,
    blocked: bool,
}

async fn history(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<TranscriptCache>,
    auth: AuthUser,
    payload: web::Json<HistoryRequest>,
) -> Result<HttpResponse, AppError> {
    let character = owned_character(db.get_ref(), &auth, payload.character_id).await?;
    let turns = cache.load(db.get_ref(), auth.user_id, character.id).await?;
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(turns))))
}

async fn send(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<TranscriptCache>,
    gemini: web::Data<GeminiClient>,
    auth: AuthUser,
    payload: web::Json<SendRequest>,
) -> Result<HttpResponse, AppError> {
    let content = match &payload.content {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => return Err(AppError::param_error("content cannot be null")),
    };
    let character = owned_character(db.get_ref(), &auth, payload.character_id).await?;

    // seed the transcript before the first append for this pair
    cache.load(db.get_ref(), auth.user_id, character.id).await?;
    submit_user_turn(db.get_ref(), &cache, auth.user_id, character.id, &content).await?;

    // blocking call, no retry, no cancellation once issued
    let outcome = gemini.generate(&character.persona, &content).await?;
    let reply = apply_outcome(db.get_ref(), &cache, auth.user_id, character.id, &outcome).await?;

    let blocked = matches!(outcome, ChatOutcome::Blocked { .. });
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(SendResponse { reply, blocked }))))
}

/// Persists and caches the user half of an exchange.
pub async fn submit_user_turn(
    db: &DatabaseConnection,
    cache: &TranscriptCache,
    user_id: i32,
    character_id: i32,
    content: &str,
) -> Result<(), AppError> {
    record_turn(db, user_id, character_id, ROLE_USER, content, None).await?;
    cache
        .append(
            user_id,
            character_id,
            Turn { role: ROLE_USER.to_string(), content: content.to_string() },
        )
        .await;
    Ok(())
}

/// Persists and caches the assistant half of an exchange. A blocked outcome
/// still produces an assistant turn, so every exchange writes exactly two
/// rows.
pub async fn apply_outcome(
    db: &DatabaseConnection,
    cache: &TranscriptCache,
    user_id: i32,
    character_id: i32,
    outcome: &ChatOutcome,
) -> Result<String, AppError> {
    let text = outcome.assistant_text().to_string();
    record_turn(
        db,
        user_id,
        character_id,
        ROLE_ASSISTANT,
        &text,
        Some(outcome.raw_json()),
    )
    .await?;
    cache
        .append(
            user_id,
            character_id,
            Turn { role: ROLE_ASSISTANT.to_string(), content: text.clone() },
        )
        .await;
    Ok(text)
}

async fn record_turn(
    db: &DatabaseConnection,
    user_id: i32,
    character_id: i32,
    role: &str,
    content: &str,
    raw_json: Option<String>,
) -> Result<(), AppError> {
    let model = chat_message::ActiveModel {
        user_id: Set(user_id),
        character_id: Set(character_id),
        role: Set(role.to_string()),
        content: Set(content.to_string()),
        raw_json: Set(raw_json),
        created: Set(Some(Utc::now())),
        ..Default::default()
    };
    model
        .insert(db)
        .await
        .map_err(|_| AppError::system_exception())?;
    Ok(())
}

async fn owned_character(
    db: &DatabaseConnection,
    auth: &AuthUser,
    character_id: i32,
) -> Result<character::Model, AppError> {
    let found = character::Entity::find_by_id(character_id)
        .one(db)
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("character not found"))?;
    if found.owner_id != Some(auth.user_id) {
        return Err(AppError::fail("not your character"));
    }
    Ok(found)
}
