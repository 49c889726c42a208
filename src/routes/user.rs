use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, Claims};
use crate::config::AppConfig;
use crate::db::ADMIN_USERNAME;
use crate::entity::user;
use crate::error::AppError;
use crate::response::ResponseDto;
use crate::transcript::TranscriptCache;

const DEFAULT_PROFILE_IMG: &str = "https://cdn-icons-png.flaticon.com/512/3135/3135715.png";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/register").route(web::post().to(register)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(web::resource("/logout").route(web::post().to(logout)))
        .service(web::resource("/current").route(web::post().to(current)))
        .service(web::resource("/updateImg").route(web::post().to(update_img)))
        .service(web::resource("/recovery/question").route(web::post().to(recovery_question)))
        .service(web::resource("/recovery/reset").route(web::post().to(recovery_reset)));
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    username: Option<String>,
    password: Option<String>,
    hint_question: Option<String>,
    hint_answer: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    user_id: i32,
    username: String,
    is_admin: bool,
    img: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: i32,
    username: String,
    img: Option<String>,
    is_admin: bool,
}

#[derive(Deserialize)]
struct UpdateImgRequest {
    img: Option<String>,
}

#[derive(Deserialize)]
struct RecoveryLookupRequest {
    username: Option<String>,
}

#[derive(Serialize)]
struct RecoveryQuestionResponse {
    question: String,
}

#[derive(Deserialize)]
struct RecoveryResetRequest {
    username: Option<String>,
    answer: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct EmptyResponse {}

async fn register(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let username = required(&payload.username, "username")?;
    let password = required(&payload.password, "password")?;
    let hint_question = required(&payload.hint_question, "hintQuestion")?;
    let hint_answer = required(&payload.hint_answer, "hintAnswer")?;

    // explicit pre-check; the UNIQUE constraint below is only the fallback
    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(username.clone()))
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;
    if existing.is_some() {
        return Err(AppError::fail("username already taken"));
    }

    let model = user::ActiveModel {
        username: Set(username),
        password: Set(password),
        img: Set(Some(DEFAULT_PROFILE_IMG.to_string())),
        is_admin: Set(false),
        hint_question: Set(Some(hint_question)),
        hint_answer: Set(Some(hint_answer)),
        ..Default::default()
    };

    if let Err(err) = model.insert(db.get_ref()).await {
        let msg = err.to_string();
        if msg.contains("Duplicate") || msg.contains("UNIQUE") {
            return Err(AppError::fail("username already taken"));
        }
        return Err(AppError::system_exception());
    }

    // registration does not log the user in
    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let username = required(&payload.username, "username")?;
    let password = required(&payload.password, "password")?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(username.clone()))
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    // feedback names whether the username or the password was wrong
    let user = match user {
        Some(user) => user,
        None => return Err(AppError::fail("no such user")),
    };
    if user.password != password {
        return Err(AppError::fail("wrong password"));
    }

    let exp = (Utc::now() + Duration::days(365 * 100)).timestamp() as usize;
    let claims = Claims { login_id: user.id, exp };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::system_exception())?;

    let response = LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        is_admin: user.is_admin,
        img: user.img,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(response))))
}

async fn logout(
    cache: web::Data<TranscriptCache>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    // end of the session context: drop the cached transcripts with it
    cache.evict_user(auth.user_id).await;
    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn current(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
) -> Result<HttpResponse, AppError> {
    let user = user::Entity::find_by_id(auth.user_id)
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(AppError::need_login)?;

    let dto = UserDto {
        id: user.id,
        username: user.username,
        img: user.img,
        is_admin: user.is_admin,
    };
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(dto))))
}

async fn update_img(
    db: web::Data<DatabaseConnection>,
    auth: AuthUser,
    payload: web::Json<UpdateImgRequest>,
) -> Result<HttpResponse, AppError> {
    let img = required(&payload.img, "img")?;

    let active = user::ActiveModel {
        id: Set(auth.user_id),
        img: Set(Some(img)),
        ..Default::default()
    };
    user::Entity::update(active)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

async fn recovery_question(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<RecoveryLookupRequest>,
) -> Result<HttpResponse, AppError> {
    let username = required(&payload.username, "username")?;
    reject_admin_recovery(&username)?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("no such user"))?;

    let question = user.hint_question.unwrap_or_default();
    Ok(HttpResponse::Ok().json(ResponseDto::success(Some(RecoveryQuestionResponse {
        question,
    }))))
}

async fn recovery_reset(
    db: web::Data<DatabaseConnection>,
    payload: web::Json<RecoveryResetRequest>,
) -> Result<HttpResponse, AppError> {
    let username = required(&payload.username, "username")?;
    let answer = required(&payload.answer, "answer")?;
    let password = required(&payload.password, "password")?;
    reject_admin_recovery(&username)?;

    // both username and answer must match the same row before anything mutates
    let user = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .filter(user::Column::HintAnswer.eq(answer))
        .one(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?
        .ok_or_else(|| AppError::fail("wrong recovery answer"))?;

    let active = user::ActiveModel {
        id: Set(user.id),
        password: Set(password),
        ..Default::default()
    };
    user::Entity::update(active)
        .exec(db.get_ref())
        .await
        .map_err(|_| AppError::system_exception())?;

    Ok(HttpResponse::Ok().json(ResponseDto::<EmptyResponse>::success(None)))
}

fn reject_admin_recovery(username: &str) -> Result<(), AppError> {
    if username.eq_ignore_ascii_case(ADMIN_USERNAME) {
        return Err(AppError::fail("the admin identity has no recovery path"));
    }
    Ok(())
}

fn required(value: &Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(AppError::param_error(format!("{} cannot be null", field))),
    }
}
