use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use serde_json::json;
use sqlx::SqlitePool;

use crate::config::Settings;
use crate::dto::user_dto::UserDTO;
use crate::errors::ApiError;
use crate::models::credentials::Credentials;
use crate::models::session::Session;
use crate::models::user::User;
use crate::utils::auth::{removal_cookie, session_cookie, CurrentUser};

const USERNAME_TAKEN: &str = "Username already exists";

pub async fn register(
    db_pool: web::Data<SqlitePool>,
    settings: web::Data<Settings>,
    credentials: web::Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    let credentials = credentials.into_inner();
    credentials.validate_new().map_err(ApiError::BadRequest)?;

    if User::find_by_username(&db_pool, &credentials.username)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(String::from(USERNAME_TAKEN)));
    }

    let cost = settings.bcrypt_cost;
    let password = credentials.password;
    let hashed_password = web::block(move || hash(password, cost)).await??;

    // The pre-check above can race with a concurrent registration.
    let user = match User::create(&db_pool, &credentials.username, &hashed_password).await {
        Ok(user) => user,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::BadRequest(String::from(USERNAME_TAKEN)))
        }
        Err(e) => return Err(e.into()),
    };

    let session = Session::create(&db_pool, user.id, settings.session_ttl).await?;
    log::info!("registered user {} (id {})", user.username, user.id);

    Ok(HttpResponse::Created()
        .cookie(session_cookie(&session.id, &settings))
        .json(UserDTO::from(user)))
}

pub async fn login(
    db_pool: web::Data<SqlitePool>,
    settings: web::Data<Settings>,
    credentials: web::Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    let credentials = credentials.into_inner();
    let user = User::find_by_username(&db_pool, &credentials.username)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let hashed_password = user.hashed_password.clone();
    let password = credentials.password;
    let is_password_correct = web::block(move || verify(password, &hashed_password)).await??;
    if !is_password_correct {
        log::warn!("failed login for {}", user.username);
        return Err(ApiError::InvalidCredentials);
    }

    let purged = Session::purge_expired(&db_pool).await?;
    if purged > 0 {
        log::debug!("purged {} expired sessions", purged);
    }
    let session = Session::create(&db_pool, user.id, settings.session_ttl).await?;
    log::info!("user {} logged in", user.username);

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&session.id, &settings))
        .json(UserDTO::from(user)))
}

pub async fn logout(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    Session::delete(&db_pool, &user.session_id).await?;
    log::info!("user {} logged out", user.id);

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie())
        .json(json!({ "success": true })))
}

pub async fn get_user(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let user = User::find_by_id(&db_pool, user.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(HttpResponse::Ok().json(UserDTO::from(user)))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/register").route(web::post().to(register)));
    cfg.service(web::resource("/login").route(web::post().to(login)));
    cfg.service(web::resource("/logout").route(web::post().to(logout)));
    cfg.service(web::resource("/user").route(web::get().to(get_user)));
}
