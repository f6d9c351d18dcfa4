use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use addressbook_auth::Registration;
use addressbook_core::UserId;

use crate::app::dto::{self, TokenPairDto, UserDto};
use crate::app::errors::ApiError;
use crate::app::services::{AppServices, SessionTokens};

pub fn public_router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
}

pub fn protected_router() -> Router {
    Router::new()
        .route("/logout", post(logout))
        .route("/:user_id", get(get_user))
}

fn token_pair(session: SessionTokens) -> TokenPairDto {
    TokenPairDto {
        user: UserDto::from(&session.user),
        token: session.access.token,
        token_expires_at: session.access.expires_at,
        refresh_token: session.refresh.token,
        refresh_token_expires_at: session.refresh.expires_at,
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let session = services
        .auth
        .login(&body.user_name, &body.password, Utc::now())
        .await?;
    Ok(dto::respond(StatusCode::OK, "Login successful", token_pair(session)))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let user = services
        .auth
        .register(Registration {
            username: body.user_name,
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
        })
        .await?;
    Ok(dto::respond(
        StatusCode::CREATED,
        "User registered successfully",
        UserDto::from(&user),
    ))
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RefreshRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let user_id: UserId = body.user_id.parse()?;
    let session = services
        .auth
        .refresh(user_id, &body.refresh_token, Utc::now())
        .await?;
    Ok(dto::respond(
        StatusCode::OK,
        "Token refreshed successfully",
        token_pair(session),
    ))
}

/// Body is the access token as a JSON string.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<String>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(token) = body?;
    services.auth.logout(&token, Utc::now()).await?;
    Ok(dto::respond_empty(StatusCode::OK, "Logout successful"))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let user_id: UserId = user_id.parse()?;
    let user = services.auth.get_user(user_id).await?;
    Ok(dto::respond(
        StatusCode::OK,
        "User retrieved successfully",
        UserDto::from(&user),
    ))
}
