//! Admin routes for identity management.
//!
//! Listing is open to any authenticated caller; creating roles and assigning
//! them requires the `admin` role.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use addressbook_core::{RoleId, UserId};

use crate::app::dto::{self, RoleDto, RolesDto, UserDto, UsersDto};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/Users", get(list_users))
        .route("/Users/:user_id/roles", post(assign_role))
        .route("/Roles", get(list_roles).post(create_role))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let users = services.admin.list_users().await?;
    Ok(dto::respond(
        StatusCode::OK,
        "Users retrieved successfully",
        UsersDto {
            users: users.iter().map(UserDto::from).collect(),
        },
    ))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let roles = services.admin.list_roles().await?;
    Ok(dto::respond(
        StatusCode::OK,
        "Roles retrieved successfully",
        RolesDto {
            roles: roles.into_iter().map(RoleDto::from).collect(),
        },
    ))
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateRoleRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let role = services
        .admin
        .create_role(principal.principal(), &body.name)
        .await?;
    Ok(dto::respond(
        StatusCode::CREATED,
        "Role created successfully",
        RoleDto::from(role),
    ))
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
    body: Result<Json<dto::AssignRoleRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let user_id: UserId = user_id.parse()?;
    let role_id: RoleId = body.role_id.parse()?;

    services
        .auth
        .assign_role(principal.principal(), user_id, role_id)
        .await?;
    Ok(dto::respond_empty(
        StatusCode::OK,
        "Role assigned to user successfully",
    ))
}
