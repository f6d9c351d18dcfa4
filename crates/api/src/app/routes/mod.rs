use axum::{routing::get, Router};

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod system;

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/api/auth", auth::public_router())
}

/// Endpoints behind the auth middleware.
pub fn protected_router() -> Router {
    Router::new()
        .nest("/api/addresses", addresses::router())
        .nest("/api/auth", auth::protected_router())
        .nest("/api/admin", admin::router())
}
