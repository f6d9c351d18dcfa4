use axum::{
    http::{header::ALLOW, StatusCode},
    response::Response,
};

use crate::app::{dto, errors};

pub async fn health() -> Response {
    dto::respond_empty(StatusCode::OK, "Healthy")
}

/// Envelope-shaped 404 for unmatched paths.
pub async fn not_found() -> Response {
    errors::json_error(StatusCode::NOT_FOUND, "NotFound", "No such endpoint")
}

/// Wrap the router's bare 405 in the envelope, keeping its `Allow` header.
pub async fn envelope_method_not_allowed(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let mut enveloped = errors::json_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "MethodNotAllowed",
        "Method not allowed for this endpoint",
    );
    if let Some(allow) = response.headers().get(ALLOW) {
        enveloped.headers_mut().insert(ALLOW, allow.clone());
    }
    enveloped
}
