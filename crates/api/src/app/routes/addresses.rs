use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};

use addressbook_core::{AddressId, PageRequest};
use addressbook_directory::AddressSearch;

use crate::app::dto::{self, AddressDto, AddressListDto, SingleAddressDto};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_addresses).post(create_address).put(update_address))
        .route("/filter", post(filter_addresses))
        .route("/:id", get(get_address).delete(delete_address))
}

pub async fn list_addresses(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::new(query.page_number, query.page_size)?;

    let page = services.addresses.list(page).await?;
    Ok(dto::respond(
        StatusCode::OK,
        "Addresses retrieved successfully",
        AddressListDto::from(page),
    ))
}

pub async fn filter_addresses(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::FilterAddressesRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let page = PageRequest::new(body.page_number, body.page_size)?;

    let page = services
        .addresses
        .filter(AddressSearch::new(&body.search_text, page))
        .await?;
    Ok(dto::respond(
        StatusCode::OK,
        "Addresses retrieved successfully",
        AddressListDto::from(page),
    ))
}

pub async fn get_address(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: AddressId = id.parse()?;
    let address = services.addresses.get(id).await?;
    Ok(dto::respond(
        StatusCode::OK,
        "Address retrieved successfully",
        SingleAddressDto {
            address: address.into(),
        },
    ))
}

pub async fn create_address(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::AddressRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let address = services.addresses.create(body.address.into_draft()).await?;

    let location = HeaderValue::from_str(&format!("/api/addresses/{}", address.id))
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let mut response = dto::respond(
        StatusCode::CREATED,
        "Address created successfully",
        AddressDto::from(address),
    );
    response.headers_mut().insert(LOCATION, location);
    Ok(response)
}

pub async fn update_address(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::AddressRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let id: AddressId = body
        .address
        .id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::validation("address.id is required"))?
        .parse()?;

    let address = services.addresses.update(id, body.address.into_draft()).await?;
    Ok(dto::respond(
        StatusCode::OK,
        "Address updated successfully",
        AddressDto::from(address),
    ))
}

pub async fn delete_address(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: AddressId = id.parse()?;
    services.addresses.delete(id).await?;
    Ok(dto::respond_empty(StatusCode::OK, "Address deleted successfully"))
}
