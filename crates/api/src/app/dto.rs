use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use addressbook_auth::{RoleDefinition, User};
use addressbook_core::Page;
use addressbook_directory::{Address, AddressDraft};

// -------------------------
// Envelope
// -------------------------

/// Uniform response body: every endpoint answers with this shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub description: String,
}

/// Success envelope carrying a value.
pub fn respond<T: Serialize>(status: StatusCode, message: &str, value: T) -> Response {
    (
        status,
        Json(Envelope {
            status_code: status.as_u16(),
            message: message.to_string(),
            value: Some(value),
            errors: Vec::new(),
        }),
    )
        .into_response()
}

/// Success envelope without a value.
pub fn respond_empty(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(Envelope::<()> {
            status_code: status.as_u16(),
            message: message.to_string(),
            value: None,
            errors: Vec::new(),
        }),
    )
        .into_response()
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterAddressesRequest {
    #[serde(default)]
    pub search_text: String,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFields {
    pub id: Option<String>,
    #[serde(default)]
    pub street_address: String,
    pub street_address2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
}

impl AddressFields {
    pub fn into_draft(self) -> AddressDraft {
        AddressDraft {
            street_address: self.street_address,
            street_address2: self.street_address2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
        }
    }
}

/// `{ "address": { ... } }`, used by both create and update.
#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub address: AddressFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub user_id: String,
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_id: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDto {
    pub id: String,
    pub street_address: String,
    pub street_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl From<Address> for AddressDto {
    fn from(a: Address) -> Self {
        Self {
            id: a.id.to_string(),
            street_address: a.street_address,
            street_address2: a.street_address2,
            city: a.city,
            state: a.state,
            postal_code: a.postal_code,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressListDto {
    pub address_list: Vec<AddressDto>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
}

impl From<Page<Address>> for AddressListDto {
    fn from(page: Page<Address>) -> Self {
        Self {
            page_number: page.request.number,
            page_size: page.request.size,
            total_count: page.total_count,
            address_list: page.items.into_iter().map(AddressDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SingleAddressDto {
    pub address: AddressDto,
}

/// User summary; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
}

impl From<&User> for UserDto {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.to_string(),
            user_name: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            roles: u.roles.iter().map(|r| r.as_str().to_string()).collect(),
        }
    }
}

/// Returned by login and refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairDto {
    pub user: UserDto,
    pub token: String,
    pub token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UsersDto {
    pub users: Vec<UserDto>,
}

#[derive(Debug, Serialize)]
pub struct RoleDto {
    pub id: String,
    pub name: String,
}

impl From<RoleDefinition> for RoleDto {
    fn from(r: RoleDefinition) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RolesDto {
    pub roles: Vec<RoleDto>,
}
