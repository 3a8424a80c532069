use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use resident_house_db::models::{Role, User};
use resident_house_services::{dao::user::ProfileUpdate, storage::profile_photo_key};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{format_time, parse_object_id, read_file_field};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub phone_number: String,
    pub address: String,
    pub apartment_number: String,
    pub photo_url: String,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
}

pub fn to_response(u: User) -> UserResponse {
    UserResponse {
        id: u.id.map(|id| id.to_hex()).unwrap_or_default(),
        email: u.email,
        display_name: u.display_name,
        role: u.role,
        phone_number: u.phone_number,
        address: u.address,
        apartment_number: u.apartment_number,
        photo_url: u.photo_url,
        is_online: u.is_online,
        last_seen: u.last_seen.map(format_time),
        created_at: format_time(u.created_at),
    }
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let role = params
        .role
        .as_deref()
        .map(str::parse::<Role>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let users = state.users.list(role).await?;
    Ok(Json(users.into_iter().map(to_response).collect()))
}

pub async fn contacts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Json<Vec<UserResponse>> {
    let users = state.users.contacts(auth.user_id).await;
    Json(users.into_iter().map(to_response).collect())
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let uid = parse_object_id(&user_id, "user_id")?;
    let user = state.users.base.find_by_id(uid).await?;
    Ok(Json(to_response(user)))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.update_profile(auth.user_id, &body).await?;
    Ok(Json(to_response(user)))
}

/// Upload a profile photo via multipart form data (`file` field).
pub async fn upload_photo(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let file = read_file_field(multipart).await?;
    let stored = state
        .storage
        .put(&profile_photo_key(&auth.id_hex()), &file.bytes)
        .await?;
    info!(user_id = ?auth.user_id, size = stored.size, "Profile photo stored");

    let update = ProfileUpdate {
        photo_url: Some(stored.url),
        ..Default::default()
    };
    let user = state.users.update_profile(auth.user_id, &update).await?;
    Ok(Json(to_response(user)))
}
