use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use resident_house_db::models::{BulletinPost, Category, Role};
use resident_house_services::{
    Topic,
    dao::bulletin::{BulletinUpdate, NewBulletinPost},
    storage::bulletin_image_key,
};
use serde::{Deserialize, Serialize};

use super::{chat::UploadResponse, format_time, parse_object_id, read_file_field};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub author_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulletinResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub author_photo: String,
    pub author_role: Role,
    pub category: Category,
    pub created_at: String,
    pub updated_at: String,
}

pub fn to_response(p: BulletinPost) -> BulletinResponse {
    BulletinResponse {
        id: p.id.map(|id| id.to_hex()).unwrap_or_default(),
        title: p.title,
        description: p.description,
        image_url: p.image_url,
        author_id: p.author_id.to_hex(),
        author_name: p.author_name,
        author_photo: p.author_photo,
        author_role: p.author_role,
        category: p.category,
        created_at: format_time(p.created_at),
        updated_at: format_time(p.updated_at),
    }
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<ListPostsQuery>,
) -> Result<Json<Vec<BulletinResponse>>, ApiError> {
    let posts = match &params.author_id {
        Some(author_id) => {
            let aid = parse_object_id(author_id, "author_id")?;
            state.bulletin.list_by_author(aid).await?
        }
        None => state.bulletin.list_all().await?,
    };
    Ok(Json(posts.into_iter().map(to_response).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewBulletinPost>,
) -> Result<(StatusCode, Json<BulletinResponse>), ApiError> {
    let author = state.users.base.find_by_id(auth.user_id).await?;
    let post = state
        .bulletin
        .create(&author, body, state.storage.as_ref())
        .await?;

    state.feed.notify(&Topic::Bulletin);
    Ok((StatusCode::CREATED, Json(to_response(post))))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(post_id): Path<String>,
    Json(body): Json<BulletinUpdate>,
) -> Result<Json<BulletinResponse>, ApiError> {
    let id = parse_object_id(&post_id, "post_id")?;
    let post = state.bulletin.update(id, &body).await?;

    state.feed.notify(&Topic::Bulletin);
    Ok(Json(to_response(post)))
}

/// Any signed-in user may remove a post.
pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_object_id(&post_id, "post_id")?;
    state.bulletin.delete(id, state.storage.as_ref()).await?;

    state.feed.notify(&Topic::Bulletin);
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a post image via multipart form data (`file` field). The returned
/// key goes into the `image_key` of the post.
pub async fn upload_image(
    State(state): State<AppState>,
    _auth: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let file = read_file_field(multipart).await?;
    let key = bulletin_image_key(chrono::Utc::now().timestamp_millis(), &file.filename);
    let stored = state.storage.put(&key, &file.bytes).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key: stored.key,
            url: stored.url,
        }),
    ))
}
