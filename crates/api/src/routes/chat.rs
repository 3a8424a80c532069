use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use resident_house_db::models::{ChatThread, Message, ThreadId};
use resident_house_services::{Topic, dao::chat::OutgoingMessage, storage::chat_image_key};
use serde::{Deserialize, Serialize};

use super::{format_time, parse_object_id, read_file_field};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct OpenThreadRequest {
    pub peer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub id: String,
    pub participants: Vec<String>,
    pub peer_id: String,
    pub last_message: String,
    pub last_message_time: String,
    /// Unread count of the requesting user.
    pub unread_count: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub image_url: Option<String>,
    pub sender_name: String,
    pub sender_photo: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
}

fn thread_response(thread: ChatThread, viewer: &str) -> ThreadResponse {
    let peer_id = thread
        .participants
        .iter()
        .find(|p| p.as_str() != viewer)
        .cloned()
        .unwrap_or_default();
    ThreadResponse {
        unread_count: thread.unread_for(viewer),
        id: thread.id,
        participants: thread.participants,
        peer_id,
        last_message: thread.last_message,
        last_message_time: format_time(thread.last_message_time),
        created_at: format_time(thread.created_at),
    }
}

pub fn message_response(m: Message) -> MessageResponse {
    MessageResponse {
        id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
        chat_id: m.chat_id,
        sender_id: m.sender_id,
        receiver_id: m.receiver_id,
        text: m.text,
        image_url: m.image_url,
        sender_name: m.sender_name,
        sender_photo: m.sender_photo,
        read: m.read,
        created_at: format_time(m.created_at),
    }
}

/// Parses a thread id from the path and checks the caller takes part in it.
fn participant_thread(raw: &str, auth: &AuthUser) -> Result<ThreadId, ApiError> {
    let thread_id = ThreadId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !thread_id.contains(&auth.id_hex()) {
        return Err(ApiError::Forbidden("Not a participant of this chat".to_string()));
    }
    Ok(thread_id)
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Json<Vec<ThreadResponse>> {
    let viewer = auth.id_hex();
    let threads = state.chats.list_threads_for_user(&viewer).await;
    Json(
        threads
            .into_iter()
            .map(|t| thread_response(t, &viewer))
            .collect(),
    )
}

pub async fn open(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<OpenThreadRequest>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let peer_id = parse_object_id(&body.peer_id, "peer_id")?;
    // The peer must be a registered user.
    state.users.base.find_by_id(peer_id).await?;

    let viewer = auth.id_hex();
    let thread = state
        .chats
        .get_or_create_thread(&viewer, &peer_id.to_hex())
        .await?;
    Ok(Json(thread_response(thread, &viewer)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let thread_id = participant_thread(&chat_id, &auth)?;
    let messages = state.chats.list_messages(&thread_id).await?;
    Ok(Json(messages.into_iter().map(message_response).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let thread_id = participant_thread(&chat_id, &auth)?;
    if body.text.trim().is_empty() && body.image_url.is_none() {
        return Err(ApiError::Validation("A message needs text or an image".to_string()));
    }

    let sender_id = auth.id_hex();
    let receiver_id = thread_id
        .peer_of(&sender_id)
        .ok_or_else(|| ApiError::Forbidden("Not a participant of this chat".to_string()))?
        .to_string();
    // Same rule as `open`: the other half of the id must be a registered user.
    let peer = parse_object_id(&receiver_id, "peer id")?;
    state.users.base.find_by_id(peer).await?;
    let sender = state.users.base.find_by_id(auth.user_id).await?;

    state.chats.get_or_create_thread(&sender_id, &receiver_id).await?;
    let message = state
        .chats
        .send_message(
            &thread_id,
            OutgoingMessage {
                sender_id,
                receiver_id,
                text: body.text,
                sender_name: sender.display_name,
                sender_photo: Some(sender.photo_url).filter(|p| !p.is_empty()),
                image_url: body.image_url,
            },
        )
        .await?;

    state.feed.notify(&Topic::Chat(thread_id.to_string()));
    Ok((StatusCode::CREATED, Json(message_response(message))))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let thread_id = participant_thread(&chat_id, &auth)?;
    state.chats.mark_read(&thread_id, &auth.id_hex()).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((chat_id, message_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let thread_id = participant_thread(&chat_id, &auth)?;
    let mid = parse_object_id(&message_id, "message_id")?;
    state.chats.mark_message_read(&thread_id, mid).await?;
    state.feed.notify(&Topic::Chat(thread_id.to_string()));
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a chat image via multipart form data (`file` field). The returned
/// url goes into the `image_url` of the next message.
pub async fn upload_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let thread_id = participant_thread(&chat_id, &auth)?;
    let file = read_file_field(multipart).await?;

    let key = chat_image_key(thread_id.as_str(), chrono::Utc::now().timestamp_millis());
    let stored = state.storage.put(&key, &file.bytes).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key: stored.key,
            url: stored.url,
        }),
    ))
}
