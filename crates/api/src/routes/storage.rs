use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::{error::ApiError, state::AppState};

/// Serves a stored object. Like the download urls handed out on upload, these
/// need no session.
pub async fn get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.storage.get(&key).await?;
    let content_type = sniff_content_type(&bytes);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}
