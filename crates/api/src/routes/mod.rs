pub mod auth;
pub mod bulletin;
pub mod chat;
pub mod package;
pub mod storage;
pub mod user;
pub mod visitor;

use axum::extract::Multipart;
use bson::oid::ObjectId;

use crate::error::ApiError;

pub(crate) fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {}", what)))
}

pub(crate) fn format_time(time: bson::DateTime) -> String {
    time.try_to_rfc3339_string().unwrap_or_default()
}

/// An uploaded file taken from the `file` field of a multipart form.
pub(crate) struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Reads the `file` field of a multipart form; other fields are skipped.
pub(crate) async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Multipart error: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
        if bytes.is_empty() {
            return Err(ApiError::Validation("Uploaded file is empty".to_string()));
        }
        if !content_type.starts_with("image/") {
            return Err(ApiError::Validation(format!(
                "Only images can be uploaded, got {}",
                content_type
            )));
        }
        return Ok(UploadedFile {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::BadRequest("Missing 'file' field".to_string()))
}
