use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use resident_house_services::auth::AuthError;
use resident_house_services::dao::base::DaoError;
use resident_house_services::storage::StorageError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
    Validation(String),
    /// Credential and token failures; these carry a client error code.
    Auth(AuthError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, code) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Internal(msg) => {
                error!(%msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg, None)
            }
            ApiError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg, None)
            }
            ApiError::Auth(err) => {
                let (status, error_type) = match &err {
                    AuthError::EmailAlreadyInUse => (StatusCode::CONFLICT, "conflict"),
                    AuthError::InvalidEmail | AuthError::WeakPassword { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "validation")
                    }
                    AuthError::RoleMismatch { .. } => (StatusCode::FORBIDDEN, "forbidden"),
                    AuthError::UserNotFound
                    | AuthError::WrongPassword
                    | AuthError::TokenExpired
                    | AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
                    AuthError::HashError(msg) => {
                        error!(%msg, "Password hashing failed");
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                    }
                };
                (status, error_type, err.to_string(), err.code())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            DaoError::DuplicateKey(msg) => ApiError::Conflict(msg),
            DaoError::Conflict(msg) => ApiError::Conflict(msg),
            DaoError::Forbidden(msg) => ApiError::Forbidden(msg),
            DaoError::Validation(msg) => ApiError::Validation(msg),
            DaoError::InvalidReference(msg) => ApiError::BadRequest(msg),
            DaoError::Mongo(e) => ApiError::Internal(e.to_string()),
            DaoError::BsonSer(e) => ApiError::Internal(e.to_string()),
            DaoError::BsonDe(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => ApiError::BadRequest(format!("Invalid key: {}", key)),
            StorageError::NotFound(key) => ApiError::NotFound(format!("No object at {}", key)),
            StorageError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}
