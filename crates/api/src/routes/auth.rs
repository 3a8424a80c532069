use axum::{Json, extract::State, http::{HeaderMap, HeaderValue, StatusCode, header}};
use resident_house_db::models::{Role, User};
use resident_house_services::{
    auth::{AuthError, TokenPair},
    dao::{base::DaoError, user::NewUser},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::user::{UserResponse, to_response};
use crate::{
    error::ApiError,
    extractors::auth::{ACCESS_COOKIE, AuthUser},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub apartment_number: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// The role the client is signing in as.
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

fn access_cookie(tokens: &TokenPair) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        ACCESS_COOKIE, tokens.access_token, tokens.expires_in
    );
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid cookie header: {}", e)))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

fn session_response(
    state: &AppState,
    user: User,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Stored user has no id".to_string()))?;
    let tokens = state.auth.generate_tokens(user_id, &user.email, user.role)?;
    let headers = access_cookie(&tokens)?;

    let response = AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: to_response(user),
    };
    Ok((headers, Json(response)))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let email = body.email.trim().to_lowercase();
    state.auth.validate_registration(&email, &body.password)?;
    if body.display_name.trim().is_empty() {
        return Err(ApiError::Validation("display_name is required".to_string()));
    }

    let password_hash = state.auth.hash_password(&body.password)?;

    let user = state
        .users
        .create(NewUser {
            email,
            display_name: body.display_name.trim().to_string(),
            role: body.role,
            password_hash,
            phone_number: body.phone_number,
            address: body.address,
            apartment_number: body.apartment_number,
        })
        .await
        .map_err(|e| match e {
            DaoError::DuplicateKey(_) => ApiError::from(AuthError::EmailAlreadyInUse),
            other => ApiError::from(other),
        })?;
    info!(user_id = ?user.id, role = %user.role, "User registered");

    let (headers, body) = session_response(&state, user)?;
    Ok((StatusCode::CREATED, headers, body))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let user = state
        .users
        .find_by_email(body.email.trim())
        .await
        .map_err(|e| match e {
            DaoError::NotFound => ApiError::from(AuthError::UserNotFound),
            other => ApiError::from(other),
        })?;

    let password_hash = user
        .password_hash
        .as_ref()
        .ok_or(AuthError::WrongPassword)?;

    if !state.auth.verify_password(&body.password, password_hash)? {
        return Err(AuthError::WrongPassword.into());
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("Stored user has no id".to_string()))?;

    // Credentials are good: the session starts, then is closed again if the
    // account belongs to the other role.
    state.users.update_presence(user_id, true).await?;
    if user.role != body.role {
        state.users.update_presence(user_id, false).await?;
        warn!(?user_id, stored = %user.role, requested = %body.role, "Login with wrong role");
        return Err(AuthError::RoleMismatch {
            requested: body.role,
        }
        .into());
    }

    let user = state.users.base.find_by_id(user_id).await?;
    info!(?user_id, "User logged in");
    session_response(&state, user)
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<HeaderMap, ApiError> {
    state.users.update_presence(auth.user_id, false).await?;

    let mut headers = HeaderMap::new();
    let cookie = format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", ACCESS_COOKIE);
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid cookie header: {}", e)))?;
    headers.insert(header::SET_COOKIE, value);
    info!(user_id = ?auth.user_id, "User logged out");
    Ok(headers)
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.base.find_by_id(auth.user_id).await?;
    Ok(Json(to_response(user)))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let claims = state.auth.verify_refresh_token(&body.refresh_token)?;
    let user = state.users.base.find_by_id(claims.user_id()?).await?;
    session_response(&state, user)
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<(StatusCode, Json<PasswordResetResponse>), ApiError> {
    let reset_token = match state.users.find_by_email(body.email.trim()).await {
        Ok(user) => {
            let user_id = user
                .id
                .ok_or_else(|| ApiError::Internal("Stored user has no id".to_string()))?;
            let token = state.auth.generate_reset_token(
                user_id,
                &user.email,
                user.role,
                user.password_hash.as_deref(),
            )?;
            debug!(?user_id, %token, "Password reset token issued");
            Some(token)
        }
        // Unknown addresses get the same answer.
        Err(DaoError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };

    let response = PasswordResetResponse {
        accepted: true,
        reset_token: reset_token.filter(|_| state.auth.expose_reset_token()),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetConfirm>,
) -> Result<StatusCode, ApiError> {
    let claims = state.auth.verify_reset_token(&body.token)?;
    state.auth.validate_password(&body.new_password)?;

    let user_id = claims.user_id()?;
    let user = match state.users.base.find_by_id(user_id).await {
        Ok(user) => user,
        Err(DaoError::NotFound) => return Err(AuthError::UserNotFound.into()),
        Err(e) => return Err(e.into()),
    };
    let current = user.password_hash.as_deref();
    state.auth.ensure_reset_unused(&claims, current)?;

    let password_hash = state.auth.hash_password(&body.new_password)?;
    if !state
        .users
        .replace_password_hash(user_id, current, password_hash)
        .await?
    {
        warn!(?user_id, "Password changed while the reset was in flight");
        return Err(AuthError::InvalidToken("Reset token was already used".to_string()).into());
    }
    info!(?user_id, "Password reset");
    Ok(StatusCode::NO_CONTENT)
}
