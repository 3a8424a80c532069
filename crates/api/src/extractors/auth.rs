use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use bson::oid::ObjectId;
use resident_house_db::models::Role;
use resident_house_services::auth::Claims;

use crate::{error::ApiError, state::AppState};

pub const ACCESS_COOKIE: &str = "access_token";

/// Extracts the authenticated user from JWT (cookie or Authorization header)
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub email: String,
    pub role: Role,
    pub claims: Claims,
}

impl AuthUser {
    /// The id as stored in chat participant lists.
    pub fn id_hex(&self) -> String {
        self.user_id.to_hex()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        // Try Authorization header first
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|s| s.to_string())
            // Then try cookie
            .or_else(|| {
                parts
                    .headers
                    .get(header::COOKIE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|cookies| {
                        cookies.split(';').find_map(|cookie| {
                            cookie
                                .trim()
                                .strip_prefix(ACCESS_COOKIE)
                                .and_then(|rest| rest.strip_prefix('='))
                                .filter(|value| !value.is_empty())
                                .map(|s| s.to_string())
                        })
                    })
            })
            .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

        let claims = app_state.auth.verify_access_token(&token)?;
        let user_id = claims.user_id()?;

        Ok(AuthUser {
            user_id,
            email: claims.email.clone(),
            role: claims.role,
            claims,
        })
    }
}

/// An authenticated user holding the concierge role. Guards the log endpoints.
#[derive(Debug, Clone)]
pub struct ConciergeUser(pub AuthUser);

impl<S> FromRequestParts<S> for ConciergeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Concierge {
            return Err(ApiError::Forbidden(
                "Only concierge accounts can use the building logs".to_string(),
            ));
        }
        Ok(ConciergeUser(user))
    }
}
