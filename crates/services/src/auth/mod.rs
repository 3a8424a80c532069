use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use argon2::password_hash::rand_core::OsRng;
use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use resident_house_config::{AuthSettings, JwtSettings};
use resident_house_db::models::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidateEmail;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("The email address is already registered")]
    EmailAlreadyInUse,
    #[error("The email address is not valid")]
    InvalidEmail,
    #[error("The password must be at least {min} characters long")]
    WeakPassword { min: usize },
    #[error("No account is registered with this email")]
    UserNotFound,
    #[error("Wrong password")]
    WrongPassword,
    #[error("The account is not registered as {requested}")]
    RoleMismatch { requested: Role },
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Password hash error: {0}")]
    HashError(String),
}

impl AuthError {
    /// Stable code clients match on. `None` for server-side failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AuthError::EmailAlreadyInUse => Some("email_already_in_use"),
            AuthError::InvalidEmail => Some("invalid_email"),
            AuthError::WeakPassword { .. } => Some("weak_password"),
            AuthError::UserNotFound => Some("user_not_found"),
            AuthError::WrongPassword => Some("wrong_password"),
            AuthError::RoleMismatch { .. } => Some("role_mismatch"),
            AuthError::TokenExpired => Some("token_expired"),
            AuthError::InvalidToken(_) => Some("invalid_token"),
            AuthError::HashError(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // user_id
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub token_type: TokenType,
    /// Reset tokens only: salt of the password hash the token was issued
    /// against. A new password means a new salt, so the token stops matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<ObjectId, AuthError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("Subject is not an ObjectId".to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

pub struct AuthService {
    jwt_settings: JwtSettings,
    auth_settings: AuthSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(jwt_settings: JwtSettings, auth_settings: AuthSettings) -> Self {
        let encoding_key = EncodingKey::from_secret(jwt_settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(jwt_settings.secret.as_bytes());
        Self {
            jwt_settings,
            auth_settings,
            encoding_key,
            decoding_key,
        }
    }

    pub fn expose_reset_token(&self) -> bool {
        self.auth_settings.expose_reset_token
    }

    pub fn validate_email(&self, email: &str) -> Result<(), AuthError> {
        if !email.validate_email() {
            return Err(AuthError::InvalidEmail);
        }
        Ok(())
    }

    pub fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        let min = self.auth_settings.min_password_len;
        if password.chars().count() < min {
            return Err(AuthError::WeakPassword { min });
        }
        Ok(())
    }

    pub fn validate_registration(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.validate_email(email)?;
        self.validate_password(password)
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    fn claims(
        &self,
        user_id: ObjectId,
        email: &str,
        role: Role,
        token_type: TokenType,
        ttl_secs: u64,
    ) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user_id.to_hex(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
            iss: self.jwt_settings.issuer.clone(),
            token_type,
            pwd: None,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn generate_tokens(
        &self,
        user_id: ObjectId,
        email: &str,
        role: Role,
    ) -> Result<TokenPair, AuthError> {
        let access_claims = self.claims(
            user_id,
            email,
            role,
            TokenType::Access,
            self.jwt_settings.access_token_ttl_secs,
        );
        let refresh_claims = self.claims(
            user_id,
            email,
            role,
            TokenType::Refresh,
            self.jwt_settings.refresh_token_ttl_secs,
        );

        Ok(TokenPair {
            access_token: self.sign(&access_claims)?,
            refresh_token: self.sign(&refresh_claims)?,
            expires_in: self.jwt_settings.access_token_ttl_secs,
        })
    }

    /// Short-lived token authorizing one password change. It is bound to
    /// `password_hash`, the hash stored when the token is issued.
    pub fn generate_reset_token(
        &self,
        user_id: ObjectId,
        email: &str,
        role: Role,
        password_hash: Option<&str>,
    ) -> Result<String, AuthError> {
        let mut claims = self.claims(
            user_id,
            email,
            role,
            TokenType::Reset,
            self.jwt_settings.reset_token_ttl_secs,
        );
        claims.pwd = Some(password_fingerprint(password_hash));
        self.sign(&claims)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.jwt_settings.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    fn verify_typed(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let claims = self.verify_token(token)?;
        if claims.token_type != expected {
            return Err(AuthError::InvalidToken(format!(
                "Not a {:?} token",
                expected
            )));
        }
        Ok(claims)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_typed(token, TokenType::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_typed(token, TokenType::Refresh)
    }

    pub fn verify_reset_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_typed(token, TokenType::Reset)
    }

    /// Fails once the password the reset token was issued against has changed.
    pub fn ensure_reset_unused(
        &self,
        claims: &Claims,
        current_hash: Option<&str>,
    ) -> Result<(), AuthError> {
        if claims.pwd.as_deref() != Some(password_fingerprint(current_hash).as_str()) {
            return Err(AuthError::InvalidToken(
                "Reset token was already used".to_string(),
            ));
        }
        Ok(())
    }
}

/// The salt of a PHC password hash; empty for accounts without a password.
fn password_fingerprint(hash: Option<&str>) -> String {
    hash.and_then(|h| PasswordHash::new(h).ok())
        .and_then(|parsed| parsed.salt.map(|salt| salt.as_str().to_string()))
        .unwrap_or_default()
}
