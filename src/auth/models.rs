// Authentication data models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::validation::{validate_password_strength, validate_verification_code};

/// Role assigned to newly registered users
pub const DEFAULT_ROLE: &str = "user";

/// Kind of signed credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User database model
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub verified_email: bool,
    /// Cleared once the email has been verified
    pub verification_code: Option<String>,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub role: String,
    pub verification_code: Option<String>,
}

/// Issued token database model
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Token {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a token
#[derive(Debug, Clone)]
pub struct NewToken {
    pub user_id: Uuid,
    pub token: String,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
}

/// User response model (excludes password hash and verification code)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    #[schema(example = "example@gmail.com")]
    pub email: String,
    pub verified_email: bool,
    #[schema(example = "linuxflight")]
    pub username: String,
    #[schema(example = "user")]
    pub role: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            verified_email: user.verified_email,
            username: user.username,
            role: user.role,
        }
    }
}

/// A signed token and its expiry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    #[schema(example = "somelong.token.string")]
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            token: token.token,
            expires: token.expires_at,
        }
    }
}

/// Access and refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthTokens {
    pub access: TokenResponse,
    pub refresh: TokenResponse,
}

/// Registration request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Email must be a valid address"))]
    #[schema(example = "example@gmail.com")]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    #[schema(example = "Password1234")]
    pub password: String,
    #[validate(length(min = 3, max = 20, message = "Username must be 3 to 20 characters"))]
    #[schema(example = "linuxflight")]
    pub username: String,
}

/// Login request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Email must be a valid address"))]
    #[schema(example = "example@gmail.com")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "Password1234")]
    pub password: String,
}

/// Token refresh request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Email verification request DTO
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VerifyRequest {
    #[validate(custom = "validate_verification_code")]
    #[schema(example = "A1B2C3")]
    pub code: String,
}

/// Registration and login response DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: AuthTokens,
}

/// Plain status response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = 200)]
    pub code: u16,
    #[schema(example = "email verified")]
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            code: 200,
            message: message.to_string(),
        }
    }
}

/// Pagination query for user listings
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[validate(range(min = 0, message = "Offset must not be negative"))]
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Partial user update used by administrators
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 20, message = "Username must be 3 to 20 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Role must be 1 to 32 characters"))]
    pub role: Option<String>,
    pub verified_email: Option<bool>,
}

/// Optional token type filter for revocation
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RevokeQuery {
    #[serde(rename = "type")]
    pub token_type: Option<TokenType>,
}
