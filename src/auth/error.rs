// Authentication and authorization error types

use crate::auth::models::TokenType;
use crate::auth::repository::StoreError;
use crate::email::EmailError;
use crate::error::ApiError;

/// Failures while issuing or verifying a signed token
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("auth header is empty")]
    EmptyHeader,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("invalid token type, expected {expected}")]
    TypeMismatch { expected: TokenType },

    #[error("token has no subject")]
    MissingSubject,

    #[error("token subject is not a valid user id")]
    InvalidSubject,

    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Domain errors raised by the user, token and auth services
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid password")]
    InvalidCredentials,

    #[error("email already verified")]
    AlreadyVerified,

    #[error("invalid verification code")]
    InvalidCode,

    #[error("invalid email")]
    InvalidEmail,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("role '{role}' lacks the required rights")]
    InsufficientRights { role: String },

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("email provider error: {0}")]
    Email(#[from] EmailError),

    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailAlreadyExists => ApiError::Conflict {
                message: "email already exists".to_string(),
            },
            AuthError::UserNotFound => ApiError::NotFound {
                resource: "User".to_string(),
                id: "requested".to_string(),
            },
            AuthError::InvalidCredentials => ApiError::Forbidden("invalid password".to_string()),
            AuthError::AlreadyVerified => ApiError::BadRequest("already verified".to_string()),
            AuthError::InvalidCode => ApiError::Forbidden("invalid code".to_string()),
            AuthError::InvalidEmail => ApiError::BadRequest("invalid email".to_string()),
            AuthError::TokenRevoked => ApiError::Unauthorized("token has been revoked".to_string()),
            AuthError::InsufficientRights { .. } => ApiError::Forbidden("forbidden".to_string()),
            AuthError::Token(TokenError::MissingSecret) | AuthError::Token(TokenError::Encoding(_)) => {
                ApiError::InternalError(err.to_string())
            }
            AuthError::Token(token_err) => ApiError::Unauthorized(token_err.to_string()),
            AuthError::Store(StoreError::NotFound) => ApiError::NotFound {
                resource: "Record".to_string(),
                id: "requested".to_string(),
            },
            AuthError::Store(StoreError::Conflict) => ApiError::Conflict {
                message: "record already exists".to_string(),
            },
            AuthError::Store(StoreError::Database(e)) => ApiError::DatabaseError(e.to_string()),
            AuthError::Email(e) => ApiError::DependencyError(e.to_string()),
            AuthError::PasswordHash(msg) => ApiError::InternalError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status(err: AuthError) -> StatusCode {
        ApiError::from(err).status_code()
    }

    #[test]
    fn test_auth_error_status_mapping() {
        assert_eq!(status(AuthError::EmailAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status(AuthError::UserNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::AlreadyVerified), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::InvalidCode), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::InvalidEmail), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::TokenRevoked), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(AuthError::InsufficientRights { role: "user".into() }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(AuthError::Email(EmailError::Provider("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_errors_are_unauthorized_except_configuration() {
        for err in [
            TokenError::EmptyHeader,
            TokenError::InvalidSignature,
            TokenError::Malformed,
            TokenError::Expired,
            TokenError::TypeMismatch { expected: TokenType::Refresh },
            TokenError::MissingSubject,
            TokenError::InvalidSubject,
        ] {
            assert_eq!(status(AuthError::Token(err)), StatusCode::UNAUTHORIZED);
        }

        assert_eq!(
            status(AuthError::Token(TokenError::MissingSecret)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
