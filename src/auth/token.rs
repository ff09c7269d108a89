// JWT token generation and validation

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{error::TokenError, models::TokenType};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
    /// Unique per issued token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Signs and verifies tokens with a shared HS256 secret
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
}

impl TokenSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a signed token for `user_id` that expires at `expires_at`
    pub fn issue(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        token_type: TokenType,
    ) -> Result<String, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        let claims = Claims {
            sub: Some(user_id.to_string()),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
            token_type: Some(token_type.as_str().to_string()),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify a raw header value (with or without "Bearer ") against this secret
    pub fn verify(&self, raw_header: &str, expected: TokenType) -> Result<Uuid, TokenError> {
        verify_token(raw_header, &self.secret, expected)
    }
}

/// Strip an optional "Bearer " scheme and surrounding whitespace
pub fn bearer_token(raw_header: &str) -> &str {
    let header = raw_header.trim_start();
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
}

/// Verify a token and return the user id it was issued for
///
/// Signature and expiry are checked before the type claim, so a token of the
/// wrong type never verifies whatever its expiry.
pub fn verify_token(raw_header: &str, secret: &str, expected: TokenType) -> Result<Uuid, TokenError> {
    let token = bearer_token(raw_header);
    if token.is_empty() {
        return Err(TokenError::EmptyHeader);
    }
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })?;

    if claims.token_type.as_deref() != Some(expected.as_str()) {
        return Err(TokenError::TypeMismatch { expected });
    }

    let subject = claims.sub.ok_or(TokenError::MissingSubject)?;
    Uuid::parse_str(&subject).map_err(|_| TokenError::InvalidSubject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    const SECRET: &str = "test_secret_key_for_testing_purposes";

    fn test_signer() -> TokenSigner {
        TokenSigner::new(SECRET)
    }

    fn in_minutes(minutes: i64) -> DateTime<Utc> {
        Utc::now() + Duration::minutes(minutes)
    }

    fn encode_raw<T: Serialize>(claims: &T) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_then_verify_returns_subject() {
        let signer = test_signer();
        let user_id = Uuid::new_v4();

        let token = signer.issue(user_id, in_minutes(15), TokenType::Access).unwrap();

        assert_eq!(signer.verify(&token, TokenType::Access).unwrap(), user_id);
        assert_eq!(
            signer.verify(&format!("Bearer {}", token), TokenType::Access).unwrap(),
            user_id
        );
    }

    #[test]
    fn test_claims_carry_type_and_expiry() {
        let signer = test_signer();
        let expires_at = in_minutes(60);
        let token = signer.issue(Uuid::new_v4(), expires_at, TokenType::Refresh).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(data.claims.exp, expires_at.timestamp());
        assert_eq!(data.claims.token_type.as_deref(), Some("refresh"));
        assert!(data.claims.iat <= Utc::now().timestamp());
    }

    #[test]
    fn test_tokens_issued_together_differ() {
        let signer = test_signer();
        let user_id = Uuid::new_v4();
        let expires_at = in_minutes(15);

        let first = signer.issue(user_id, expires_at, TokenType::Access).unwrap();
        let second = signer.issue(user_id, expires_at, TokenType::Access).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_access_token_is_not_a_refresh_token() {
        let signer = test_signer();
        let access = signer.issue(Uuid::new_v4(), in_minutes(15), TokenType::Access).unwrap();
        let refresh = signer.issue(Uuid::new_v4(), in_minutes(60), TokenType::Refresh).unwrap();

        assert!(matches!(
            signer.verify(&access, TokenType::Refresh),
            Err(TokenError::TypeMismatch { expected: TokenType::Refresh })
        ));
        assert!(matches!(
            signer.verify(&refresh, TokenType::Access),
            Err(TokenError::TypeMismatch { expected: TokenType::Access })
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = test_signer();
        let token = signer
            .issue(Uuid::new_v4(), Utc::now() - Duration::seconds(5), TokenType::Access)
            .unwrap();

        assert!(matches!(
            signer.verify(&token, TokenType::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = TokenSigner::new("secret1")
            .issue(Uuid::new_v4(), in_minutes(15), TokenType::Access)
            .unwrap();

        assert!(matches!(
            TokenSigner::new("secret2").verify(&token, TokenType::Access),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_fails_even_when_expired() {
        let token = TokenSigner::new("secret1")
            .issue(Uuid::new_v4(), Utc::now() - Duration::hours(1), TokenType::Access)
            .unwrap();

        assert!(TokenSigner::new("secret2").verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn test_empty_header_is_rejected() {
        let signer = test_signer();
        for header in ["", "   ", "Bearer ", "Bearer    "] {
            assert!(matches!(
                signer.verify(header, TokenType::Access),
                Err(TokenError::EmptyHeader)
            ));
        }
    }

    #[test]
    fn test_bearer_token_strips_scheme() {
        assert_eq!(bearer_token("Bearer abc"), "abc");
        assert_eq!(bearer_token("  Bearer abc  "), "abc");
        assert_eq!(bearer_token("abc"), "abc");
        assert_eq!(bearer_token("Bearer "), "");
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let signer = test_signer();
        for token in [
            "not.a.token",
            "invalid_token_format",
            "Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.invalid.signature",
        ] {
            assert!(signer.verify(token, TokenType::Access).is_err());
        }
    }

    #[test]
    fn test_missing_subject_is_rejected() {
        let token = encode_raw(&serde_json::json!({
            "iat": Utc::now().timestamp(),
            "exp": in_minutes(15).timestamp(),
            "type": "access",
        }));

        assert!(matches!(
            test_signer().verify(&token, TokenType::Access),
            Err(TokenError::MissingSubject)
        ));
    }

    #[test]
    fn test_non_uuid_subject_is_rejected() {
        let token = encode_raw(&serde_json::json!({
            "sub": "42",
            "exp": in_minutes(15).timestamp(),
            "type": "access",
        }));

        assert!(matches!(
            test_signer().verify(&token, TokenType::Access),
            Err(TokenError::InvalidSubject)
        ));
    }

    #[test]
    fn test_missing_type_claim_is_rejected() {
        let token = encode_raw(&serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "exp": in_minutes(15).timestamp(),
        }));

        assert!(matches!(
            test_signer().verify(&token, TokenType::Access),
            Err(TokenError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_secret() {
        let signer = TokenSigner::new("");
        assert!(matches!(
            signer.issue(Uuid::new_v4(), in_minutes(15), TokenType::Access),
            Err(TokenError::MissingSecret)
        ));
        assert!(matches!(
            verify_token("Bearer abc.def.ghi", "", TokenType::Access),
            Err(TokenError::MissingSecret)
        ));
    }

    proptest! {
        #[test]
        fn prop_token_only_verifies_as_its_own_type(
            minutes in 1i64..100_000,
            issue_refresh in any::<bool>()
        ) {
            let signer = test_signer();
            let user_id = Uuid::new_v4();
            let (issued, other) = if issue_refresh {
                (TokenType::Refresh, TokenType::Access)
            } else {
                (TokenType::Access, TokenType::Refresh)
            };

            let token = signer.issue(user_id, in_minutes(minutes), issued).unwrap();

            prop_assert_eq!(signer.verify(&token, issued).unwrap(), user_id);
            prop_assert!(signer.verify(&token, other).is_err());
        }

        #[test]
        fn prop_expired_tokens_never_verify(
            seconds_ago in 1i64..1_000_000,
            issue_refresh in any::<bool>()
        ) {
            let signer = test_signer();
            let token_type = if issue_refresh { TokenType::Refresh } else { TokenType::Access };
            let token = signer
                .issue(Uuid::new_v4(), Utc::now() - Duration::seconds(seconds_ago), token_type)
                .unwrap();

            prop_assert!(signer.verify(&token, token_type).is_err());
        }

        #[test]
        fn prop_random_strings_are_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            prop_assert!(test_signer().verify(&malformed, TokenType::Access).is_err());
        }
    }
}
