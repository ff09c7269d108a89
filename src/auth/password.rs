// Password hashing and verification service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::auth::error::AuthError;

/// Password service for hashing and verification
///
/// Argon2id with a random per-password salt and the library's fixed default
/// cost parameters. The output is a self-describing PHC string.
pub struct PasswordService;

impl PasswordService {
    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswordHash(e.to_string()))
    }

    /// Verify a password against a stored hash
    ///
    /// Fails closed: a malformed hash is reported as a mismatch.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = PasswordService::hash_password("Passw0rd1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordService::verify_password("Passw0rd1", &hash));
        assert!(!PasswordService::verify_password("Passw0rd2", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = PasswordService::hash_password("Passw0rd1").unwrap();
        let second = PasswordService::hash_password("Passw0rd1").unwrap();
        assert_ne!(first, second);
        assert!(PasswordService::verify_password("Passw0rd1", &second));
    }

    #[test]
    fn test_malformed_hash_fails_closed() {
        assert!(!PasswordService::verify_password("Passw0rd1", ""));
        assert!(!PasswordService::verify_password("Passw0rd1", "not-a-hash"));
        assert!(!PasswordService::verify_password("Passw0rd1", "$argon2id$v=19$broken"));
    }

    proptest! {
        // Each case runs a full Argon2 hash
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_hash_then_verify_accepts_same_password(password in "[ -~]{1,32}") {
            let hash = PasswordService::hash_password(&password).unwrap();
            prop_assert!(PasswordService::verify_password(&password, &hash));
        }

        #[test]
        fn prop_verify_rejects_different_password(
            first in "[a-zA-Z0-9]{1,24}",
            second in "[a-zA-Z0-9]{1,24}"
        ) {
            prop_assume!(first != second);
            let hash = PasswordService::hash_password(&first).unwrap();
            prop_assert!(!PasswordService::verify_password(&second, &hash));
        }
    }
}
