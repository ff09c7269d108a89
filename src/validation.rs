// Validation utilities module
// Custom field validators used by the request DTOs

use validator::ValidationError;

/// Length of an emailed verification code
pub const VERIFICATION_CODE_LENGTH: usize = 6;

/// Validates password strength
/// At least 8 characters with an upper case letter, a lower case letter and a digit
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= 8;
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_upper && has_lower && has_digit {
        Ok(())
    } else {
        let mut error = ValidationError::new("weak_password");
        error.message = Some(
            "Password must be at least 8 characters and contain upper case, lower case and digit"
                .into(),
        );
        Err(error)
    }
}

/// Validates the shape of a verification code
/// Exactly 6 characters including at least one upper case letter or digit
pub fn validate_verification_code(code: &str) -> Result<(), ValidationError> {
    let well_formed = code.len() == VERIFICATION_CODE_LENGTH
        && code
            .chars()
            .any(|c| c.is_uppercase() || c.is_ascii_digit());

    if well_formed {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_code");
        error.message =
            Some("Code must be 6 characters with an upper case letter or a digit".into());
        Err(error)
    }
}
