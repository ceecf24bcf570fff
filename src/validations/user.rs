use validator::ValidationError;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_NAME_LENGTH: usize = 100;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a display name is present and reasonably short
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid("name_required", "Please enter your name"));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(invalid("name_length", "Name must be at most 100 characters"));
    }
    Ok(())
}

/// Validates password strength:
/// - Between 8-128 characters
/// - At least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(invalid(
            "password_length",
            "Password must be between 8 and 128 characters",
        ));
    }

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(invalid(
            "password_strength",
            "Password must contain at least one letter and one digit",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ada Lovelace").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("correct horse 1").is_ok());
        assert!(validate_password("abcdefg1").is_ok());

        assert!(validate_password("abc1").is_err()); // too short
        assert!(validate_password("abcdefgh").is_err()); // no digit
        assert!(validate_password("12345678").is_err()); // no letter
        assert!(validate_password(&format!("a1{}", "x".repeat(127))).is_err());
    }

    #[test]
    fn errors_carry_messages() {
        let err = validate_password("abcdefgh").unwrap_err();
        assert_eq!(
            err.message.as_deref(),
            Some("Password must contain at least one letter and one digit")
        );
    }
}
