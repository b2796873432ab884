//! Input validation and normalization for user identity fields.
//!
//! Everything that reaches the credential store goes through here first, so
//! uniqueness checks compare normalized values.

use email_address::{EmailAddress, Options};
use phonenumber::Mode;

use super::AuthError;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// bcrypt ignores everything past 72 bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

const MAX_NAME_CHARS: usize = 50;
const MAX_EMAIL_CHARS: usize = 120;
const MIN_USERNAME_CHARS: usize = 3;
const MAX_USERNAME_CHARS: usize = 50;

/// Trim, lower-case and check an email address. The domain needs a TLD;
/// display names and domain literals are refused.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if email.chars().count() > MAX_EMAIL_CHARS {
        return Err(AuthError::Validation("Invalid email address".into()));
    }
    let options = Options::default()
        .with_required_tld()
        .without_display_text()
        .without_domain_literal();
    let parsed = EmailAddress::parse_with_options(&email, options)
        .map_err(|e| AuthError::Validation(format!("Invalid email address: {e}")))?;
    Ok(parsed.email())
}

/// Strip formatting from a phone number and return it in E.164 form.
///
/// Accepts `254755443382`, `+254755443382` or `254-755-443-382`; a leading
/// `+` is added when missing. The number must belong to a real numbering
/// plan, not merely have a plausible length.
pub fn normalize_phone(raw: &str) -> Result<String, AuthError> {
    let invalid = || AuthError::Validation("Invalid phone number".into());

    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if digits.is_empty() || digits.contains('+') {
        return Err(invalid());
    }

    let number = phonenumber::parse(None, format!("+{digits}")).map_err(|_| invalid())?;
    if !phonenumber::is_valid(&number) {
        return Err(invalid());
    }
    Ok(number.format().mode(Mode::E164).to_string())
}

/// Trim and check a username: 3–50 chars of `[A-Za-z0-9_.-]`, not all
/// digits. An all-digit username would shadow the phone number it spells
/// at login.
pub fn normalize_username(raw: &str) -> Result<String, AuthError> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Username must be {MIN_USERNAME_CHARS}-{MAX_USERNAME_CHARS} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AuthError::Validation(
            "Username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    if username.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation(
            "Username must contain at least one non-digit character".into(),
        ));
    }
    Ok(username.to_string())
}

/// Trim and check a first or last name.
pub fn normalize_name(field: &str, raw: &str) -> Result<String, AuthError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AuthError::Validation(format!("{field} is required")));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AuthError::Validation(format!(
            "{field} must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

/// A login identifier in the normalized form of each field it may match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierKeys {
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
}

impl IdentifierKeys {
    pub fn from_raw(identifier: &str) -> Self {
        let trimmed = identifier.trim();
        Self {
            email: trimmed.to_lowercase(),
            username: trimmed.to_string(),
            phone: normalize_phone(trimmed).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased() {
        assert_eq!(normalize_email("  A@X.com ").unwrap(), "a@x.com");
    }

    #[test]
    fn bad_emails_rejected() {
        for raw in [
            "",
            "plain",
            "a@",
            "@x.com",
            "a@x",
            "a b@x.com",
            "a@@x.com",
            "a@.com",
            "Alice <a@x.com>",
            "a@[127.0.0.1]",
        ] {
            assert!(normalize_email(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn phone_formatting_is_stripped() {
        assert_eq!(normalize_phone("254755443382").unwrap(), "+254755443382");
        assert_eq!(normalize_phone("+254 755-443-382").unwrap(), "+254755443382");
        assert_eq!(normalize_phone("(254) 700 000001").unwrap(), "+254700000001");
    }

    #[test]
    fn bad_phones_rejected() {
        for raw in ["", "12345", "+0254755443382", "1234567890123456", "25+4755443382"] {
            assert!(normalize_phone(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn phones_outside_a_numbering_plan_rejected() {
        // +999 is an unassigned country code; +1 needs ten national digits.
        for raw in ["+99900000000", "12345678", "+254100", "+2549999999999"] {
            assert!(normalize_phone(raw).is_err(), "{raw} should be rejected");
        }
        assert_eq!(normalize_phone("+47 900 00 000").unwrap(), "+4790000000");
    }

    #[test]
    fn username_rules() {
        assert_eq!(normalize_username(" alice ").unwrap(), "alice");
        assert!(normalize_username("al").is_err());
        assert!(normalize_username("alice@x").is_err());
        assert!(normalize_username("+254700000001").is_err());
        assert!(normalize_username("254700000001").is_err());
        assert_eq!(normalize_username("player1").unwrap(), "player1");
    }

    #[test]
    fn password_length_rules() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough1").is_ok());
        assert!(validate_password(&"x".repeat(73)).is_err());
    }

    #[test]
    fn identifier_keys_cover_each_field() {
        let keys = IdentifierKeys::from_raw("Alice@X.com");
        assert_eq!(keys.email, "alice@x.com");
        assert_eq!(keys.username, "Alice@X.com");
        assert_eq!(keys.phone, None);

        let keys = IdentifierKeys::from_raw("254700000001");
        assert_eq!(keys.phone.as_deref(), Some("+254700000001"));
    }
}
