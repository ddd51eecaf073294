//! Validation for aliases, usernames, emails and display names
//!
//! Aliases are the short human-chosen identifiers of users, organizations and
//! stores. They are normalized to lowercase at the boundary and validated here,
//! before any registry lookup or write.

use crate::error::{Result, VaultError};
use regex::Regex;
use std::sync::OnceLock;

/// Lowercase alphanumeric, starting with a letter
const ALIAS_PATTERN: &str = r"^[a-z][a-z0-9]*$";

const EMAIL_PATTERN: &str = r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(\.[a-z0-9\-]+)+$";

/// Maximum alias length
pub const MAX_ALIAS_LENGTH: usize = 64;

/// Maximum email length (RFC 5321 path limit)
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of display names and titles
pub const MAX_NAME_LENGTH: usize = 255;

fn alias_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ALIAS_PATTERN).expect("alias pattern compiles"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"))
}

/// Validate an already-lowercased alias or username
///
/// # Examples
///
/// ```
/// use object_vault::core::validation::validate_alias;
///
/// assert!(validate_alias("acme").is_ok());
/// assert!(validate_alias("acme2").is_ok());
/// assert!(validate_alias("Acme").is_err());
/// assert!(validate_alias("2acme").is_err());
/// assert!(validate_alias("ac-me").is_err());
/// ```
pub fn validate_alias(alias: &str) -> Result<()> {
    if alias.is_empty() {
        return Err(VaultError::InvalidParameter("alias cannot be empty".to_string()));
    }
    if alias.len() > MAX_ALIAS_LENGTH {
        return Err(VaultError::InvalidParameter(format!(
            "alias too long (max {} characters)",
            MAX_ALIAS_LENGTH
        )));
    }
    if !alias_regex().is_match(alias) {
        return Err(VaultError::InvalidParameter(format!(
            "alias '{}' must be lowercase alphanumeric and start with a letter",
            alias
        )));
    }
    Ok(())
}

/// Validate an already-lowercased email address
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return Err(VaultError::InvalidParameter(format!(
            "email must be 1-{} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    if !email_regex().is_match(email) {
        return Err(VaultError::InvalidParameter(format!("invalid email '{}'", email)));
    }
    Ok(())
}

/// Validate a display name or title
pub fn validate_name(field: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(VaultError::InvalidParameter(format!("{} cannot be empty", field)));
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(VaultError::InvalidParameter(format!(
            "{} too long (max {} characters)",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Lowercase and validate an alias
pub fn normalize_alias(alias: &str) -> Result<String> {
    let alias = alias.trim().to_lowercase();
    validate_alias(&alias)?;
    Ok(alias)
}

/// Lowercase and validate an email
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    validate_email(&email)?;
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_aliases() {
        for alias in ["a", "acme", "vault", "bob2", "x1y2z3"] {
            assert!(validate_alias(alias).is_ok(), "{} should be valid", alias);
        }
    }

    #[test]
    fn test_invalid_aliases() {
        let long = "a".repeat(MAX_ALIAS_LENGTH + 1);
        for alias in ["", "Acme", "1acme", "ac me", "ac_me", "ac-me", long.as_str()] {
            assert!(validate_alias(alias).is_err(), "{} should be invalid", alias);
        }
    }

    #[test]
    fn test_emails() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a.b+tag@mail.example.org").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("alice@example").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_alias("  Acme ").unwrap(), "acme");
        assert_eq!(normalize_email("Alice@Example.COM").unwrap(), "alice@example.com");
    }

    #[test]
    fn test_names() {
        assert!(validate_name("name", "Acme Corp").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("title", &"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }
}
