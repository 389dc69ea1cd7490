//! Input validation for registration payloads
//!
//! Failures map to 422 before any storage or upstream call happens.

use regex::Regex;
use std::sync::OnceLock;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

/// Validate a username: 3-32 characters of letters, digits or underscores
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < USERNAME_MIN || username.len() > USERNAME_MAX {
        return Err(format!(
            "Username must be between {} and {} characters long",
            USERNAME_MIN, USERNAME_MAX
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    // RFC 5321 limit on the full address.
    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a password
///
/// Only length is enforced here; composition rules are a product decision
/// that has been rejected so far.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < PASSWORD_MIN {
        return Err(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN
        ));
    }

    if password.len() > PASSWORD_MAX {
        return Err(format!(
            "Password must be at most {} characters long",
            PASSWORD_MAX
        ));
    }

    Ok(())
}
