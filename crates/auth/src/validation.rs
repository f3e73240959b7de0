//! Input validation for account and profile data.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AuthError;
use crate::models::ProfileUpdate;

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.len() > 254 {
        return Err(AuthError::validation("Email too long"));
    }

    let matches = EMAIL_RE
        .as_ref()
        .map(|re| re.is_match(email))
        .unwrap_or(false);
    if !matches {
        return Err(AuthError::validation("Invalid email format"));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < 8 {
        return Err(AuthError::validation(
            "Password must be at least 8 characters long",
        ));
    }

    if password.len() > 128 {
        return Err(AuthError::validation(
            "Password must be less than 128 characters long",
        ));
    }

    if !password.chars().any(char::is_alphabetic) {
        return Err(AuthError::validation("Password must contain a letter"));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::validation("Password must contain a digit"));
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), AuthError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AuthError::validation("Name cannot be empty"));
    }
    if trimmed.chars().count() > 100 {
        return Err(AuthError::validation("Name must be at most 100 characters"));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(AuthError::validation("Name contains invalid characters"));
    }
    Ok(())
}

pub fn validate_profile(update: &ProfileUpdate) -> Result<(), AuthError> {
    if let Some(age) = update.age {
        if !(0..=150).contains(&age) {
            return Err(AuthError::validation("Age must be between 0 and 150"));
        }
    }

    if let Some(date) = update.date_of_birth.as_deref() {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            AuthError::validation("Date of birth must use the YYYY-MM-DD format")
        })?;
    }

    if let Some(bio) = update.bio.as_deref() {
        if bio.chars().count() > 500 {
            return Err(AuthError::validation("Bio must be at most 500 characters"));
        }
    }

    Ok(())
}
