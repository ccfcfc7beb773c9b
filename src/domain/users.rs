//! Credential validation for the combined register/login flow.

use crate::domain::error::DomainError;

pub const INVALID_CREDENTIALS: &str = "Invalid Credentials!";

/// Longest address accepted, matching the usual SMTP path limit.
const MAX_EMAIL_LEN: usize = 254;

/// Trims surrounding whitespace and checks the `local@domain.tld` shape.
pub fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(DomainError::validation("Email must not be empty."));
    }
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid_email());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid_email)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid_email());
    }
    let valid_domain = domain
        .split('.')
        .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
        && domain.contains('.');
    if !valid_domain {
        return Err(invalid_email());
    }

    Ok(email.to_string())
}

pub fn check_password(password: &str, min_length: usize) -> Result<(), DomainError> {
    if password.chars().count() < min_length {
        return Err(DomainError::validation(format!(
            "Password must be at least {min_length} characters long."
        )));
    }
    Ok(())
}

fn invalid_email() -> DomainError {
    DomainError::validation("Enter a valid email address.")
}
