use std::sync::LazyLock;

use email_address::EmailAddress;
use regex::Regex;

use crate::{
    errors::{ValidationError, ValidationIssue, ValidationResult},
    types::NewUser,
};

static USERNAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_][a-z0-9_.]{4,28}[a-z0-9_]$").ok());
static NAME_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z ]*$").ok());

const NAME_MAX_CHARS: usize = 50;
const MESSAGE_MAX_CHARS: usize = 2_200;

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// 6 to 30 characters of lower-case letters, digits, `_` and `.`, not starting or
/// ending with a dot.
pub fn is_valid_username(value: &str) -> bool {
    USERNAME_PATTERN.as_ref().is_some_and(|regex| regex.is_match(value))
}

pub fn is_valid_name(value: &str) -> bool {
    value.chars().count() <= NAME_MAX_CHARS && NAME_PATTERN.as_ref().is_some_and(|regex| regex.is_match(value))
}

/// Lower-cases the email and trims the name, then checks every field.
pub fn normalize_new_user(input: NewUser) -> ValidationResult<NewUser> {
    let user = NewUser {
        email: input.email.trim().to_lowercase(),
        username: input.username.trim().to_string(),
        name: input.name.trim().to_string(),
        password_hash: input.password_hash,
    };

    let mut issues = Vec::new();
    if !is_valid_email(&user.email) {
        issues.push(ValidationIssue::new("email", "invalid_email", "email address is not valid"));
    }
    if !is_valid_username(&user.username) {
        issues.push(ValidationIssue::new(
            "username",
            "invalid_username",
            "username must be 6-30 characters of a-z, 0-9, '_' or '.' and must not start or end with '.'",
        ));
    }
    if !is_valid_name(&user.name) {
        issues.push(ValidationIssue::new(
            "name",
            "invalid_name",
            "name must start with a letter, contain only letters and spaces, and be at most 50 characters",
        ));
    }
    if user.password_hash.is_empty() {
        issues.push(ValidationIssue::new("password_hash", "required", "password hash is required"));
    }

    if issues.is_empty() {
        Ok(user)
    } else {
        Err(ValidationError::new(issues))
    }
}

/// Comment and reply bodies: non-blank, bounded length. Returns the trimmed message.
pub fn validate_message(field: &str, message: &str) -> ValidationResult<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::single(field, "required", "message must not be empty"));
    }
    if trimmed.chars().count() > MESSAGE_MAX_CHARS {
        return Err(ValidationError::single(
            field,
            "too_long",
            format!("message must be at most {MESSAGE_MAX_CHARS} characters"),
        ));
    }
    Ok(trimmed.to_string())
}
