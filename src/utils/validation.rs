use crate::utils::error::CustomError;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("email pattern is valid")
});

/// Returns the trimmed value, or a `ValidationError` naming `field` when it is
/// missing or blank.
pub fn required_text(field: &str, value: Option<&str>) -> Result<String, CustomError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CustomError::ValidationError(format!(
            "The {} must be provided",
            field
        ))),
    }
}

pub fn validate_email(email: &str) -> Result<(), CustomError> {
    if email.len() > 254 || !EMAIL_RE.is_match(email) {
        return Err(CustomError::ValidationError(format!(
            "'{}' is not a valid email address",
            email
        )));
    }

    Ok(())
}

pub fn validate_post_id(post_id: i64) -> Result<(), CustomError> {
    if post_id <= 0 {
        return Err(CustomError::ValidationError(
            "The post_id must be a positive integer".into(),
        ));
    }

    Ok(())
}
