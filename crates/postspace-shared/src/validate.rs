//! Input validation shared by the server routes and the client forms.
//!
//! Every check returns a [`ValidationError`]; callers surface it
//! immediately and never retry.

use crate::constants::{
    MAX_BIO_LEN, MAX_BODY_LEN, MAX_TAG_LEN, MAX_TITLE_LEN, MAX_USERNAME_LEN, MIN_USERNAME_LEN,
};
use crate::error::ValidationError;

/// Returns the trimmed text, or `MissingField` when only whitespace remains.
pub fn require_text<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed)
}

pub fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }
    Ok(())
}

/// Root post: both title and text are required.
pub fn root_post(title: &str, text: &str) -> Result<(String, String), ValidationError> {
    let title = require_text("title", title)?;
    let text = require_text("text", text)?;
    max_len("title", title, MAX_TITLE_LEN)?;
    max_len("text", text, MAX_BODY_LEN)?;
    Ok((title.to_string(), text.to_string()))
}

/// Reply text: whitespace-only is rejected, the stored text is trimmed.
pub fn reply_text(text: &str) -> Result<String, ValidationError> {
    let text = require_text("text", text)?;
    max_len("text", text, MAX_BODY_LEN)?;
    Ok(text.to_string())
}

pub fn username(value: &str) -> Result<String, ValidationError> {
    let name = require_text("username", value)?;
    let len = name.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ValidationError::InvalidUsername(format!(
            "must be {MIN_USERNAME_LEN}-{MAX_USERNAME_LEN} characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(ValidationError::InvalidUsername(format!(
            "character {bad:?} is not allowed"
        )));
    }
    Ok(name.to_string())
}

/// `local@domain.tld`, no whitespace anywhere.
pub fn email(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    let Some((local, domain)) = value.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidEmail),
    }
}

/// Optional free-text profile fields: blank becomes `None`.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            max_len(field, v, max)?;
            Ok(Some(v.to_string()))
        }
    }
}

pub fn bio(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    optional_text("bio", value, MAX_BIO_LEN)
}

pub fn tag(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    optional_text("tag", value, MAX_TAG_LEN)
}
