use linkvote_types::api::{FieldError, RegisterRequest};

use crate::error::ApiError;

const MIN_LEN: usize = 3;
pub const MAX_TITLE_LEN: usize = 300;

pub fn validate_register(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if !req.email.contains('@') {
        errors.push(FieldError::new("email", "Invalid email"));
    }
    if req.username.chars().count() < MIN_LEN {
        errors.push(FieldError::new("username", "Length must be greater than 2"));
    }
    if req.username.contains('@') {
        errors.push(FieldError::new("username", "Username cannot include @"));
    }
    if req.password.chars().count() < MIN_LEN {
        errors.push(FieldError::new("password", "Length must be greater than 2"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid registration input", errors))
    }
}

pub fn validate_password(field: &str, password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_LEN {
        return Err(ApiError::field(field, "Length must be greater than 2"));
    }
    Ok(())
}

pub fn validate_post(title: &str, text: &str) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if title.trim().is_empty() {
        errors.push(FieldError::new("title", "Title must not be empty"));
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(FieldError::new("title", format!("Title must be at most {MAX_TITLE_LEN} characters")));
    }
    if text.trim().is_empty() {
        errors.push(FieldError::new("text", "Text must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid post input", errors))
    }
}
