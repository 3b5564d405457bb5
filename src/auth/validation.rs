use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{AppError, Result};
use crate::models::{LoginRequest, RegisterRequest};

pub const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern");
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !EMAIL_PATTERN.is_match(email.trim()) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_login(request: &LoginRequest) -> Result<()> {
    validate_email(&request.email)?;
    validate_password(&request.password)
}

pub fn validate_registration(request: &RegisterRequest) -> Result<()> {
    if request.display_name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    validate_email(&request.email)?;
    validate_password(&request.password)
}
