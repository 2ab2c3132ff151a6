//! Boundary checks shared by request DTOs. Each helper returns a
//! `BadRequest` carrying the first failing rule's message.

use crate::error::{AppError, AppResult};

pub fn length_between(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(AppError::BadRequest(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub fn required(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

pub fn non_negative(field: &str, value: i64) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::BadRequest(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

pub fn email(value: &str) -> AppResult<()> {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::BadRequest(
            "Please provide a valid email address".into(),
        ));
    }
    Ok(())
}

/// At least 8 characters with upper, lower, digit and one of `!@#$%^&*`.
pub fn password(field: &str, value: &str) -> AppResult<()> {
    if value.chars().count() < 8 {
        return Err(AppError::BadRequest(format!(
            "{field} must be at least 8 characters long"
        )));
    }
    let has_upper = value.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = value.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    let has_special = value.chars().any(|c| "!@#$%^&*".contains(c));
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(AppError::BadRequest(format!(
            "{field} must contain at least one uppercase letter, one lowercase letter, one number, and one special character"
        )));
    }
    Ok(())
}

pub fn phone(value: &str) -> AppResult<()> {
    let digits = value.trim().strip_prefix('+').unwrap_or(value.trim());
    if !(10..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(
            "Please provide a valid phone number".into(),
        ));
    }
    Ok(())
}

pub fn zip_code(value: &str) -> AppResult<()> {
    let value = value.trim();
    if !(5..=10).contains(&value.len()) || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest("Please provide a valid zip code".into()));
    }
    Ok(())
}

pub fn slug(value: &str) -> AppResult<()> {
    length_between("Slug", value, 2, 50)?;
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(AppError::BadRequest(
            "Slug can only contain lowercase letters, numbers, and hyphens".into(),
        ));
    }
    Ok(())
}
