//! Business logic behind the handlers.

pub mod admin_users;
pub mod auth;
pub mod cookies;
pub mod profile;

use chessearn_core::auth::validation::{
    normalize_email, normalize_name, normalize_phone, normalize_username,
};

use crate::error::{AppError, AppResult};

/// Unwrap a required request field, treating blank strings as missing.
pub(crate) fn required(value: Option<String>, field: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("Missing required field: {field}"))),
    }
}

/// Validated, normalized identity fields of a new user.
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub phone_number: String,
}

impl Identity {
    pub fn parse(
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        username: Option<String>,
        phone_number: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            first_name: normalize_name("First name", &required(first_name, "first_name")?)?,
            last_name: normalize_name("Last name", &required(last_name, "last_name")?)?,
            email: normalize_email(&required(email, "email")?)?,
            username: normalize_username(&required(username, "username")?)?,
            phone_number: normalize_phone(&required(phone_number, "phone_number")?)?,
        })
    }
}
