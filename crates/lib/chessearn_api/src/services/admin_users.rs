//! Admin-side user management.

use std::sync::Arc;

use chessearn_core::auth::password::PasswordHasher;
use chessearn_core::auth::store::CredentialStore;
use chessearn_core::auth::validation::{
    normalize_email, normalize_name, normalize_phone, normalize_username, validate_password,
};
use chessearn_core::models::auth::{NewUser, Role, User, UserChanges};
use tracing::info;

use super::{Identity, required};
use crate::error::{AppError, AppResult};
use crate::models::{CreateUserRequest, UpdateUserRequest};

fn parse_role(raw: &str) -> AppResult<Role> {
    raw.parse::<Role>().map_err(|e| {
        AppError::Validation(format!(
            "Invalid role '{}'. Must be one of: admin, player, developer",
            e.0
        ))
    })
}

fn not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

async fn hash_new_password(hasher: Arc<PasswordHasher>, password: String) -> AppResult<String> {
    validate_password(&password)?;
    Ok(hasher.hash_async(password).await?)
}

pub async fn list(users: &dyn CredentialStore) -> AppResult<Vec<User>> {
    Ok(users.list_all().await?)
}

pub async fn get(users: &dyn CredentialStore, user_id: &str) -> AppResult<User> {
    users.find_by_id(user_id).await?.ok_or_else(not_found)
}

/// Create a user with an explicit role. Every field is required.
pub async fn create(
    users: &dyn CredentialStore,
    hasher: Arc<PasswordHasher>,
    req: CreateUserRequest,
) -> AppResult<User> {
    let identity = Identity::parse(
        req.first_name,
        req.last_name,
        req.email,
        req.username,
        req.phone_number,
    )?;
    let role = parse_role(&required(req.role, "role")?)?;
    let password_hash = hash_new_password(hasher, required(req.password, "password")?).await?;

    let user = users
        .create(NewUser {
            first_name: identity.first_name,
            last_name: identity.last_name,
            email: identity.email,
            username: identity.username,
            phone_number: identity.phone_number,
            password_hash,
            role,
        })
        .await?;
    info!(user_id = %user.id, role = %user.role, "user created by admin");
    Ok(user)
}

/// Apply a partial update. Present fields go through the same normalization
/// as registration.
pub async fn update(
    users: &dyn CredentialStore,
    hasher: Arc<PasswordHasher>,
    user_id: &str,
    req: UpdateUserRequest,
) -> AppResult<User> {
    let mut changes = UserChanges {
        first_name: req
            .first_name
            .map(|v| normalize_name("First name", &v))
            .transpose()?,
        last_name: req
            .last_name
            .map(|v| normalize_name("Last name", &v))
            .transpose()?,
        email: req.email.map(|v| normalize_email(&v)).transpose()?,
        username: req.username.map(|v| normalize_username(&v)).transpose()?,
        phone_number: req.phone_number.map(|v| normalize_phone(&v)).transpose()?,
        role: req.role.map(|v| parse_role(&v)).transpose()?,
        is_active: req.is_active,
        is_verified: req.is_verified,
        ..UserChanges::default()
    };
    if let Some(password) = req.password {
        changes.password_hash = Some(hash_new_password(hasher, password).await?);
    }
    if changes.is_empty() {
        return Err(AppError::Validation("No data provided".into()));
    }

    let user = users.update(user_id, changes).await?.ok_or_else(not_found)?;
    info!(user_id = %user.id, "user updated by admin");
    Ok(user)
}

pub async fn delete(users: &dyn CredentialStore, user_id: &str) -> AppResult<()> {
    if !users.delete(user_id).await? {
        return Err(not_found());
    }
    info!(user_id, "user deleted by admin");
    Ok(())
}

pub async fn reset_password(
    users: &dyn CredentialStore,
    hasher: Arc<PasswordHasher>,
    user_id: &str,
    password: Option<String>,
) -> AppResult<()> {
    let password_hash = hash_new_password(hasher, required(password, "password")?).await?;
    if !users.update_password(user_id, &password_hash).await? {
        return Err(not_found());
    }
    info!(user_id, "password reset by admin");
    Ok(())
}
