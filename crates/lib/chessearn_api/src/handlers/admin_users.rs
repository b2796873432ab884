//! Admin user management handlers. Mounted behind `require_access` and
//! `require_admin`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    CreateUserRequest, MessageResponse, ResetPasswordRequest, RolesResponse, UpdateUserRequest,
    UserResponse,
};
use crate::services::admin_users;

/// `GET /admin/users`
pub async fn list_users_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = admin_users::list(state.users.as_ref()).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// `POST /admin/users`
pub async fn create_user_handler(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let Json(body) = body?;
    let user = admin_users::create(state.users.as_ref(), state.sessions.hasher(), body).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `GET /admin/users/{id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let user = admin_users::get(state.users.as_ref(), &user_id).await?;
    Ok(Json(user.into()))
}

/// `PUT /admin/users/{id}`
pub async fn update_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    let Json(body) = body?;
    let user = admin_users::update(
        state.users.as_ref(),
        state.sessions.hasher(),
        &user_id,
        body,
    )
    .await?;
    Ok(Json(user.into()))
}

/// `DELETE /admin/users/{id}`
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    admin_users::delete(state.users.as_ref(), &user_id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// `POST /admin/users/{id}/reset-password`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(body) = body?;
    admin_users::reset_password(
        state.users.as_ref(),
        state.sessions.hasher(),
        &user_id,
        body.password,
    )
    .await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

/// `GET /admin/users/roles`
pub async fn roles_handler() -> Json<RolesResponse> {
    Json(RolesResponse::all())
}
