//! Profile and profile photo handlers.

use axum::Extension;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ProfileResponse, UserResponse};
use crate::services::profile::{content_type, photo_url};

/// Multipart field carrying the image.
const PHOTO_FIELD: &str = "photo";

/// `GET /profile`: the caller's own profile.
pub async fn get_profile_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<ProfileResponse>> {
    let user = state
        .users
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let photo_url = photo_url(&state.config.public_base_url, &user);
    Ok(Json(ProfileResponse {
        user: UserResponse::from(user),
        photo_url,
    }))
}

/// `POST /profile/photo`: replace the caller's photo.
pub async fn upload_photo_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> AppResult<Json<ProfileResponse>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }
    let (filename, bytes) =
        upload.ok_or_else(|| AppError::Validation("No photo uploaded".into()))?;
    if filename.is_empty() {
        return Err(AppError::Validation("No file selected".into()));
    }

    state
        .photos
        .save(state.users.as_ref(), &claims.sub, &filename, &bytes)
        .await?;
    get_profile_handler(State(state), Extension(AuthenticatedUser(claims))).await
}

/// `GET /profile/photo/{user_id}`: public.
pub async fn get_photo_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let not_found = || AppError::NotFound("Photo not found".into());
    let user = state
        .users
        .find_by_id(&user_id)
        .await?
        .ok_or_else(not_found)?;
    let filename = user.photo_filename.ok_or_else(not_found)?;
    let bytes = state.photos.load(&filename).await?.ok_or_else(not_found)?;
    Ok((
        [
            (CONTENT_TYPE, content_type(&filename)),
            (CACHE_CONTROL, "public, max-age=300"),
        ],
        bytes,
    ))
}
