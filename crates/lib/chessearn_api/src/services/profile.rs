//! Profile photos on local disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chessearn_core::auth::store::CredentialStore;
use chessearn_core::models::auth::User;
use tracing::{error, info};

use crate::error::{AppError, AppResult};

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Lower-cased extension of an uploaded filename, if it is an accepted
/// image type.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn content_type(filename: &str) -> &'static str {
    match allowed_extension(filename).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Absolute URL the photo of `user` is served from.
pub fn photo_url(public_base_url: &str, user: &User) -> Option<String> {
    user.photo_filename
        .as_ref()
        .map(|_| format!("{public_base_url}/profile/photo/{}", user.id))
}

/// Directory-backed photo storage. One file per user, overwritten on upload.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the photo and record its filename on the user.
    pub async fn save(
        &self,
        users: &dyn CredentialStore,
        user_id: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> AppResult<String> {
        let ext = allowed_extension(original_name).ok_or_else(|| {
            AppError::Validation("Invalid file type. Allowed: jpg, jpeg, png, gif".into())
        })?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }
        let filename = format!("user_{user_id}_profile.{ext}");

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Internal(format!("create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(&filename);
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            error!(path = %path.display(), error = %e, "failed to write profile photo");
            return Err(AppError::Internal(format!("write {}: {e}", path.display())));
        }

        if !users.set_photo(user_id, &filename).await? {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AppError::NotFound("User not found".into()));
        }
        info!(user_id, filename = %filename, "profile photo updated");
        Ok(filename)
    }

    /// Read a stored photo. `None` when the file is missing.
    pub async fn load(&self, filename: &str) -> AppResult<Option<Vec<u8>>> {
        // Filenames come from the store, but never leave the upload dir.
        if Path::new(filename).file_name().and_then(|n| n.to_str()) != Some(filename) {
            return Ok(None);
        }
        match tokio::fs::read(self.dir.join(filename)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Internal(format!("read {filename}: {e}"))),
        }
    }
}
