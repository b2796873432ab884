//! # chessearn_api
//!
//! HTTP API library for ChessEarn: cookie-based JWT sessions, token
//! revocation, role-gated admin endpoints and profile photos.

pub mod config;
pub mod error;
pub mod handlers;
pub mod maintenance;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use chessearn_core::auth::jwt::TokenIssuer;
use chessearn_core::auth::password::PasswordHasher;
use chessearn_core::auth::revocation::{PgRevocationLedger, RevocationLedger};
use chessearn_core::auth::store::{CredentialStore, PgCredentialStore};
use sqlx::PgPool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ApiConfig;
use crate::handlers::{admin_users, auth, index, profile};
use crate::middleware::rate_limit::LoginRateLimiter;
use crate::services::auth::SessionManager;
use crate::services::cookies::CSRF_HEADER;
use crate::services::profile::PhotoStore;

/// Upper bound for a profile photo upload.
const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    pub users: Arc<dyn CredentialStore>,
    pub ledger: Arc<dyn RevocationLedger>,
    pub sessions: SessionManager,
    pub login_limiter: Arc<LoginRateLimiter>,
    pub photos: PhotoStore,
}

impl AppState {
    /// Wire the services around the given stores.
    pub fn new(
        config: ApiConfig,
        users: Arc<dyn CredentialStore>,
        ledger: Arc<dyn RevocationLedger>,
    ) -> Self {
        let tokens = Arc::new(TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::seconds(config.access_token_ttl_secs),
            chrono::Duration::seconds(config.refresh_token_ttl_secs),
        ));
        let hasher = Arc::new(PasswordHasher::new(config.bcrypt_cost));
        let sessions = SessionManager::new(users.clone(), ledger.clone(), tokens, hasher);
        Self {
            login_limiter: Arc::new(LoginRateLimiter::per_minute(config.login_rate_limit)),
            photos: PhotoStore::new(config.upload_dir.clone()),
            config,
            users,
            ledger,
            sessions,
        }
    }

    /// State backed by PostgreSQL.
    pub fn with_postgres(config: ApiConfig, pool: PgPool) -> Self {
        Self::new(
            config,
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgRevocationLedger::new(pool)),
        )
    }
}

/// Run embedded database migrations.
///
/// Delegates to `chessearn_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    chessearn_core::migrate::migrate(pool).await
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentialed CORS needs explicit origins, methods and headers.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
        ])
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route("/", get(index::index_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/status", get(auth::status_handler))
        .route("/profile/photo/{user_id}", get(profile::get_photo_handler));

    let login = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::limit_login,
        ));

    let refresh = Router::new()
        .route("/auth/refresh", post(auth::refresh_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_refresh,
        ));

    // Protected routes (require an access token)
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/profile", get(profile::get_profile_handler))
        .route(
            "/profile/photo",
            post(profile::upload_photo_handler).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_access,
        ));

    // Admin routes; the guard layer is added first so it runs after auth.
    let admin = Router::new()
        .route(
            "/admin/users",
            get(admin_users::list_users_handler).post(admin_users::create_user_handler),
        )
        .route("/admin/users/roles", get(admin_users::roles_handler))
        .route(
            "/admin/users/{id}",
            get(admin_users::get_user_handler)
                .put(admin_users::update_user_handler)
                .delete(admin_users::delete_user_handler),
        )
        .route(
            "/admin/users/{id}/reset-password",
            post(admin_users::reset_password_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::guard::require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_access,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public)
        .merge(login)
        .merge(refresh)
        .merge(protected)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn panic_response(
    _err: Box<dyn std::any::Any + Send + 'static>,
) -> axum::http::Response<axum::body::Body> {
    tracing::error!("handler panicked");
    let body = serde_json::json!({
        "error": "internal_error",
        "message": "Internal server error",
    });
    axum::http::Response::builder()
        .status(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap_or_default()
}
