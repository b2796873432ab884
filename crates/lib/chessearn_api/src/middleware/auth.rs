//! Authentication middleware: cookie JWT verification, CSRF double-submit
//! and revocation lookup.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chessearn_core::models::auth::{TokenClaims, TokenKind};

use crate::AppState;
use crate::error::AppError;

/// Key used to store verified `TokenClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

async fn authenticate(
    state: AppState,
    jar: CookieJar,
    request: Request,
    next: Next,
    kind: TokenKind,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let claims = state
        .sessions
        .authenticate(&parts.method, &parts.headers, &jar, kind)
        .await?;
    parts.extensions.insert(AuthenticatedUser(claims));
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Axum middleware: requires a valid, non-revoked access token cookie.
pub async fn require_access(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(state, jar, request, next, TokenKind::Access).await
}

/// Axum middleware: requires a valid, non-revoked refresh token cookie.
pub async fn require_refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(state, jar, request, next, TokenKind::Refresh).await
}
