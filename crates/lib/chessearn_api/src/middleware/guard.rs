//! Role authorization. Runs after the auth middleware has verified the token.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chessearn_core::auth::store::CredentialStore;
use chessearn_core::models::auth::{Role, User};
use tracing::debug;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::error::{AppError, AppResult};

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NoSession,
    UserNotFound,
    InsufficientRole(Role),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow(User),
    Deny(Rejection),
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NoSession => AppError::Unauthorized("Authentication required".into()),
            Rejection::UserNotFound => AppError::NotFound("User not found".into()),
            Rejection::InsufficientRole(_) => {
                AppError::Forbidden("You do not have permission to access this resource".into())
            }
        }
    }
}

/// The current user, loaded by the guard for downstream handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Decide whether `subject` may proceed. The user's role is read from the
/// store, not the token, so a demotion applies immediately.
pub async fn authorize(
    users: &dyn CredentialStore,
    subject: Option<&str>,
    allowed: &[Role],
) -> AppResult<Decision> {
    let Some(subject) = subject else {
        return Ok(Decision::Deny(Rejection::NoSession));
    };
    let Some(user) = users.find_by_id(subject).await? else {
        return Ok(Decision::Deny(Rejection::UserNotFound));
    };
    if allowed.iter().any(|role| role.matches(user.role.as_str())) {
        Ok(Decision::Allow(user))
    } else {
        debug!(user_id = %user.id, role = %user.role, "role not allowed");
        Ok(Decision::Deny(Rejection::InsufficientRole(user.role)))
    }
}

async fn require_roles(
    state: AppState,
    mut request: Request,
    next: Next,
    allowed: &[Role],
) -> Result<Response, AppError> {
    let subject = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|auth| auth.0.sub.clone());
    match authorize(state.users.as_ref(), subject.as_deref(), allowed).await? {
        Decision::Allow(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        Decision::Deny(rejection) => Err(rejection.into()),
    }
}

/// Axum middleware: admin only.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_roles(state, request, next, &[Role::Admin]).await
}
