//! Authentication request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, MessageResponse, RegisterRequest, SessionResponse, SessionStatusResponse,
    UserSummary,
};
use crate::services::cookies::{self, REFRESH_COOKIE};

/// `POST /auth/register`: create a player account.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<UserSummary>)> {
    let Json(body) = body?;
    let user = state.sessions.register(body).await?;
    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

/// `POST /auth/login`: verify credentials and set the session cookies.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let Json(body) = body?;
    let outcome = state.sessions.login(body).await?;

    let config = &state.config;
    let jar = cookies::set_access(
        jar,
        &outcome.access,
        config.access_token_ttl_secs,
        &config.cookies,
    );
    let jar = cookies::set_refresh(
        jar,
        &outcome.refresh,
        config.refresh_token_ttl_secs,
        &config.cookies,
    );
    Ok((
        jar,
        Json(SessionResponse {
            user: UserSummary::from(&outcome.user),
        }),
    ))
}

/// `POST /auth/refresh`: issue a new access token from the refresh cookie.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let (user, access) = state.sessions.refresh(&claims).await?;
    let jar = cookies::set_access(
        jar,
        &access,
        state.config.access_token_ttl_secs,
        &state.config.cookies,
    );
    Ok((
        jar,
        Json(SessionResponse {
            user: UserSummary::from(&user),
        }),
    ))
}

/// `POST /auth/logout`: revoke the session's tokens and clear cookies.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let refresh = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    state.sessions.logout(&claims, refresh.as_deref()).await?;
    let jar = cookies::clear_all(jar, &state.config.cookies);
    Ok((jar, Json(MessageResponse::new("Successfully logged out"))))
}

/// `GET /auth/status`: classify the caller's session from its cookies.
pub async fn status_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Json<SessionStatusResponse>> {
    let session = state.sessions.session_state(&jar).await?;
    let claims = session.claims();
    Ok(Json(SessionStatusResponse {
        state: session.as_str().to_string(),
        user_id: claims.map(|c| c.sub.clone()),
        role: claims.map(|c| c.role),
    }))
}
