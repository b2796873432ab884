//! Cookie service: set/clear the JWT and CSRF cookies.
//!
//! JWT cookies are httpOnly. The CSRF cookies are readable by client script,
//! which echoes the value back in the `X-CSRF-TOKEN` header.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use chessearn_core::models::auth::{IssuedToken, TokenKind};
use time::Duration;

use crate::config::CookiePolicy;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "access_token_cookie";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token_cookie";
/// Readable CSRF value paired with the access token.
pub const CSRF_ACCESS_COOKIE: &str = "csrf_access_token";
/// Readable CSRF value paired with the refresh token.
pub const CSRF_REFRESH_COOKIE: &str = "csrf_refresh_token";
/// Header carrying the echoed CSRF value (`X-CSRF-TOKEN` on the wire;
/// header names are case-insensitive).
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The refresh token is only sent to `/auth/refresh` and `/auth/logout`.
pub const REFRESH_COOKIE_PATH: &str = "/auth";

/// Names of the token and CSRF cookies for a token kind.
pub fn cookie_names(kind: TokenKind) -> (&'static str, &'static str) {
    match kind {
        TokenKind::Access => (ACCESS_COOKIE, CSRF_ACCESS_COOKIE),
        TokenKind::Refresh => (REFRESH_COOKIE, CSRF_REFRESH_COOKIE),
    }
}

fn build(
    name: &'static str,
    value: String,
    path: &'static str,
    http_only: bool,
    max_age: Duration,
    policy: &CookiePolicy,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(http_only)
        .secure(policy.secure)
        .same_site(policy.same_site)
        .path(path)
        .max_age(max_age)
        .build()
}

/// Add the access token cookie and its CSRF cookie.
pub fn set_access(
    jar: CookieJar,
    token: &IssuedToken,
    max_age_secs: i64,
    policy: &CookiePolicy,
) -> CookieJar {
    let max_age = Duration::seconds(max_age_secs);
    jar.add(build(ACCESS_COOKIE, token.value.clone(), "/", true, max_age, policy))
        .add(build(CSRF_ACCESS_COOKIE, token.csrf.clone(), "/", false, max_age, policy))
}

/// Add the refresh token cookie and its CSRF cookie.
pub fn set_refresh(
    jar: CookieJar,
    token: &IssuedToken,
    max_age_secs: i64,
    policy: &CookiePolicy,
) -> CookieJar {
    let max_age = Duration::seconds(max_age_secs);
    jar.add(build(
        REFRESH_COOKIE,
        token.value.clone(),
        REFRESH_COOKIE_PATH,
        true,
        max_age,
        policy,
    ))
    .add(build(CSRF_REFRESH_COOKIE, token.csrf.clone(), "/", false, max_age, policy))
}

/// Expire all four auth cookies.
pub fn clear_all(jar: CookieJar, policy: &CookiePolicy) -> CookieJar {
    let gone = Duration::ZERO;
    jar.add(build(ACCESS_COOKIE, String::new(), "/", true, gone, policy))
        .add(build(CSRF_ACCESS_COOKIE, String::new(), "/", false, gone, policy))
        .add(build(REFRESH_COOKIE, String::new(), REFRESH_COOKIE_PATH, true, gone, policy))
        .add(build(CSRF_REFRESH_COOKIE, String::new(), "/", false, gone, policy))
}
