//! Session lifecycle through the router: register, login, refresh, logout.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::http::header::SET_COOKIE;
use axum::http::{Method, StatusCode};
use chessearn_api::services::cookies::{ACCESS_COOKIE, CSRF_ACCESS_COOKIE, REFRESH_COOKIE};
use chessearn_core::auth::AuthError;
use chessearn_core::auth::memory::MemoryRevocationLedger;
use chessearn_core::auth::revocation::RevocationLedger;
use chessearn_core::models::auth::Role;
use chrono::{DateTime, Utc};
use common::{PASSWORD, RequestBuilder, Session, TestApp, body_json};
use serde_json::json;

fn alice() -> serde_json::Value {
    json!({
        "first_name": "Alice",
        "last_name": "Kasparova",
        "email": "a@x.com",
        "username": "alice",
        "phone_number": "+254700000001",
        "password": "longenough1",
    })
}

async fn register(app: &TestApp, body: serde_json::Value) -> axum::http::Response<axum::body::Body> {
    app.send(
        RequestBuilder::new(Method::POST, "/auth/register")
            .json(body)
            .build(),
    )
    .await
}

#[tokio::test]
async fn register_login_logout_then_reuse_is_rejected() {
    let app = TestApp::new();

    let response = register(&app, alice()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["username"], "alice");
    assert_eq!(created["role"], "player");

    let (status, session) = app.login("alice", "longenough1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(session.get(ACCESS_COOKIE).is_some());
    assert!(session.get(REFRESH_COOKIE).is_some());
    assert!(session.get(CSRF_ACCESS_COOKIE).is_some());

    let response = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/logout")
                .session(&session)
                .csrf(&session.csrf_access())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut after = session.clone();
    after.absorb(&response);
    assert!(after.get(ACCESS_COOKIE).is_none(), "access cookie not cleared");
    assert!(after.get(REFRESH_COOKIE).is_none(), "refresh cookie not cleared");
    assert_eq!(app.ledger.len(), 2);

    let reuse = app
        .send(
            RequestBuilder::new(Method::GET, "/profile")
                .session(&session)
                .build(),
        )
        .await;
    assert_eq!(reuse.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_response_carries_user_summary() {
    let app = TestApp::new();
    register(&app, alice()).await;

    let response = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/login")
                .json(json!({ "identifier": "A@X.COM", "password": "longenough1" }))
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<_> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    let access = cookies
        .iter()
        .find(|c| c.starts_with(ACCESS_COOKIE))
        .expect("access cookie");
    assert!(access.contains("HttpOnly"));
    let csrf = cookies
        .iter()
        .find(|c| c.starts_with(CSRF_ACCESS_COOKIE))
        .expect("csrf cookie");
    assert!(!csrf.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "player");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = TestApp::new();
    assert_eq!(register(&app, alice()).await.status(), StatusCode::CREATED);

    let mut same_username = alice();
    same_username["email"] = json!("other@x.com");
    same_username["phone_number"] = json!("+254700000002");
    let response = register(&app, same_username).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "duplicate");

    let mut same_phone = alice();
    same_phone["email"] = json!("third@x.com");
    same_phone["username"] = json!("alice2");
    assert_eq!(
        register(&app, same_phone).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn invalid_registration_bodies_are_400() {
    let app = TestApp::new();

    let mut missing = alice();
    missing.as_object_mut().unwrap().remove("phone_number");
    assert_eq!(register(&app, missing).await.status(), StatusCode::BAD_REQUEST);

    let mut bad_email = alice();
    bad_email["email"] = json!("not-an-email");
    assert_eq!(register(&app, bad_email).await.status(), StatusCode::BAD_REQUEST);

    let mut unassigned_country = alice();
    unassigned_country["phone_number"] = json!("+99900000000");
    assert_eq!(
        register(&app, unassigned_country).await.status(),
        StatusCode::BAD_REQUEST
    );

    let mut numeric_username = alice();
    numeric_username["username"] = json!("254700000009");
    assert_eq!(
        register(&app, numeric_username).await.status(),
        StatusCode::BAD_REQUEST
    );

    let malformed = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/register")
                .raw_body("application/json", "{not json")
                .build(),
        )
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_look_the_same() {
    let app = TestApp::new();
    app.seed_user("bobby", Role::Player).await;

    let (wrong, _) = app.login("bobby", "not-the-password").await;
    let (unknown, _) = app.login("nobody", PASSWORD).await;
    assert_eq!(wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn disabled_account_cannot_log_in() {
    let app = TestApp::new();
    let user = app.seed_user("bobby", Role::Player).await;
    app.state
        .users
        .update(
            &user.id,
            chessearn_core::models::auth::UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let (status, _) = app.login("bobby", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_requires_matching_csrf_header() {
    let app = TestApp::new();
    let (_, session) = app.signed_in("bobby", Role::Player).await;

    let missing = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/logout")
                .session(&session)
                .build(),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/logout")
                .session(&session)
                .csrf("forged-value")
                .build(),
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(app.ledger.is_empty());
}

#[tokio::test]
async fn refresh_issues_access_for_same_subject() {
    let app = TestApp::new();
    let (user, session) = app.signed_in("bobby", Role::Player).await;
    let old_access = session.get(ACCESS_COOKIE).unwrap().to_string();

    let response = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/refresh")
                .session(&session)
                .csrf(&session.csrf_refresh())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut refreshed = session.clone();
    refreshed.absorb(&response);
    assert_ne!(refreshed.get(ACCESS_COOKIE).unwrap(), old_access);
    assert_eq!(
        refreshed.get(REFRESH_COOKIE),
        session.get(REFRESH_COOKIE),
        "refresh token is not rotated"
    );

    let profile = app
        .send(
            RequestBuilder::new(Method::GET, "/profile")
                .session(&refreshed)
                .build(),
        )
        .await;
    assert_eq!(profile.status(), StatusCode::OK);
    assert_eq!(body_json(profile).await["id"], user.id);
}

#[tokio::test]
async fn refresh_with_access_csrf_is_rejected() {
    let app = TestApp::new();
    let (_, session) = app.signed_in("bobby", Role::Player).await;
    let response = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/refresh")
                .session(&session)
                .csrf(&session.csrf_access())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_after_logout_is_rejected() {
    let app = TestApp::new();
    let (_, session) = app.signed_in("bobby", Role::Player).await;

    let logout = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/logout")
                .session(&session)
                .csrf(&session.csrf_access())
                .build(),
        )
        .await;
    assert_eq!(logout.status(), StatusCode::OK);

    let response = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/refresh")
                .session(&session)
                .csrf(&session.csrf_refresh())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_refresh_is_rejected() {
    let app = TestApp::configured(|config| config.refresh_token_ttl_secs = -60);
    let (_, session) = app.signed_in("bobby", Role::Player).await;

    let response = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/refresh")
                .session(&session)
                .csrf(&session.csrf_refresh())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_for_deleted_user_is_not_found() {
    let app = TestApp::new();
    let (user, session) = app.signed_in("bobby", Role::Player).await;
    assert!(app.state.users.delete(&user.id).await.unwrap());

    let response = app
        .send(
            RequestBuilder::new(Method::POST, "/auth/refresh")
                .session(&session)
                .csrf(&session.csrf_refresh())
                .build(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_is_rate_limited_per_client() {
    let app = TestApp::new();
    app.seed_user("bobby", Role::Player).await;
    let attempt = |peer: &str| {
        RequestBuilder::new(Method::POST, "/auth/login")
            .json(json!({ "identifier": "bobby", "password": "wrong-password" }))
            .peer(peer)
            .build()
    };

    for _ in 0..10 {
        let response = app.send(attempt("10.0.0.7:40000")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let limited = app.send(attempt("10.0.0.7:40001")).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(limited).await["error"], "rate_limited");

    let other = app.send(attempt("10.0.0.8:40000")).await;
    assert_eq!(other.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_tracks_session_lifecycle() {
    let app = TestApp::new();
    let status = |session: &Session| {
        RequestBuilder::new(Method::GET, "/auth/status")
            .session(session)
            .build()
    };

    let anonymous = body_json(app.send(status(&Session::default())).await).await;
    assert_eq!(anonymous["state"], "anonymous");
    assert!(anonymous["user_id"].is_null());

    let (user, session) = app.signed_in("bobby", Role::Player).await;
    let authenticated = body_json(app.send(status(&session)).await).await;
    assert_eq!(authenticated["state"], "authenticated");
    assert_eq!(authenticated["user_id"], user.id);
    assert_eq!(authenticated["role"], "player");

    let mut refresh_only = session.clone();
    refresh_only.cookies.remove(ACCESS_COOKIE);
    let expired = body_json(app.send(status(&refresh_only)).await).await;
    assert_eq!(expired["state"], "access_expired");

    app.send(
        RequestBuilder::new(Method::POST, "/auth/logout")
            .session(&session)
            .csrf(&session.csrf_access())
            .build(),
    )
    .await;
    let revoked = body_json(app.send(status(&session)).await).await;
    assert_eq!(revoked["state"], "revoked");
}

/// In-memory ledger that accepts a limited number of writes, then fails.
struct FlakyLedger {
    inner: MemoryRevocationLedger,
    writes_left: AtomicUsize,
}

impl FlakyLedger {
    fn allowing(writes: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryRevocationLedger::new(),
            writes_left: AtomicUsize::new(writes),
        })
    }

    fn allow(&self, writes: usize) {
        self.writes_left.store(writes, Ordering::SeqCst);
    }
}

#[async_trait]
impl RevocationLedger for FlakyLedger {
    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        self.inner.is_revoked(jti).await
    }

    async fn revoke_many_at(
        &self,
        jtis: &[&str],
        revoked_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let granted = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !granted {
            return Err(AuthError::Internal("ledger unavailable".into()));
        }
        self.inner.revoke_many_at(jtis, revoked_at).await
    }

    async fn prune_older_than(&self, age: chrono::Duration) -> Result<u64, AuthError> {
        self.inner.prune_older_than(age).await
    }
}

fn logout(session: &Session) -> RequestBuilder {
    RequestBuilder::new(Method::POST, "/auth/logout")
        .session(session)
        .csrf(&session.csrf_access())
}

fn refresh(session: &Session) -> RequestBuilder {
    RequestBuilder::new(Method::POST, "/auth/refresh")
        .session(session)
        .csrf(&session.csrf_refresh())
}

#[tokio::test]
async fn logout_fails_closed_when_ledger_is_down() {
    let ledger = FlakyLedger::allowing(0);
    let app = TestApp::with_ledger(ledger.clone());
    let (_, session) = app.signed_in("bobby", Role::Player).await;

    let response = app.send(logout(&session).build()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body = body_json(response).await;
    assert_eq!(body["message"], "Internal server error");
    assert!(ledger.inner.is_empty());
}

#[tokio::test]
async fn failed_logout_can_be_retried() {
    let ledger = FlakyLedger::allowing(0);
    let app = TestApp::with_ledger(ledger.clone());
    let (_, session) = app.signed_in("bobby", Role::Player).await;

    let failed = app.send(logout(&session).build()).await;
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Nothing was revoked, so the session still works.
    let profile = app
        .send(
            RequestBuilder::new(Method::GET, "/profile")
                .session(&session)
                .build(),
        )
        .await;
    assert_eq!(profile.status(), StatusCode::OK);

    ledger.allow(1);
    let retried = app.send(logout(&session).build()).await;
    assert_eq!(retried.status(), StatusCode::OK);

    let response = app.send(refresh(&session).build()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_both_tokens_in_one_write() {
    let ledger = FlakyLedger::allowing(1);
    let app = TestApp::with_ledger(ledger.clone());
    let (_, session) = app.signed_in("bobby", Role::Player).await;

    let response = app.send(logout(&session).build()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ledger.inner.len(), 2);

    let response = app.send(refresh(&session).build()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn index_reports_version() {
    let app = TestApp::new();
    let response = app
        .send(RequestBuilder::new(Method::GET, "/").build())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["version"], chessearn_core::version());
}
