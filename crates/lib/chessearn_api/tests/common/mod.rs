//! Shared harness: router over in-memory stores, driven with `oneshot`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, Response, StatusCode};
use chessearn_api::config::ApiConfig;
use chessearn_api::services::cookies::{CSRF_ACCESS_COOKIE, CSRF_HEADER, CSRF_REFRESH_COOKIE};
use chessearn_api::{AppState, router};
use chessearn_core::auth::memory::{MemoryCredentialStore, MemoryRevocationLedger};
use chessearn_core::auth::revocation::RevocationLedger;
use chessearn_core::auth::store::CredentialStore;
use chessearn_core::models::auth::{NewUser, Role, User};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "longenough1";

pub struct TestApp {
    pub state: AppState,
    pub ledger: Arc<MemoryRevocationLedger>,
    _uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None, |_| {})
    }

    /// Use `ledger` in place of the in-memory one.
    pub fn with_ledger(ledger: Arc<dyn RevocationLedger>) -> Self {
        Self::build(Some(ledger), |_| {})
    }

    /// Adjust the test configuration before the state is wired.
    pub fn configured(configure: impl FnOnce(&mut ApiConfig)) -> Self {
        Self::build(None, configure)
    }

    fn build(
        ledger: Option<Arc<dyn RevocationLedger>>,
        configure: impl FnOnce(&mut ApiConfig),
    ) -> Self {
        let uploads = tempfile::tempdir().expect("tempdir");
        let mut config = ApiConfig::development("test-secret");
        config.bcrypt_cost = 4;
        config.upload_dir = uploads.path().to_path_buf();
        config.public_base_url = "http://api.test".into();
        configure(&mut config);

        let memory_ledger = Arc::new(MemoryRevocationLedger::new());
        let ledger =
            ledger.unwrap_or_else(|| memory_ledger.clone() as Arc<dyn RevocationLedger>);
        let state = AppState::new(config, Arc::new(MemoryCredentialStore::new()), ledger);
        Self {
            state,
            ledger: memory_ledger,
            _uploads: uploads,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.expect("request")
    }

    /// Insert a user directly through the store.
    pub async fn seed_user(&self, username: &str, role: Role) -> User {
        let hash = self.state.sessions.hasher().hash(PASSWORD).expect("hash");
        let phone_suffix: u32 = username.bytes().map(u32::from).sum();
        self.state
            .users
            .create(NewUser {
                first_name: "Test".into(),
                last_name: "Player".into(),
                email: format!("{username}@example.com"),
                username: username.into(),
                phone_number: format!("+2547{phone_suffix:08}"),
                password_hash: hash,
                role,
            })
            .await
            .expect("seed user")
    }

    pub async fn login(&self, identifier: &str, password: &str) -> (StatusCode, Session) {
        let response = self
            .send(
                RequestBuilder::new(Method::POST, "/auth/login")
                    .json(json!({ "identifier": identifier, "password": password }))
                    .build(),
            )
            .await;
        let mut session = Session::default();
        session.absorb(&response);
        (response.status(), session)
    }

    /// Seed a user and log them in.
    pub async fn signed_in(&self, username: &str, role: Role) -> (User, Session) {
        let user = self.seed_user(username, role).await;
        let (status, session) = self.login(username, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed for {username}");
        (user, session)
    }
}

/// Cookie jar kept across requests, updated from `Set-Cookie`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub cookies: HashMap<String, String>,
}

impl Session {
    pub fn absorb(&mut self, response: &Response<Body>) {
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                if value.is_empty() {
                    self.cookies.remove(name.trim());
                } else {
                    self.cookies
                        .insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn csrf_access(&self) -> String {
        self.get(CSRF_ACCESS_COOKIE).unwrap_or_default().to_string()
    }

    pub fn csrf_refresh(&self) -> String {
        self.get(CSRF_REFRESH_COOKIE).unwrap_or_default().to_string()
    }
}

pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Body,
    peer: Option<SocketAddr>,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Body::empty(),
            peer: None,
        }
    }

    pub fn json(mut self, value: Value) -> Self {
        self.headers
            .push((CONTENT_TYPE.to_string(), "application/json".into()));
        self.body = Body::from(value.to_string());
        self
    }

    pub fn raw_body(mut self, content_type: &str, body: impl Into<Body>) -> Self {
        self.headers
            .push((CONTENT_TYPE.to_string(), content_type.to_string()));
        self.body = body.into();
        self
    }

    pub fn session(mut self, session: &Session) -> Self {
        if !session.cookies.is_empty() {
            self.headers.push((COOKIE.to_string(), session.header()));
        }
        self
    }

    pub fn csrf(mut self, value: &str) -> Self {
        self.headers.push((CSRF_HEADER.to_string(), value.to_string()));
        self
    }

    pub fn peer(mut self, addr: &str) -> Self {
        self.peer = Some(addr.parse().expect("socket addr"));
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        let mut request = builder.body(self.body).expect("request");
        if let Some(addr) = self.peer {
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
