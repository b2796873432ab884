//! Session lifecycle: registration, login, refresh, logout and request
//! authentication.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Method};
use axum_extra::extract::cookie::CookieJar;
use chessearn_core::auth::jwt::TokenIssuer;
use chessearn_core::auth::password::PasswordHasher;
use chessearn_core::auth::revocation::RevocationLedger;
use chessearn_core::auth::store::CredentialStore;
use chessearn_core::auth::validation::validate_password;
use chessearn_core::auth::TokenError;
use chessearn_core::models::auth::{IssuedToken, NewUser, Role, TokenClaims, TokenKind, User};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use super::cookies::{CSRF_HEADER, cookie_names};
use super::{Identity, required};
use crate::error::{AppError, AppResult};
use crate::models::{LoginRequest, RegisterRequest};

const REVOKE_ATTEMPTS: u32 = 3;
const REVOKE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Tokens minted by a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Where a client stands, judged from its cookies alone.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticated(TokenClaims),
    /// Access token gone or expired; a usable refresh token remains.
    AccessExpired(TokenClaims),
    /// The presented token is blacklisted or the refresh token has expired.
    Revoked,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::AccessExpired(_) => "access_expired",
            SessionState::Revoked => "revoked",
        }
    }

    pub fn claims(&self) -> Option<&TokenClaims> {
        match self {
            SessionState::Authenticated(c) | SessionState::AccessExpired(c) => Some(c),
            _ => None,
        }
    }
}

/// Owns the credential store, revocation ledger, token issuer and password
/// hasher, and drives every session transition through them.
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn CredentialStore>,
    ledger: Arc<dyn RevocationLedger>,
    tokens: Arc<TokenIssuer>,
    hasher: Arc<PasswordHasher>,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        ledger: Arc<dyn RevocationLedger>,
        tokens: Arc<TokenIssuer>,
        hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            users,
            ledger,
            tokens,
            hasher,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn hasher(&self) -> Arc<PasswordHasher> {
        Arc::clone(&self.hasher)
    }

    /// Create a player account. Self-registration never grants another role.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<User> {
        let identity = Identity::parse(
            req.first_name,
            req.last_name,
            req.email,
            req.username,
            req.phone_number,
        )?;
        let password = required(req.password, "password")?;
        validate_password(&password)?;

        let password_hash = self.hasher().hash_async(password).await?;
        let user = self
            .users
            .create(NewUser {
                first_name: identity.first_name,
                last_name: identity.last_name,
                email: identity.email,
                username: identity.username,
                phone_number: identity.phone_number,
                password_hash,
                role: Role::Player,
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Check credentials and mint an access/refresh pair.
    ///
    /// Unknown identifiers, wrong passwords and disabled accounts all yield
    /// the same `InvalidCredentials`.
    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginOutcome> {
        let identifier = required(req.identifier, "identifier")?;
        let password = required(req.password, "password")?;

        let Some(record) = self.users.find_by_identifier(&identifier).await? else {
            self.hasher().verify_dummy_async(password).await;
            warn!("login failed: no matching account");
            return Err(AppError::InvalidCredentials);
        };

        let matches = self
            .hasher()
            .verify_async(password, record.password_hash)
            .await?;
        let user = record.user;
        if !matches {
            warn!(user_id = %user.id, "login failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_active {
            warn!(user_id = %user.id, "login failed: account disabled");
            return Err(AppError::InvalidCredentials);
        }

        let access = self.tokens.issue_access(&user.id, user.role)?;
        let refresh = self.tokens.issue_refresh(&user.id, user.role)?;
        info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginOutcome {
            user,
            access,
            refresh,
        })
    }

    /// Mint a new access token for the holder of a verified refresh token.
    /// The role is re-read so demotions take effect on the next refresh.
    pub async fn refresh(&self, claims: &TokenClaims) -> AppResult<(User, IssuedToken)> {
        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        if !user.is_active {
            return Err(AppError::Unauthorized("Account is disabled".into()));
        }
        let access = self.tokens.issue_access(&user.id, user.role)?;
        debug!(user_id = %user.id, "access token refreshed");
        Ok((user, access))
    }

    /// Blacklist the access token and, when it belongs to the same user,
    /// the refresh token too. Both jtis land in one ledger write, so a
    /// failure leaves the session intact for a retry.
    pub async fn logout(&self, access: &TokenClaims, refresh_token: Option<&str>) -> AppResult<()> {
        let refresh = refresh_token.and_then(|token| {
            match self.tokens.decode_kind(token, TokenKind::Refresh) {
                Ok(refresh) if refresh.sub == access.sub => Some(refresh),
                Ok(_) => {
                    warn!(user_id = %access.sub, "refresh cookie belongs to another user");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "refresh cookie not revoked");
                    None
                }
            }
        });
        let mut jtis = vec![access.jti.as_str()];
        if let Some(refresh) = &refresh {
            jtis.push(refresh.jti.as_str());
        }

        self.revoke_with_retry(&jtis).await?;
        info!(user_id = %access.sub, revoked = jtis.len(), "user logged out");
        Ok(())
    }

    async fn revoke_with_retry(&self, jtis: &[&str]) -> AppResult<()> {
        let mut attempt = 1;
        loop {
            match self.ledger.revoke_many(jtis).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < REVOKE_ATTEMPTS => {
                    warn!(?jtis, attempt, error = %e, "revocation write failed, retrying");
                    tokio::time::sleep(REVOKE_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AppError::Internal(format!(
                        "revoking {jtis:?} failed after {attempt} attempts: {e}"
                    )));
                }
            }
        }
    }

    /// Verify the cookie-borne token of `kind` on an incoming request.
    ///
    /// Checks run in order: presence, signature and expiry, token kind, the
    /// CSRF echo for state-changing methods, then the revocation ledger.
    pub async fn authenticate(
        &self,
        method: &Method,
        headers: &HeaderMap,
        jar: &CookieJar,
        kind: TokenKind,
    ) -> AppResult<TokenClaims> {
        let (token_cookie, csrf_cookie) = cookie_names(kind);
        let token = jar
            .get(token_cookie)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("Missing {} token", kind.as_str())))?;

        let claims = self
            .tokens
            .decode_kind(&token, kind)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        if is_state_changing(method) {
            let header = headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::Unauthorized("Missing CSRF token".into()))?;
            let cookie = jar.get(csrf_cookie).map(|c| c.value()).unwrap_or_default();
            let matches_cookie: bool = header.as_bytes().ct_eq(cookie.as_bytes()).into();
            let matches_claim: bool = header.as_bytes().ct_eq(claims.csrf.as_bytes()).into();
            if !(matches_cookie && matches_claim) {
                return Err(AppError::Unauthorized("CSRF token mismatch".into()));
            }
        }

        if self.ledger.is_revoked(&claims.jti).await? {
            return Err(AppError::Unauthorized("Token has been revoked".into()));
        }

        Ok(claims)
    }

    /// Classify a client's session from its cookies without failing.
    pub async fn session_state(&self, jar: &CookieJar) -> AppResult<SessionState> {
        let cookie = |name: &str| {
            jar.get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        };
        let (access_cookie, _) = cookie_names(TokenKind::Access);
        let (refresh_cookie, _) = cookie_names(TokenKind::Refresh);

        if let Some(token) = cookie(access_cookie) {
            if let Ok(claims) = self.tokens.decode_kind(&token, TokenKind::Access) {
                if self.ledger.is_revoked(&claims.jti).await? {
                    return Ok(SessionState::Revoked);
                }
                return Ok(SessionState::Authenticated(claims));
            }
        }

        let Some(token) = cookie(refresh_cookie) else {
            return Ok(SessionState::Anonymous);
        };
        match self.tokens.decode_kind(&token, TokenKind::Refresh) {
            Ok(claims) => {
                if self.ledger.is_revoked(&claims.jti).await? {
                    Ok(SessionState::Revoked)
                } else {
                    Ok(SessionState::AccessExpired(claims))
                }
            }
            Err(TokenError::Expired) => Ok(SessionState::Revoked),
            Err(_) => Ok(SessionState::Anonymous),
        }
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
