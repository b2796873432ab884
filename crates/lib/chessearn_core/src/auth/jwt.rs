//! JWT token issuance and verification.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AuthError, TokenError};
use crate::models::auth::{IssuedToken, Role, TokenClaims, TokenKind};

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Signs and verifies HS256 session tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issuer with the default 15 minute / 30 day lifetimes.
    pub fn with_default_ttls(secret: &[u8]) -> Self {
        Self::new(
            secret,
            Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        )
    }

    /// Issue a short-lived access token.
    pub fn issue_access(&self, user_id: &str, role: Role) -> Result<IssuedToken, AuthError> {
        self.issue(TokenKind::Access, user_id, role)
    }

    /// Issue a long-lived refresh token.
    pub fn issue_refresh(&self, user_id: &str, role: Role) -> Result<IssuedToken, AuthError> {
        self.issue(TokenKind::Refresh, user_id, role)
    }

    fn issue(&self, kind: TokenKind, user_id: &str, role: Role) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expires_at = now + ttl;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            jti: Uuid::new_v4().to_string(),
            kind,
            csrf: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))?;
        Ok(IssuedToken {
            value,
            jti: claims.jti,
            csrf: claims.csrf,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the claims on success.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed,
            })
    }

    /// Like [`decode`](Self::decode), but also require a specific token kind.
    pub fn decode_kind(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let claims = self.decode(token)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }
}

const SECRET_ENV_VARS: [&str; 2] = ["JWT_SECRET_KEY", "JWT_SECRET"];
const GENERATED_SECRET_CHARS: usize = 64;

/// The signing secret from `JWT_SECRET_KEY` or `JWT_SECRET`, falling back to
/// a secret persisted under the user data directory.
pub fn resolve_jwt_secret() -> String {
    SECRET_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|secret| !secret.is_empty())
        .unwrap_or_else(|| load_or_create_secret(&jwt_secret_path()))
}

/// Read the secret stored at `path`, or generate one and try to store it.
///
/// A secret that cannot be persisted is still returned, but every restart
/// (and every replica) will then sign with a different key.
fn load_or_create_secret(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(existing) if !existing.trim().is_empty() => return existing.trim().to_string(),
        Ok(_) => debug!(path = %path.display(), "stored JWT secret is empty"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot read stored JWT secret"),
    }

    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_CHARS)
        .map(char::from)
        .collect();
    match persist_secret(path, &secret) {
        Ok(()) => info!(path = %path.display(), "generated and stored a new JWT secret"),
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "generated a JWT secret but could not store it; sessions will not survive a restart"
        ),
    }
    secret
}

fn persist_secret(path: &Path, secret: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, secret)
}

fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chessearn")
        .join("jwt-secret")
}
