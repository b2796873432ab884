//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `chessearn_api::models`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform role. The serialized form is the canonical value used for every
/// authorization comparison; display labels come from [`Role::label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Player,
    Developer,
}

/// Returned when a string names no known role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl Role {
    /// Every role, in display order.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Player, Role::Developer];

    /// Canonical value stored in the database and embedded in tokens.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Player => "player",
            Role::Developer => "developer",
        }
    }

    /// Human-readable label for UIs. Never used for authorization.
    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Player => "Player",
            Role::Developer => "Developer",
        }
    }

    /// Case-insensitive match against a canonical role value.
    pub fn matches(self, value: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(value.trim())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.matches(s))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

/// Domain user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub phone_number: String,
    pub role: Role,
    pub wallet_balance: f64,
    pub ranking: i32,
    pub is_active: bool,
    pub is_verified: bool,
    pub photo_filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

/// Fields required to create a user. Identity fields must already be
/// normalized (see [`crate::auth::validation`]).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub phone_number: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update applied by admins. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

impl UserChanges {
    /// True when the update would not touch any column.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.username.is_none()
            && self.phone_number.is_none()
            && self.role.is_none()
            && self.password_hash.is_none()
            && self.is_active.is_none()
            && self.is_verified.is_none()
    }

    /// Apply the changes to an in-memory user.
    pub fn apply(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.email {
            user.email = v.clone();
        }
        if let Some(v) = &self.username {
            user.username = v.clone();
        }
        if let Some(v) = &self.phone_number {
            user.phone_number = v.clone();
        }
        if let Some(v) = self.role {
            user.role = v;
        }
        if let Some(v) = self.is_active {
            user.is_active = v;
        }
        if let Some(v) = self.is_verified {
            user.is_verified = v;
        }
    }
}

/// Which credential a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: String,
    /// Role at issuance time.
    pub role: Role,
    /// Unique token identifier, the revocation key.
    pub jti: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Double-submit value the client must echo in `X-CSRF-TOKEN`.
    pub csrf: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// A freshly signed token plus the values the transport layer needs.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub jti: String,
    pub csrf: String,
    pub expires_at: DateTime<Utc>,
}
