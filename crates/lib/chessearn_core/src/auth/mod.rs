//! Authentication and authorization logic.
//!
//! Provides password hashing, JWT issuance, input validation, and the two
//! persistence seams the session layer depends on: the credential store and
//! the revocation ledger.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod revocation;
pub mod store;
pub mod validation;

use thiserror::Error;

/// Why a token failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("wrong token type")]
    WrongKind,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
