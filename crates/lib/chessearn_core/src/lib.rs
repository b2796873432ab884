//! # chessearn_core
//!
//! Core domain logic for ChessEarn: user records, credentials, signed session
//! tokens and the revocation ledger.

pub mod auth;
pub mod migrate;
pub mod models;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
