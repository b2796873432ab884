//! HTTP request handlers.

pub mod admin_users;
pub mod auth;
pub mod index;
pub mod profile;
