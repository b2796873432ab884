//! Request middleware: cookie authentication, role guard and login throttling.

pub mod auth;
pub mod guard;
pub mod rate_limit;
