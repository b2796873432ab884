//! Root endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: &'static str,
}

/// `GET /`: liveness and version.
pub async fn index_handler() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Welcome to the ChessEarn API",
        version: chessearn_core::version(),
    })
}
