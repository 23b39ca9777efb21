//! Axum router configuration for access endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{check_usage, get_access, AccessAppState};

/// Create the access API router.
///
/// # Routes
/// - `GET /api/subscription/access` - Gate decision (session optional)
/// - `POST /api/agents/:agent/usage` - Usage metering (session required)
pub fn access_router() -> Router<AccessAppState> {
    Router::new()
        .route("/api/subscription/access", get(get_access))
        .route("/api/agents/:agent/usage", post(check_usage))
}
