//! Application router: API routes, gated pages and the tower stack.

use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::access::{access_router, AccessAppState};
use super::billing::{billing_router, BillingAppState};
use super::middleware::{access_gate, auth_middleware, AuthState, GateState};

/// Everything the router needs, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub billing: BillingAppState,
    pub access: AccessAppState,
    pub auth: AuthState,
    pub gate: GateState,
}

/// Outer HTTP settings.
#[derive(Debug, Clone, Default)]
pub struct RouterSettings {
    pub request_timeout: Option<Duration>,
    pub cors_origins: Vec<String>,
}

/// Builds the application.
///
/// `pages` holds whatever the deployment serves under the protected prefix;
/// it is merged in front of the gate so every page load is checked. An empty
/// router is fine: the gate then acts as a pure redirect check.
pub fn app_router(state: AppState, pages: Router, settings: &RouterSettings) -> Router {
    let app = Router::new()
        .route("/health", get(health))
        .merge(billing_router().with_state(state.billing))
        .merge(access_router().with_state(state.access))
        .merge(pages)
        // Gate runs after auth has injected the user
        .layer(middleware::from_fn_with_state(state.gate, access_gate))
        .layer(middleware::from_fn_with_state(state.auth, auth_middleware));

    let app = match settings.request_timeout {
        Some(timeout) => app.layer(TimeoutLayer::new(timeout)),
        None => app,
    };

    let app = if settings.cors_origins.is_empty() {
        app
    } else {
        app.layer(cors_layer(&settings.cors_origins))
    };

    app.layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_credentials(true)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
