//! HTTP handlers for access endpoints.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::handlers::access::{
    CheckAccessHandler, CheckAccessQuery, CheckUsageHandler, CheckUsageQuery,
};
use crate::domain::access::UsageOutcome;
use crate::domain::subscription::{AgentType, SubscriptionError};

use super::super::error::SubscriptionApiError;
use super::super::middleware::{OptionalAuth, RequireAuth};
use super::dto::UsageResponse;

/// Shared state for the access endpoints.
#[derive(Clone)]
pub struct AccessAppState {
    pub access_handler: Arc<CheckAccessHandler>,
    pub usage_handler: Arc<CheckUsageHandler>,
}

/// GET /api/subscription/access - Gate decision for the caller
///
/// Always 200: the decision itself says whether access is allowed.
pub async fn get_access(
    State(state): State<AccessAppState>,
    OptionalAuth(user): OptionalAuth,
) -> impl IntoResponse {
    let decision = state
        .access_handler
        .handle(CheckAccessQuery {
            user_id: user.map(|u| u.id),
        })
        .await;
    Json(decision)
}

/// POST /api/agents/:agent/usage - Meter one agent call
///
/// 200 with the remaining quota when allowed, 403 with the denial code
/// otherwise.
pub async fn check_usage(
    State(state): State<AccessAppState>,
    RequireAuth(user): RequireAuth,
    Path(agent): Path<String>,
) -> Result<Response, SubscriptionApiError> {
    let agent = agent
        .parse::<AgentType>()
        .map_err(|e| SubscriptionError::validation("agent", e.to_string()))?;

    let outcome = state
        .usage_handler
        .handle(CheckUsageQuery {
            user_id: user.id,
            agent,
        })
        .await?;

    let status = match outcome {
        UsageOutcome::Allowed { .. } => StatusCode::OK,
        UsageOutcome::Denied { .. } => StatusCode::FORBIDDEN,
    };
    Ok((status, Json(UsageResponse::from(outcome))).into_response())
}
