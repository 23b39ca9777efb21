//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the subscription command handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use secrecy::SecretString;

use crate::application::handlers::subscription::{
    CheckoutCustomer, CreateCheckoutCommand, CreateCheckoutHandler, HandleBillingWebhookCommand,
    HandleBillingWebhookHandler, SyncSubscriptionCommand, SyncSubscriptionHandler,
};
use crate::domain::foundation::UserId;
use crate::domain::subscription::{PlanType, SubscriptionError};

use super::super::error::{SubscriptionApiError, WebhookApiError};
use super::super::middleware::OptionalAuth;
use super::dto::{
    CheckoutRequest, CheckoutResponse, SubscriptionSummaryResponse, SyncRequest,
    WebhookAckResponse,
};

/// Header carrying Stripe's `t=..,v1=..` signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the billing endpoints.
#[derive(Clone)]
pub struct BillingAppState {
    pub webhook_handler: Arc<HandleBillingWebhookHandler>,
    pub sync_handler: Arc<SyncSubscriptionHandler>,
    pub checkout_handler: Arc<CreateCheckoutHandler>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Handle Stripe webhook events
///
/// The body is taken as raw bytes: the signature covers the exact payload.
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let result = state.webhook_handler.handle(cmd).await?;
    Ok(Json(WebhookAckResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription Commands
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscription/sync - Pull the caller's subscription from Stripe
///
/// An explicit `user_id` in the body is used when present (the
/// payment-success page may run before the session cookie is set).
pub async fn sync_subscription(
    State(state): State<BillingAppState>,
    OptionalAuth(user): OptionalAuth,
    body: Option<Json<SyncRequest>>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let requested = body.and_then(|Json(request)| request.user_id);

    let user_id = match (requested, user) {
        (Some(raw), _) => UserId::new(raw)
            .map_err(|e| SubscriptionError::validation("user_id", e.to_string()))?,
        (None, Some(user)) => user.id,
        (None, None) => return Err(SubscriptionError::Unauthorized.into()),
    };

    let result = state
        .sync_handler
        .handle(SyncSubscriptionCommand { user_id })
        .await?;

    Ok(Json(SubscriptionSummaryResponse::from(result)))
}

/// POST /api/subscription/checkout - Open a Stripe Checkout session
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let plan_type = PlanType::parse(&request.plan_type).ok_or_else(|| {
        SubscriptionError::validation("plan_type", "must be 'trial' or 'direct'")
    })?;

    let customer = match user {
        Some(user) => CheckoutCustomer::Existing {
            user_id: user.id,
            email: user.email,
        },
        None => CheckoutCustomer::New {
            email: required(request.email, "email")?,
            password: SecretString::new(required(request.password, "password")?),
            phone_verification_id: required(
                request.phone_verification_id,
                "phone_verification_id",
            )?,
        },
    };

    let result = state
        .checkout_handler
        .handle(CreateCheckoutCommand {
            customer,
            plan_type,
            is_upgrade: request.is_upgrade,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, SubscriptionError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SubscriptionError::validation(field, "is required to register"))
}
