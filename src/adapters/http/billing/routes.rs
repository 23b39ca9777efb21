//! Axum router configuration for billing endpoints.

use axum::{routing::post, Router};

use super::handlers::{create_checkout, handle_stripe_webhook, sync_subscription, BillingAppState};

/// Create the billing API router.
///
/// # Routes
///
/// ## User Endpoints (session optional, see handlers)
/// - `POST /api/subscription/sync` - Pull-sync a subscription
/// - `POST /api/subscription/checkout` - Open a checkout session
///
/// ## Webhook Endpoints (no auth, signature verified)
/// - `POST /api/webhooks/stripe` - Handle Stripe webhooks
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .route("/api/subscription/sync", post(sync_subscription))
        .route("/api/subscription/checkout", post(create_checkout))
        .route("/api/webhooks/stripe", post(handle_stripe_webhook))
}
