//! Page access gate.
//!
//! Runs after `auth_middleware` on every request. Paths under the protected
//! prefix (minus the exclusions) are evaluated with `CheckAccessHandler`;
//! denials become `307` redirects to the login or plan-selection page.
//! Allowed requests carry the `AccessDecision` in their extensions so pages
//! can read the secondary trial window.
//!
//! Evaluation never lets a failure through: a panic while evaluating is
//! caught and treated like any other error, as a denial.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use futures::FutureExt;

use crate::application::handlers::access::{CheckAccessHandler, CheckAccessQuery};
use crate::domain::access::{AccessDecision, RedirectTarget};
use crate::domain::foundation::AuthenticatedUser;

/// Which paths are gated and where denials go.
#[derive(Debug, Clone)]
pub struct GatePaths {
    pub protected_prefix: String,
    pub exclusions: Vec<String>,
    pub login_path: String,
    pub plan_selection_path: String,
}

impl GatePaths {
    /// Whether `path` is under the prefix and not under an exclusion.
    pub fn is_protected(&self, path: &str) -> bool {
        is_under(path, &self.protected_prefix)
            && !self.exclusions.iter().any(|excluded| is_under(path, excluded))
    }

    pub fn redirect_for(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Login => &self.login_path,
            RedirectTarget::PlanSelection => &self.plan_selection_path,
        }
    }
}

/// Segment-aware prefix match: `/dashboard` covers `/dashboard/x` but not `/dashboards`.
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Gate middleware state.
#[derive(Clone)]
pub struct GateState {
    pub handler: Arc<CheckAccessHandler>,
    pub paths: Arc<GatePaths>,
}

pub async fn access_gate(
    State(state): State<GateState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.paths.is_protected(&path) {
        return next.run(request).await;
    }

    let user_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.id.clone());

    let decision = AssertUnwindSafe(state.handler.handle(CheckAccessQuery { user_id }))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            tracing::error!(path = %path, "Access evaluation panicked; denying");
            AccessDecision::fail_closed()
        });

    if !decision.allowed {
        let target = decision.redirect.unwrap_or(RedirectTarget::PlanSelection);
        tracing::debug!(path = %path, reason = ?decision.reason, "Access denied");
        return Redirect::temporary(state.paths.redirect_for(target)).into_response();
    }

    request.extensions_mut().insert(decision);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> GatePaths {
        GatePaths {
            protected_prefix: "/dashboard".into(),
            exclusions: vec!["/dashboard/payment-success".into(), "/dashboard/register".into()],
            login_path: "/login".into(),
            plan_selection_path: "/pricing".into(),
        }
    }

    #[test]
    fn prefix_and_children_are_protected() {
        let paths = paths();
        assert!(paths.is_protected("/dashboard"));
        assert!(paths.is_protected("/dashboard/"));
        assert!(paths.is_protected("/dashboard/agents/chat"));
    }

    #[test]
    fn lookalike_and_outside_paths_are_not_protected() {
        let paths = paths();
        assert!(!paths.is_protected("/dashboards"));
        assert!(!paths.is_protected("/pricing"));
        assert!(!paths.is_protected("/api/subscription/access"));
    }

    #[test]
    fn exclusions_and_their_children_are_open() {
        let paths = paths();
        assert!(!paths.is_protected("/dashboard/payment-success"));
        assert!(!paths.is_protected("/dashboard/payment-success/confirm"));
        assert!(!paths.is_protected("/dashboard/register"));
        assert!(paths.is_protected("/dashboard/registered-agents"));
    }

    #[test]
    fn redirect_targets_map_to_paths() {
        let paths = paths();
        assert_eq!(paths.redirect_for(RedirectTarget::Login), "/login");
        assert_eq!(paths.redirect_for(RedirectTarget::PlanSelection), "/pricing");
    }
}
