//! Mock billing provider for testing.
//!
//! Provides a configurable implementation of `BillingProvider` for unit and
//! integration tests. Supports:
//! - A customer and subscription "database" the tests can rewrite mid-run
//! - Error injection, per call or per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{BillingSubscription, SubscriptionMetadata};
use crate::ports::{
    BillingError, BillingProvider, CheckoutSession, CheckoutSessionRequest,
};

/// Mock billing provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingProvider::new();
/// mock.add_customer("cus_1", "a@b.fr");
/// mock.put_subscription(trialing_subscription("sub_1", "cus_1"));
///
/// // Provider outage for the reconciler
/// mock.set_method_error("list_subscriptions", BillingError::network("timeout"));
/// ```
#[derive(Default)]
pub struct MockBillingProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Customers in creation order.
    customers: Vec<MockCustomer>,

    /// Subscriptions by ID.
    subscriptions: HashMap<String, BillingSubscription>,

    /// Checkout requests received, in order.
    checkout_requests: Vec<CheckoutSessionRequest>,

    /// Error to return on next call.
    next_error: Option<BillingError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, BillingError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,
}

#[derive(Debug, Clone)]
struct MockCustomer {
    id: String,
    email: String,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a customer to the "database".
    pub fn add_customer(&self, id: &str, email: &str) {
        self.state().customers.push(MockCustomer {
            id: id.to_string(),
            email: email.to_string(),
        });
    }

    /// Insert or replace a subscription.
    pub fn put_subscription(&self, subscription: BillingSubscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn remove_subscription(&self, id: &str) {
        self.state().subscriptions.remove(id);
    }

    pub fn subscription(&self, id: &str) -> Option<BillingSubscription> {
        self.state().subscriptions.get(id).cloned()
    }

    /// Checkout requests received so far.
    pub fn checkout_requests(&self) -> Vec<CheckoutSessionRequest> {
        self.state().checkout_requests.clone()
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: BillingError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method until cleared.
    pub fn set_method_error(&self, method: &str, error: BillingError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), BillingError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

impl Clone for MockBillingProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn create_customer(
        &self,
        email: &str,
        user_id: Option<&UserId>,
    ) -> Result<String, BillingError> {
        self.record_call(
            "create_customer",
            vec![
                email.to_string(),
                user_id.map(|u| u.to_string()).unwrap_or_default(),
            ],
        );
        self.check_error("create_customer")?;

        let mut state = self.state();
        let id = format!("cus_mock_{}", state.customers.len() + 1);
        state.customers.push(MockCustomer {
            id: id.clone(),
            email: email.to_string(),
        });
        Ok(id)
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, BillingError> {
        self.record_call("find_customer_by_email", vec![email.to_string()]);
        self.check_error("find_customer_by_email")?;

        Ok(self
            .state()
            .customers
            .iter()
            .rev()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .map(|c| c.id.clone()))
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BillingError> {
        self.record_call(
            "create_checkout_session",
            vec![request.price_id.clone()],
        );
        self.check_error("create_checkout_session")?;

        let mut state = self.state();
        state.checkout_requests.push(request);
        let id = format!("cs_mock_{}", state.checkout_requests.len());

        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{}", id),
            id,
        })
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<BillingSubscription>, BillingError> {
        self.record_call("list_subscriptions", vec![customer_id.to_string()]);
        self.check_error("list_subscriptions")?;

        let mut subs: Vec<_> = self
            .state()
            .subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        Ok(subs)
    }

    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), BillingError> {
        self.record_call(
            "update_subscription_metadata",
            vec![subscription_id.to_string()],
        );
        self.check_error("update_subscription_metadata")?;

        let mut state = self.state();
        let sub = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| BillingError::not_found("subscription"))?;

        let mut merged = sub.metadata.to_map();
        merged.extend(metadata);
        sub.metadata = SubscriptionMetadata::from_map(&merged);
        Ok(())
    }
}
