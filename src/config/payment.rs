//! Payment configuration

use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Price of the limited plan (checkout starts a trial on it)
    pub trial_price_id: String,

    /// Price of the unlimited plan
    pub direct_price_id: String,

    /// Trial length granted at checkout for non-upgrade trial purchases
    #[serde(default = "default_trial_period_days")]
    pub trial_period_days: u32,

    /// Where Stripe sends the browser after payment
    pub success_url: String,

    /// Where Stripe sends the browser when checkout is abandoned
    pub cancel_url: String,

    /// Override of the Stripe API base URL (stripe-mock, proxies)
    pub api_base_url: Option<String>,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    pub fn api_key(&self) -> SecretString {
        SecretString::new(self.stripe_api_key.clone())
    }

    pub fn webhook_secret(&self) -> SecretString {
        SecretString::new(self.stripe_webhook_secret.clone())
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__STRIPE_WEBHOOK_SECRET",
            ));
        }

        // Restricted keys (rk_) work as well as secret keys
        if !self.stripe_api_key.starts_with("sk_") && !self.stripe_api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if !self.trial_price_id.starts_with("price_") {
            return Err(ValidationError::InvalidPriceId("trial_price_id"));
        }
        if !self.direct_price_id.starts_with("price_") {
            return Err(ValidationError::InvalidPriceId("direct_price_id"));
        }
        if self.trial_period_days == 0 || self.trial_period_days > 30 {
            return Err(ValidationError::InvalidTrialPeriod);
        }

        if !is_absolute_url(&self.success_url) {
            return Err(ValidationError::InvalidRedirectUrl("success_url"));
        }
        if !is_absolute_url(&self.cancel_url) {
            return Err(ValidationError::InvalidRedirectUrl("cancel_url"));
        }

        Ok(())
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_trial_period_days() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            stripe_webhook_secret: "whsec_xyz789".to_string(),
            trial_price_id: "price_trial".to_string(),
            direct_price_id: "price_direct".to_string(),
            trial_period_days: default_trial_period_days(),
            success_url: "https://app.example.fr/dashboard/payment-success".to_string(),
            cancel_url: "https://app.example.fr/pricing".to_string(),
            api_base_url: None,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
        assert_eq!(valid().trial_period_days, 3);
    }

    #[test]
    fn test_is_test_mode() {
        let config = valid();
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn test_is_live_mode() {
        let config = PaymentConfig {
            stripe_api_key: "sk_live_xxx".to_string(),
            ..valid()
        };
        assert!(config.is_live_mode());
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_validation_missing_api_key() {
        let config = PaymentConfig {
            stripe_api_key: String::new(),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"))
        );
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(), // Publishable key
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = PaymentConfig {
            stripe_webhook_secret: "secret_xxx".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_validation_invalid_price() {
        let config = PaymentConfig {
            direct_price_id: "prod_123".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidPriceId("direct_price_id"))
        );
    }

    #[test]
    fn test_validation_relative_success_url() {
        let config = PaymentConfig {
            success_url: "/dashboard/payment-success".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidRedirectUrl("success_url"))
        );
    }

    #[test]
    fn test_validation_trial_period_bounds() {
        let config = PaymentConfig {
            trial_period_days: 0,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTrialPeriod));
    }
}
