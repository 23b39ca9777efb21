//! Access gate configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Which paths the gate guards and where denials are sent
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Every path under this prefix is gated
    #[serde(default = "default_protected_prefix")]
    pub protected_prefix: String,

    /// Comma-separated paths under the prefix that stay open
    #[serde(default = "default_exclusions")]
    pub exclusions: String,

    /// Redirect for unauthenticated callers
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Redirect for callers without a usable subscription
    #[serde(default = "default_plan_selection_path")]
    pub plan_selection_path: String,
}

impl AccessConfig {
    pub fn exclusions_list(&self) -> Vec<String> {
        self.exclusions
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate access configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.protected_prefix.starts_with('/') {
            return Err(ValidationError::InvalidAccessPath("protected_prefix"));
        }
        if !self.login_path.starts_with('/') {
            return Err(ValidationError::InvalidAccessPath("login_path"));
        }
        if !self.plan_selection_path.starts_with('/') {
            return Err(ValidationError::InvalidAccessPath("plan_selection_path"));
        }
        if self.exclusions_list().iter().any(|p| !p.starts_with('/')) {
            return Err(ValidationError::InvalidAccessPath("exclusions"));
        }
        Ok(())
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            protected_prefix: default_protected_prefix(),
            exclusions: default_exclusions(),
            login_path: default_login_path(),
            plan_selection_path: default_plan_selection_path(),
        }
    }
}

fn default_protected_prefix() -> String {
    "/dashboard".to_string()
}

fn default_exclusions() -> String {
    "/dashboard/payment-success,/dashboard/register".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_plan_selection_path() -> String {
    "/pricing".to_string()
}
