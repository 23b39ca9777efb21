//! Plan type, agent personas and the fixed trial usage caps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// The billing choice a user made at checkout.
///
/// Distinct from [`super::SubscriptionStatus`]: a `Trial` plan may be
/// `trialing` or `active`, a `Direct` plan is a paid upgrade without caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Trial,
    Direct,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Trial => "trial",
            PlanType::Direct => "direct",
        }
    }

    /// Lenient parse used on provider metadata. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "trial" => Some(PlanType::Trial),
            "direct" => Some(PlanType::Direct),
            _ => None,
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanType::parse(s).ok_or_else(|| {
            ValidationError::invalid_format("plan_type", format!("unknown plan type '{}'", s))
        })
    }
}

/// The four agent personas metered per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Chat mentor.
    Chat,
    /// SaaS idea validator.
    Validator,
    /// Prompt generator.
    Prompt,
    /// Roadmap builder.
    Builder,
}

impl AgentType {
    pub const ALL: [AgentType; 4] = [
        AgentType::Chat,
        AgentType::Validator,
        AgentType::Prompt,
        AgentType::Builder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Chat => "chat",
            AgentType::Validator => "validator",
            AgentType::Prompt => "prompt",
            AgentType::Builder => "builder",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(AgentType::Chat),
            "validator" => Ok(AgentType::Validator),
            "prompt" => Ok(AgentType::Prompt),
            "builder" => Ok(AgentType::Builder),
            other => Err(ValidationError::invalid_format(
                "agent",
                format!("unknown agent '{}'", other),
            )),
        }
    }
}

/// Per-agent daily caps applied while on a trial plan.
///
/// Stored as JSON in `subscriptions.trial_limitations`. The values are fixed
/// by the product and never edited by users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialLimitations {
    pub chat_messages: u32,
    pub validator_uses: u32,
    pub prompt_uses: u32,
    pub builder_uses: u32,
}

impl TrialLimitations {
    /// Daily cap for one agent. Zero means the feature is locked.
    pub fn cap_for(&self, agent: AgentType) -> u32 {
        match agent {
            AgentType::Chat => self.chat_messages,
            AgentType::Validator => self.validator_uses,
            AgentType::Prompt => self.prompt_uses,
            AgentType::Builder => self.builder_uses,
        }
    }
}

impl Default for TrialLimitations {
    fn default() -> Self {
        Self {
            chat_messages: 5,
            validator_uses: 1,
            prompt_uses: 0,
            builder_uses: 0,
        }
    }
}
