//! Policy input/decision models shared by the OPA and local engines.

use serde::{Deserialize, Serialize};

/// The approval class of an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Self-execute, no review.
    Auto,
    /// Low risk, logged for later review.
    FastTrack,
    /// Requires human approval before dispatch.
    Review,
    /// Refused.
    Deny,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::FastTrack => "fast_track",
            Self::Review => "review",
            Self::Deny => "deny",
        }
    }

    /// Parse a tier string from a policy service response.
    /// Unrecognized tiers coerce to `Deny`.
    pub fn parse_or_deny(raw: &str) -> Self {
        match raw {
            "auto" => Self::Auto,
            "fast_track" => Self::FastTrack,
            "review" => Self::Review,
            _ => Self::Deny,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured input for a policy evaluation.
///
/// `agent_type` is a raw string here: the policy boundary must be able to
/// represent unknown agent types in order to deny them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyInput {
    pub agent_id: String,
    pub agent_type: String,
    pub action: String,
    #[serde(default)]
    pub target: String,
    pub tenant_id: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// The result of a policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub tier: Tier,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PolicyDecision {
    /// An unconditional deny with the given machine reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            tier: Tier::Deny,
            reasons: vec![reason.into()],
            violations: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_violation(mut self, violation: impl Into<String>) -> Self {
        self.violations.push(violation.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Tier::FastTrack).unwrap(), "\"fast_track\"");
        assert_eq!(serde_json::to_string(&Tier::Auto).unwrap(), "\"auto\"");
    }

    #[test]
    fn unknown_tier_coerces_to_deny() {
        assert_eq!(Tier::parse_or_deny("fast_track"), Tier::FastTrack);
        assert_eq!(Tier::parse_or_deny("escalate"), Tier::Deny);
        assert_eq!(Tier::parse_or_deny(""), Tier::Deny);
    }

    #[test]
    fn deny_constructor() {
        let decision = PolicyDecision::deny("blocked_action").with_violation("Action is blocked");
        assert!(!decision.allowed);
        assert_eq!(decision.tier, Tier::Deny);
        assert_eq!(decision.reasons, vec!["blocked_action"]);
        assert_eq!(decision.violations.len(), 1);
    }
}
