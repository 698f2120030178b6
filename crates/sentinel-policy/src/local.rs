//! Local policy evaluator — in-process fallback for testing without OPA.
//!
//! Implements the same logic as the Rego policies so unit tests and
//! degraded deployments can run without an OPA sidecar. The OPA-based
//! engine is authoritative in production; both must agree on every input.

use async_trait::async_trait;

use crate::models::{PolicyDecision, PolicyInput, Tier};
use crate::PolicyEngine;

/// Actions that are denied regardless of agent type.
pub const BLOCKED_ACTIONS: &[&str] = &[
    "delete_data",
    "modify_firewall",
    "disable_security",
    "exfiltrate",
    "execute_payload",
];

/// Per-agent-type action allowlists (mirrors policies/agent/base.rego).
pub const ALLOWED_ACTIONS: &[(&str, &[&str])] = &[
    (
        "hunt",
        &[
            "query_logs",
            "search_graph",
            "correlate_events",
            "read_alerts",
            "create_finding",
        ],
    ),
    ("simulate", &["read_graph", "compute_path", "generate_report"]),
    (
        "discover",
        &["scan_network", "query_cloud_api", "update_graph", "read_graph"],
    ),
    (
        "govern",
        &["audit_agents", "check_policy", "review_engram", "list_mcp_servers"],
    ),
];

/// Response approval tiers (mirrors policies/response/approval.rego).
/// Actions absent from this table require `review`.
pub const TIER_MAP: &[(&str, Tier)] = &[
    // Auto-approved: read-only, low risk
    ("read_alerts", Tier::Auto),
    ("query_logs", Tier::Auto),
    ("search_graph", Tier::Auto),
    ("read_graph", Tier::Auto),
    ("correlate_events", Tier::Auto),
    ("list_mcp_servers", Tier::Auto),
    ("check_policy", Tier::Auto),
    ("review_engram", Tier::Auto),
    // Fast-track: creates artifacts but no direct system changes
    ("create_finding", Tier::FastTrack),
    ("generate_report", Tier::FastTrack),
    ("compute_path", Tier::FastTrack),
    ("audit_agents", Tier::FastTrack),
    // Review: modifies system state
    ("update_graph", Tier::Review),
    ("scan_network", Tier::Review),
    ("query_cloud_api", Tier::Review),
];

/// In-process policy engine implementing the authoritative rule tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPolicyEngine;

impl LocalPolicyEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PolicyEngine for LocalPolicyEngine {
    async fn evaluate_agent_action(&self, input: &PolicyInput) -> PolicyDecision {
        evaluate_agent_action(input)
    }

    async fn evaluate_response_tier(&self, input: &PolicyInput) -> PolicyDecision {
        evaluate_response_tier(input)
    }
}

/// Check if an agent action is allowed based on the allowlist tables.
pub fn evaluate_agent_action(input: &PolicyInput) -> PolicyDecision {
    // Dangerous actions are blocked for every agent type.
    if BLOCKED_ACTIONS.contains(&input.action.as_str()) {
        return PolicyDecision::deny("blocked_action")
            .with_violation(format!("Action '{}' is on the blocked list", input.action));
    }

    let Some((_, allowed)) = ALLOWED_ACTIONS
        .iter()
        .find(|(agent_type, _)| *agent_type == input.agent_type)
    else {
        return PolicyDecision::deny("unknown_agent_type")
            .with_violation(format!("Unknown agent type '{}'", input.agent_type));
    };

    if !allowed.contains(&input.action.as_str()) {
        return PolicyDecision::deny("action_not_allowed").with_violation(format!(
            "Action '{}' not permitted for agent type '{}'",
            input.action, input.agent_type
        ));
    }

    PolicyDecision {
        allowed: true,
        tier: Tier::Auto,
        reasons: vec!["action_permitted".to_string()],
        violations: Vec::new(),
        metadata: serde_json::Map::new(),
    }
}

/// Determine the approval tier for a response action.
///
/// Tier evaluation never gates `allowed`; the tier itself is the payload.
pub fn evaluate_response_tier(input: &PolicyInput) -> PolicyDecision {
    let tier = TIER_MAP
        .iter()
        .find(|(action, _)| *action == input.action)
        .map(|(_, tier)| *tier)
        .unwrap_or(Tier::Review);

    PolicyDecision {
        allowed: true,
        tier,
        reasons: vec![format!("tier_{tier}")],
        violations: Vec::new(),
        metadata: serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(agent_type: &str, action: &str) -> PolicyInput {
        PolicyInput {
            agent_id: "agent-1".to_string(),
            agent_type: agent_type.to_string(),
            action: action.to_string(),
            target: String::new(),
            tenant_id: "tenant-1".to_string(),
            context: serde_json::Value::Null,
        }
    }

    #[test]
    fn blocked_actions_denied_for_every_agent_type() {
        for agent_type in ["hunt", "simulate", "discover", "govern", "unknown"] {
            for action in BLOCKED_ACTIONS {
                let decision = evaluate_agent_action(&input(agent_type, action));
                assert!(!decision.allowed, "{agent_type}/{action} should deny");
                assert_eq!(decision.tier, Tier::Deny);
                assert_eq!(decision.reasons, vec!["blocked_action"]);
                assert!(!decision.violations.is_empty());
            }
        }
    }

    #[test]
    fn allowlisted_actions_permitted() {
        for (agent_type, actions) in ALLOWED_ACTIONS {
            for action in *actions {
                let decision = evaluate_agent_action(&input(agent_type, action));
                assert!(decision.allowed, "{agent_type}/{action} should allow");
                assert_eq!(decision.tier, Tier::Auto);
                assert_eq!(decision.reasons, vec!["action_permitted"]);
            }
        }
    }

    #[test]
    fn unknown_agent_type_denied() {
        let decision = evaluate_agent_action(&input("banana", "read_graph"));
        assert!(!decision.allowed);
        assert_eq!(decision.reasons, vec!["unknown_agent_type"]);
    }

    #[test]
    fn cross_agent_actions_denied() {
        // A hunt agent may not read the graph directly; a simulate agent
        // may not query logs.
        let decision = evaluate_agent_action(&input("hunt", "read_graph"));
        assert!(!decision.allowed);
        assert_eq!(decision.reasons, vec!["action_not_allowed"]);

        let decision = evaluate_agent_action(&input("simulate", "query_logs"));
        assert!(!decision.allowed);
        assert_eq!(decision.reasons, vec!["action_not_allowed"]);
    }

    #[test]
    fn tier_table_is_exhaustive() {
        for (action, expected) in TIER_MAP {
            let decision = evaluate_response_tier(&input("hunt", action));
            assert!(decision.allowed);
            assert_eq!(decision.tier, *expected, "{action}");
            assert_eq!(decision.reasons, vec![format!("tier_{expected}")]);
        }
    }

    #[test]
    fn unknown_action_defaults_to_review() {
        let decision = evaluate_response_tier(&input("hunt", "launch_rockets"));
        assert!(decision.allowed);
        assert_eq!(decision.tier, Tier::Review);
    }

    #[tokio::test]
    async fn trait_impl_matches_free_functions() {
        let engine = LocalPolicyEngine::new();
        let i = input("govern", "review_engram");

        let via_trait = engine.evaluate_agent_action(&i).await;
        let direct = evaluate_agent_action(&i);
        assert_eq!(via_trait.allowed, direct.allowed);
        assert_eq!(via_trait.tier, direct.tier);

        let via_trait = engine.evaluate_response_tier(&i).await;
        let direct = evaluate_response_tier(&i);
        assert_eq!(via_trait.tier, direct.tier);
    }
}
