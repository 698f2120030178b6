//! OPA policy evaluation engine.
//!
//! Communicates with an OPA sidecar via its REST API (`v1/data`). Any
//! transport or protocol failure yields a deny decision — the engine never
//! fails open.

use std::time::Duration;

use async_trait::async_trait;

use crate::models::{PolicyDecision, PolicyInput, Tier};
use crate::PolicyEngine;

pub const DEFAULT_OPA_URL: &str = "http://localhost:8181";

const AGENT_ACTION_PATH: &str = "agent/base";
const RESPONSE_TIER_PATH: &str = "response/approval";

/// Client for evaluating policies against an OPA server.
pub struct OpaPolicyEngine {
    base_url: String,
    client: reqwest::Client,
}

impl OpaPolicyEngine {
    /// Create an engine against the given OPA base URL.
    pub fn new(opa_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            base_url: opa_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Evaluate a policy by data path against the given input.
    pub async fn evaluate(&self, policy_path: &str, input: &PolicyInput) -> PolicyDecision {
        let url = format!("{}/v1/data/{policy_path}", self.base_url);
        let payload = serde_json::json!({ "input": input });

        let response = match self.client.post(&url).json(&payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    error = %e,
                    "OPA not reachable, denying by default"
                );
                return PolicyDecision::deny("OPA service unavailable");
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::error!(policy_path, status = %status, "OPA returned error status");
            return PolicyDecision::deny(format!("OPA error: {}", status.as_u16()));
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(policy_path, error = %e, "Invalid OPA response body");
                return PolicyDecision::deny("OPA service unavailable");
            }
        };

        parse_result(body.get("result").unwrap_or(&serde_json::Value::Null))
    }

    /// Check if OPA is reachable.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl PolicyEngine for OpaPolicyEngine {
    async fn evaluate_agent_action(&self, input: &PolicyInput) -> PolicyDecision {
        self.evaluate(AGENT_ACTION_PATH, input).await
    }

    async fn evaluate_response_tier(&self, input: &PolicyInput) -> PolicyDecision {
        self.evaluate(RESPONSE_TIER_PATH, input).await
    }
}

/// Parse an OPA `result` document into a decision.
///
/// Fields other than allow/tier/reasons/violations are preserved in
/// `metadata`. An unrecognized tier string coerces to deny.
fn parse_result(result: &serde_json::Value) -> PolicyDecision {
    let allowed = result
        .get("allow")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let tier = result
        .get("tier")
        .and_then(|v| v.as_str())
        .map(Tier::parse_or_deny)
        .unwrap_or(Tier::Deny);

    let string_list = |key: &str| -> Vec<String> {
        result
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    };

    let metadata = result
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| !matches!(k.as_str(), "allow" | "tier" | "reasons" | "violations"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    PolicyDecision {
        allowed,
        tier,
        reasons: string_list("reasons"),
        violations: string_list("violations"),
        metadata,
    }
}
