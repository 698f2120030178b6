//! sentinel-policy: Agent action policy evaluation.
//!
//! Two implementations of one contract: [`OpaPolicyEngine`] consults an OPA
//! sidecar over its `v1/data` REST API and is authoritative in production;
//! [`LocalPolicyEngine`] evaluates the same rule tables in-process for
//! testing and degraded operation. Both agree on every input, and both fail
//! closed — any transport failure becomes a deny decision.

pub mod engine;
pub mod local;
pub mod models;

pub use engine::OpaPolicyEngine;
pub use local::LocalPolicyEngine;
pub use models::{PolicyDecision, PolicyInput, Tier};

use async_trait::async_trait;

/// The policy evaluation contract consumed by the agent runtime.
///
/// Evaluation never fails open: implementations convert every internal
/// failure into a deny decision rather than returning an error.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Evaluate whether an agent action is allowed.
    async fn evaluate_agent_action(&self, input: &PolicyInput) -> PolicyDecision;

    /// Determine the approval tier for a response action.
    async fn evaluate_response_tier(&self, input: &PolicyInput) -> PolicyDecision;
}
