//! Core domain types for the Sentinel agent framework.
//!
//! These types are shared across all agent components: the runtime, the
//! orchestrator, the hunt and simulation playbooks, and the audit tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SentinelError;

// ── Tenant ────────────────────────────────────────────────────────

/// Every entity in the system belongs to a tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Agent Enums ───────────────────────────────────────────────────

/// The four agent families the platform runs.
///
/// Unknown agent types only exist as raw strings at the policy boundary;
/// everything constructed inside the runtime carries one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Hunt,
    Simulate,
    Discover,
    Govern,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hunt => "hunt",
            Self::Simulate => "simulate",
            Self::Discover => "discover",
            Self::Govern => "govern",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle states for an agent session.
///
/// `Paused` is reserved; the runtime never sets it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// Severity scale shared by findings and recommendations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Agent Configuration ───────────────────────────────────────────

/// Configuration for an agent session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub tenant_id: TenantId,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Carried for external use; the runtime does not enforce it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl AgentConfig {
    pub fn new(agent_id: impl Into<String>, agent_type: AgentType, tenant_id: TenantId) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type,
            tenant_id,
            llm_model: default_llm_model(),
            max_steps: default_max_steps(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Validate the configuration. Called by the runtime on construction.
    pub fn validate(&self) -> Result<(), SentinelError> {
        if self.agent_id.trim().is_empty() {
            return Err(SentinelError::Config("agent_id must not be empty".into()));
        }
        if self.max_steps == 0 {
            return Err(SentinelError::Config("max_steps must be positive".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(SentinelError::Config(
                "timeout_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_steps() -> u32 {
    20
}

fn default_timeout_seconds() -> u64 {
    300
}

// ── Findings & Plans ──────────────────────────────────────────────

/// Structured evidence attached to a finding.
pub type Evidence = serde_json::Map<String, serde_json::Value>;

/// A security finding produced by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// An actionable recommendation from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: Severity,
    #[serde(default)]
    pub automated: bool,
}

/// An alternative considered during planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAlternative {
    pub option: String,
    pub reason: String,
}

/// Structured plan produced by the plan phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPlan {
    pub description: String,
    pub rationale: String,
    pub confidence: f64,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<PlanAlternative>,
}

/// Structured output from an agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub tenant_id: TenantId,
    pub status: AgentStatus,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub actions_taken: u32,
    pub engram_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl AgentResult {
    /// An in-flight result shell for a running agent.
    pub fn running(config: &AgentConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            agent_id: config.agent_id.clone(),
            agent_type: config.agent_type,
            tenant_id: config.tenant_id,
            status: AgentStatus::Running,
            findings: Vec::new(),
            recommendations: Vec::new(),
            actions_taken: 0,
            engram_id: None,
            started_at,
            completed_at: None,
            error: None,
        }
    }

    /// The minimal result for a run whose plan or execute phase failed.
    pub fn failure(config: &AgentConfig, started_at: DateTime<Utc>, error: String) -> Self {
        Self {
            status: AgentStatus::Failed,
            error: Some(error),
            ..Self::running(config, started_at)
        }
    }
}

// ── Graph Edge Vocabulary ─────────────────────────────────────────

/// The relationship types the agent core reads from the knowledge graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    ConnectsTo,
    HasAccess,
    MemberOf,
    RunsOn,
    Trusts,
    Exposes,
    DependsOn,
    CanReach,
    HasCve,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectsTo => "CONNECTS_TO",
            Self::HasAccess => "HAS_ACCESS",
            Self::MemberOf => "MEMBER_OF",
            Self::RunsOn => "RUNS_ON",
            Self::Trusts => "TRUSTS",
            Self::Exposes => "EXPOSES",
            Self::DependsOn => "DEPENDS_ON",
            Self::CanReach => "CAN_REACH",
            Self::HasCve => "HAS_CVE",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
