//! sentinel-core: Shared types, configuration, and error handling for the Sentinel platform.
//!
//! This crate provides the foundational types used across all Sentinel agent
//! components:
//! - Agent configuration, plans, results, and findings
//! - Severity and lifecycle status enums
//! - The graph edge vocabulary consumed by simulation playbooks
//! - Common error types

pub mod error;
pub mod types;

pub use error::SentinelError;
pub use types::{
    AgentConfig, AgentPlan, AgentResult, AgentStatus, AgentType, EdgeType, Evidence, Finding,
    PlanAlternative, Recommendation, Severity, TenantId,
};
