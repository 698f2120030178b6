//! SIEM query protocol consumed by the hunt playbooks.
//!
//! The concrete Elastic connector lives outside this crate; hunt agents
//! depend on this trait only, keeping the dependency graph clean.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors from SIEM operations, categorized for the caller. The core does
/// not retry either kind.
#[derive(Debug, thiserror::Error)]
pub enum SiemError {
    /// Network-level failure; retryable by outer layers.
    #[error("SIEM transport error: {0}")]
    Transport(String),

    /// The SIEM answered but the exchange was invalid; not retryable.
    #[error("SIEM protocol error: {0}")]
    Protocol(String),
}

/// Normalized security event from a SIEM query result.
///
/// Extracts common security fields from heterogeneous log formats while
/// preserving the full source document in `raw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiemEvent {
    pub id: String,
    pub index: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub source_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub source_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub event_type: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
    pub user: Option<String>,
    pub hostname: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Result of a SIEM query execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub events: Vec<SiemEvent>,
    pub total_hits: u64,
    pub took_ms: u64,
    pub timed_out: bool,
    #[serde(default)]
    pub aggregations: serde_json::Value,
}

/// Metadata about a discovered index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub doc_count: u64,
    pub size_bytes: u64,
}

/// Result of discovering available indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDiscovery {
    pub indices: Vec<IndexInfo>,
    pub total_indices: usize,
}

/// Interface for SIEM query operations.
#[async_trait]
pub trait Siem: Send + Sync {
    /// Execute a query DSL document against an index pattern.
    async fn execute_query(
        &self,
        query_dsl: &serde_json::Value,
        index: &str,
        size: u32,
        sort: Option<&serde_json::Value>,
        aggs: Option<&serde_json::Value>,
    ) -> Result<QueryResult, SiemError>;

    /// Discover available indices matching a pattern.
    async fn discover_indices(&self, pattern: &str) -> Result<IndexDiscovery, SiemError>;
}
