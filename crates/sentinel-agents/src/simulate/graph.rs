//! Read-only knowledge-graph protocol consumed by simulation playbooks.
//!
//! Simulations never write to the graph; this trait is the only surface
//! they touch. The concrete implementation (graph service + pathfind
//! engine) lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sentinel_core::{EdgeType, TenantId};

/// Errors from graph operations, categorized for the caller. The core does
/// not retry either kind.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Network-level failure; retryable by outer layers.
    #[error("Graph transport error: {0}")]
    Transport(String),

    /// The graph answered but the exchange was invalid; not retryable.
    #[error("Graph protocol error: {0}")]
    Protocol(String),
}

/// A lightweight node record: id, label, and a property bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl NodeRecord {
    pub fn new(id: &str, label: &str, properties: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            properties,
        }
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn prop_bool(&self, key: &str) -> bool {
        self.prop_bool_or(key, false)
    }

    pub fn prop_bool_or(&self, key: &str, default: bool) -> bool {
        self.properties
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn prop_u64(&self, key: &str) -> Option<u64> {
        self.properties.get(key).and_then(|v| v.as_u64())
    }

    pub fn prop_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(|v| v.as_f64())
    }

    /// String-list property, e.g. role permissions.
    pub fn prop_str_list(&self, key: &str) -> Vec<String> {
        self.properties
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A display name for messages: the given property, else the node id.
    pub fn name_or_id(&self, key: &str) -> &str {
        self.prop_str(key).unwrap_or(&self.id)
    }
}

/// A lightweight edge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub edge_type: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Parameters for an attack-path computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttackPathQuery {
    /// Specific source node ids. Empty means internet-facing nodes.
    pub sources: Vec<String>,
    /// Specific target node ids. Empty means crown jewels.
    pub targets: Vec<String>,
    pub max_depth: u32,
    pub max_paths: u32,
    pub include_lateral: bool,
    pub include_blast: bool,
}

/// A computed attack path, summarized for simulation findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackPathRecord {
    pub source: String,
    pub target: String,
    pub risk_score: f64,
    pub step_count: u32,
}

/// A detected lateral movement chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralChainRecord {
    /// Technique used at each hop, e.g. "rdp-hop", "ssh-pivot".
    pub techniques: Vec<String>,
    pub risk_score: f64,
}

/// Result of an attack-path computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathfindReport {
    pub attack_paths: Vec<AttackPathRecord>,
    #[serde(default)]
    pub lateral_chains: Vec<LateralChainRecord>,
}

/// Result of a blast-radius computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlastRadius {
    pub blast_score: f64,
    pub total_reachable: u32,
    pub critical_reachable: u32,
}

/// Read-only interface for graph and pathfinding operations.
///
/// All operations are tenant-scoped. Implementations must be safe for
/// concurrent readers.
#[async_trait]
pub trait GraphReader: Send + Sync {
    /// Query nodes by label with optional property filters.
    async fn query_nodes(
        &self,
        label: &str,
        tenant_id: &TenantId,
        filters: Option<&serde_json::Value>,
        limit: u32,
    ) -> Result<Vec<NodeRecord>, GraphError>;

    /// Get neighbors of a node filtered by edge type or target label.
    /// Empty slices mean no filter.
    async fn query_neighbors(
        &self,
        node_id: &str,
        tenant_id: &TenantId,
        edge_types: &[EdgeType],
        target_labels: &[&str],
        limit: u32,
    ) -> Result<Vec<NodeRecord>, GraphError>;

    /// Query edges with optional type and endpoint label filters.
    async fn query_edges(
        &self,
        tenant_id: &TenantId,
        edge_type: Option<EdgeType>,
        source_label: Option<&str>,
        target_label: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EdgeRecord>, GraphError>;

    /// Compute attack paths through the tenant's subgraph.
    async fn find_attack_paths(
        &self,
        tenant_id: &TenantId,
        query: &AttackPathQuery,
    ) -> Result<PathfindReport, GraphError>;

    /// Compute the blast radius from a compromised node.
    async fn compute_blast_radius(
        &self,
        tenant_id: &TenantId,
        node_id: &str,
        max_hops: u32,
        min_exploitability: f64,
    ) -> Result<BlastRadius, GraphError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_accessors() {
        let node = NodeRecord::new(
            "n1",
            "Host",
            serde_json::json!({
                "hostname": "web-01",
                "is_internet_facing": true,
                "port": 443,
                "cvss_score": 8.1,
                "permissions": ["admin:read", "admin:write"],
            }),
        );

        assert_eq!(node.prop_str("hostname"), Some("web-01"));
        assert!(node.prop_bool("is_internet_facing"));
        assert!(!node.prop_bool("exploitable"));
        assert!(node.prop_bool_or("enabled", true));
        assert_eq!(node.prop_u64("port"), Some(443));
        assert_eq!(node.prop_f64("cvss_score"), Some(8.1));
        assert_eq!(node.prop_str_list("permissions").len(), 2);
        assert_eq!(node.name_or_id("hostname"), "web-01");
        assert_eq!(node.name_or_id("username"), "n1");
    }
}
