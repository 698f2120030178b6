//! Shared fixtures: scripted LLM responses, a queue-driven SIEM, and an
//! in-memory graph for simulation scenarios.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sentinel_agents::siem::{IndexDiscovery, QueryResult, Siem, SiemError, SiemEvent};
use sentinel_agents::simulate::graph::{
    AttackPathQuery, AttackPathRecord, BlastRadius, EdgeRecord, GraphError, GraphReader,
    LateralChainRecord, NodeRecord, PathfindReport,
};
use sentinel_core::{AgentConfig, AgentType, EdgeType, TenantId};

/// A plan document every agent accepts from the mock LLM.
pub fn plan_json() -> String {
    serde_json::json!({
        "description": "Scripted plan",
        "rationale": "Deterministic test path",
        "confidence": 0.9,
        "steps": ["step one", "step two"],
        "alternatives": [
            {"option": "Do nothing", "reason": "Would miss active threats"}
        ],
    })
    .to_string()
}

pub fn agent_config(agent_id: &str, agent_type: AgentType, tenant: TenantId) -> AgentConfig {
    AgentConfig::new(agent_id, agent_type, tenant)
}

// ── SIEM fixtures ─────────────────────────────────────────────────

/// Returns queued results in call order; empty results once drained.
pub struct MockSiem {
    queue: Mutex<VecDeque<QueryResult>>,
    calls: AtomicUsize,
}

impl MockSiem {
    pub fn new(results: Vec<QueryResult>) -> Self {
        Self {
            queue: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Siem for MockSiem {
    async fn execute_query(
        &self,
        _query_dsl: &serde_json::Value,
        _index: &str,
        _size: u32,
        _sort: Option<&serde_json::Value>,
        _aggs: Option<&serde_json::Value>,
    ) -> Result<QueryResult, SiemError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn discover_indices(&self, _pattern: &str) -> Result<IndexDiscovery, SiemError> {
        Ok(IndexDiscovery::default())
    }
}

pub fn query_result(events: Vec<SiemEvent>) -> QueryResult {
    QueryResult {
        total_hits: events.len() as u64,
        events,
        took_ms: 3,
        timed_out: false,
        aggregations: serde_json::Value::Null,
    }
}

pub fn siem_event(id: usize) -> SiemEvent {
    SiemEvent {
        id: format!("evt-{id}"),
        index: "winlogbeat-000001".to_string(),
        timestamp: Some(Utc::now()),
        source_ip: None,
        dest_ip: None,
        source_port: None,
        dest_port: None,
        event_type: None,
        severity: None,
        message: None,
        user: None,
        hostname: None,
        raw: serde_json::json!({}),
    }
}

pub fn auth_failure(id: usize, source_ip: &str, user: &str) -> SiemEvent {
    let mut event = siem_event(id);
    event.source_ip = Some(source_ip.to_string());
    event.user = Some(user.to_string());
    event.event_type = Some("authentication".to_string());
    event
}

pub fn dns_event(id: usize, source_ip: &str, question_name: &str) -> SiemEvent {
    let mut event = siem_event(id);
    event.source_ip = Some(source_ip.to_string());
    event.raw = serde_json::json!({"dns": {"question": {"name": question_name}}});
    event
}

pub fn transfer_event(
    id: usize,
    source_ip: &str,
    dest_ip: &str,
    bytes: u64,
    timestamp: DateTime<Utc>,
) -> SiemEvent {
    let mut event = siem_event(id);
    event.source_ip = Some(source_ip.to_string());
    event.dest_ip = Some(dest_ip.to_string());
    event.timestamp = Some(timestamp);
    event.raw = serde_json::json!({"network": {"bytes": bytes}});
    event
}

// ── Graph fixtures ────────────────────────────────────────────────

/// In-memory graph: nodes by label, neighbors by node id, plus canned
/// pathfind and blast-radius answers.
#[derive(Default)]
pub struct MockGraph {
    pub nodes: HashMap<String, Vec<NodeRecord>>,
    pub neighbors: HashMap<String, Vec<NodeRecord>>,
    pub edges: Vec<EdgeRecord>,
    pub pathfind: PathfindReport,
    pub blast: BlastRadius,
    neighbor_calls: AtomicUsize,
    technique_queries: AtomicUsize,
}

impl MockGraph {
    pub fn neighbor_calls(&self) -> usize {
        self.neighbor_calls.load(Ordering::SeqCst)
    }

    pub fn with_nodes(mut self, label: &str, nodes: Vec<NodeRecord>) -> Self {
        self.nodes.insert(label.to_string(), nodes);
        self
    }

    pub fn with_neighbors(mut self, node_id: &str, neighbors: Vec<NodeRecord>) -> Self {
        self.neighbors.insert(node_id.to_string(), neighbors);
        self
    }

    pub fn with_edges(mut self, edges: Vec<EdgeRecord>) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_pathfind(mut self, report: PathfindReport) -> Self {
        self.pathfind = report;
        self
    }

    pub fn with_blast(mut self, blast: BlastRadius) -> Self {
        self.blast = blast;
        self
    }
}

#[async_trait]
impl GraphReader for MockGraph {
    async fn query_nodes(
        &self,
        label: &str,
        _tenant_id: &TenantId,
        _filters: Option<&serde_json::Value>,
        _limit: u32,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        Ok(self.nodes.get(label).cloned().unwrap_or_default())
    }

    async fn query_neighbors(
        &self,
        node_id: &str,
        _tenant_id: &TenantId,
        _edge_types: &[EdgeType],
        _target_labels: &[&str],
        _limit: u32,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        self.neighbor_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.neighbors.get(node_id).cloned().unwrap_or_default())
    }

    async fn query_edges(
        &self,
        _tenant_id: &TenantId,
        edge_type: Option<EdgeType>,
        _source_label: Option<&str>,
        _target_label: Option<&str>,
        _limit: u32,
    ) -> Result<Vec<EdgeRecord>, GraphError> {
        Ok(self
            .edges
            .iter()
            .filter(|e| edge_type.map_or(true, |t| e.edge_type == t.as_str()))
            .cloned()
            .collect())
    }

    async fn find_attack_paths(
        &self,
        _tenant_id: &TenantId,
        _query: &AttackPathQuery,
    ) -> Result<PathfindReport, GraphError> {
        self.technique_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.pathfind.clone())
    }

    async fn compute_blast_radius(
        &self,
        _tenant_id: &TenantId,
        _node_id: &str,
        _max_hops: u32,
        _min_exploitability: f64,
    ) -> Result<BlastRadius, GraphError> {
        Ok(self.blast.clone())
    }
}

pub fn host(id: &str, hostname: &str, props: serde_json::Value) -> NodeRecord {
    let mut properties = props;
    properties["hostname"] = serde_json::json!(hostname);
    NodeRecord::new(id, "Host", properties)
}

pub fn user(id: &str, username: &str, props: serde_json::Value) -> NodeRecord {
    let mut properties = props;
    properties["username"] = serde_json::json!(username);
    NodeRecord::new(id, "User", properties)
}

pub fn service(id: &str, name: &str, port: u16) -> NodeRecord {
    NodeRecord::new(
        id,
        "Service",
        serde_json::json!({"name": name, "port": port}),
    )
}

pub fn vulnerability(id: &str, cve_id: &str, cvss: f64, exploitable: bool) -> NodeRecord {
    NodeRecord::new(
        id,
        "Vulnerability",
        serde_json::json!({"cve_id": cve_id, "cvss_score": cvss, "exploitable": exploitable}),
    )
}

pub fn attack_path(source: &str, target: &str, risk_score: f64) -> AttackPathRecord {
    AttackPathRecord {
        source: source.to_string(),
        target: target.to_string(),
        risk_score,
        step_count: 2,
    }
}

pub fn lateral_chain(techniques: &[&str], risk_score: f64) -> LateralChainRecord {
    LateralChainRecord {
        techniques: techniques.iter().map(|t| t.to_string()).collect(),
        risk_score,
    }
}

pub fn trust_edge(id: &str, source: &str, target: &str) -> EdgeRecord {
    EdgeRecord {
        id: id.to_string(),
        edge_type: "TRUSTS".to_string(),
        source_id: source.to_string(),
        target_id: target.to_string(),
        properties: serde_json::json!({}),
    }
}
