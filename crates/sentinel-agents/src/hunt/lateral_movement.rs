//! Lateral movement threat-hunt playbook.
//!
//! Detects unusual internal traffic, service account hopping, RDP
//! fan-out, and SMB/WinRM lateral activity.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, SentinelError, Severity};
use sentinel_policy::PolicyEngine;

use crate::agent::{Agent, AgentCore};
use crate::error::AgentError;
use crate::hunt::models::{HuntConfig, HuntFinding, LateralMovementConfig, PlaybookType};
use crate::hunt::{self, HuntBase, HuntHooks, SiemQuery};
use crate::siem::{QueryResult, Siem};
use crate::tools::ToolRegistry;

/// Destination ports considered ordinary for internal traffic.
const COMMON_INTERNAL_PORTS: &[u16] = &[
    22, 53, 80, 88, 135, 389, 443, 445, 636, 3389, 5985, 5986, 8080, 8443,
];

/// Hunts for lateral movement patterns in network and auth logs.
pub struct LateralMovementHuntAgent {
    core: AgentCore,
    base: HuntBase,
    config: LateralMovementConfig,
}

impl LateralMovementHuntAgent {
    pub fn new(
        agent_config: AgentConfig,
        llm: Arc<dyn crate::llm::LlmProvider>,
        tools: Arc<ToolRegistry>,
        siem: Arc<dyn Siem>,
        config: LateralMovementConfig,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        Ok(Self {
            core: AgentCore::new(agent_config, llm, tools, policy)?,
            base: HuntBase::new(siem),
            config,
        })
    }

    fn is_internal(&self, ip: &str) -> bool {
        self.config
            .internal_subnet_prefixes
            .iter()
            .any(|prefix| ip.starts_with(prefix.as_str()))
    }

    fn analyze_service_account_hops(&self, result: &QueryResult) -> Vec<HuntFinding> {
        // Map service accounts to the distinct hosts they reached.
        let mut svc_hosts: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for event in &result.events {
            let user = event.user.clone().unwrap_or_else(|| "unknown".into());
            let host = event
                .hostname
                .clone()
                .or_else(|| event.dest_ip.clone())
                .unwrap_or_else(|| "unknown".into());
            svc_hosts.entry(user).or_default().insert(host);
        }

        let mut findings = Vec::new();
        for (account, hosts) in &svc_hosts {
            if hosts.len() < self.config.service_account_hop_threshold {
                continue;
            }
            let host_list: Vec<String> = hosts.iter().cloned().collect();

            let mut finding = HuntFinding::new(
                PlaybookType::LateralMovement,
                Severity::High,
                format!("Service account {account} active on {} hosts", hosts.len()),
                format!(
                    "Service account '{account}' authenticated to {} distinct hosts: {}. \
                     This may indicate lateral movement using compromised credentials.",
                    hosts.len(),
                    host_list.join(", "),
                ),
            );
            finding
                .evidence
                .insert("source_hosts".to_string(), serde_json::json!(host_list));
            finding
                .evidence
                .insert("dest_hosts".to_string(), serde_json::json!(host_list));
            finding
                .evidence
                .insert("service_account".to_string(), serde_json::json!(account));
            finding
                .evidence
                .insert("host_count".to_string(), serde_json::json!(hosts.len()));
            finding.recommendations = vec![
                format!("Audit all activity by {account}"),
                "Restrict service account to expected hosts".to_string(),
                "Rotate service account credentials".to_string(),
            ];
            finding.affected_hosts = host_list;
            finding.affected_users = vec![account.clone()];
            finding.mitre_technique_ids = vec!["T1021".to_string()];
            finding.mitre_tactic = "Lateral Movement".to_string();
            findings.push(finding);
        }
        findings
    }

    fn analyze_rdp_fanout(&self, result: &QueryResult) -> Vec<HuntFinding> {
        let sources = fanout_by_source(result);

        let mut findings = Vec::new();
        for (src_ip, destinations) in &sources {
            if !self.is_internal(src_ip) || destinations.len() < 2 {
                continue;
            }
            let dest_list: Vec<String> = destinations.iter().cloned().collect();

            let mut finding = HuntFinding::new(
                PlaybookType::LateralMovement,
                Severity::Medium,
                format!("Internal RDP fan-out from {src_ip}"),
                format!(
                    "Host {src_ip} made RDP connections to {} internal hosts: {}.",
                    destinations.len(),
                    dest_list.join(", "),
                ),
            );
            finding
                .evidence
                .insert("source_hosts".to_string(), serde_json::json!([src_ip]));
            finding
                .evidence
                .insert("dest_hosts".to_string(), serde_json::json!(dest_list));
            finding
                .evidence
                .insert("dest_ports".to_string(), serde_json::json!([3389]));
            finding.recommendations = vec![
                format!("Investigate host {src_ip} for compromise"),
                "Review RDP access policies".to_string(),
                "Enable NLA for all RDP endpoints".to_string(),
            ];
            finding.affected_hosts = std::iter::once(src_ip.clone()).chain(dest_list).collect();
            finding.mitre_technique_ids = vec!["T1021.001".to_string()];
            finding.mitre_tactic = "Lateral Movement".to_string();
            findings.push(finding);
        }
        findings
    }

    fn analyze_smb_winrm(&self, result: &QueryResult) -> Vec<HuntFinding> {
        let sources = fanout_by_source(result);

        let mut findings = Vec::new();
        for (src_ip, destinations) in &sources {
            if destinations.len() < self.config.service_account_hop_threshold {
                continue;
            }
            let dest_list: Vec<String> = destinations.iter().cloned().collect();

            let mut finding = HuntFinding::new(
                PlaybookType::LateralMovement,
                Severity::Medium,
                format!("SMB/WinRM fan-out from {src_ip}"),
                format!(
                    "Host {src_ip} made SMB/WinRM connections to {} hosts: {}.",
                    destinations.len(),
                    dest_list.join(", "),
                ),
            );
            finding
                .evidence
                .insert("source_hosts".to_string(), serde_json::json!([src_ip]));
            finding
                .evidence
                .insert("dest_hosts".to_string(), serde_json::json!(dest_list));
            finding
                .evidence
                .insert("dest_ports".to_string(), serde_json::json!([445, 5985]));
            finding.recommendations = vec![
                format!("Investigate host {src_ip} for compromise"),
                "Review SMB/WinRM access controls".to_string(),
            ];
            finding.affected_hosts = std::iter::once(src_ip.clone()).chain(dest_list).collect();
            finding.mitre_technique_ids = vec!["T1021.002".to_string()];
            finding.mitre_tactic = "Lateral Movement".to_string();
            findings.push(finding);
        }
        findings
    }
}

/// Group destination IPs by source IP.
fn fanout_by_source(result: &QueryResult) -> BTreeMap<String, BTreeSet<String>> {
    let mut sources: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for event in &result.events {
        let src = event.source_ip.clone().unwrap_or_else(|| "unknown".into());
        let dst = event.dest_ip.clone().unwrap_or_else(|| "unknown".into());
        sources.entry(src).or_default().insert(dst);
    }
    sources
}

#[async_trait]
impl Agent for LateralMovementHuntAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn plan(
        &mut self,
        intent: &str,
        context: &serde_json::Value,
    ) -> Result<AgentPlan, AgentError> {
        hunt::plan_hunt(self, intent, context).await
    }

    async fn execute(&mut self, plan: &AgentPlan) -> Result<AgentResult, AgentError> {
        hunt::execute_hunt(self, plan).await
    }
}

#[async_trait]
impl HuntHooks for LateralMovementHuntAgent {
    fn hunt_base(&self) -> &HuntBase {
        &self.base
    }

    fn hunt_base_mut(&mut self) -> &mut HuntBase {
        &mut self.base
    }

    fn hunt_config(&self) -> &HuntConfig {
        &self.config.hunt
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn build_queries(&self, _plan: &AgentPlan) -> Vec<SiemQuery> {
        let time_filter = hunt::time_filter(&self.config.hunt);
        let index = &self.config.hunt.index_pattern;

        vec![
            // Q1: internal RDP connections (port 3389).
            SiemQuery::new(
                "internal_rdp",
                serde_json::json!({
                    "bool": {
                        "must": [
                            {"term": {"destination.port": 3389}},
                            time_filter.clone(),
                        ],
                    }
                }),
                index,
            ),
            // Q2: service account authentication across hosts.
            SiemQuery::new(
                "service_account_hops",
                serde_json::json!({
                    "bool": {
                        "must": [
                            {"wildcard": {"user.name": "svc-*"}},
                            {"match": {"event.category": "authentication"}},
                            {"match": {"event.outcome": "success"}},
                            time_filter.clone(),
                        ],
                    }
                }),
                index,
            ),
            // Q3: SMB/WinRM lateral connections.
            SiemQuery::new(
                "smb_winrm",
                serde_json::json!({
                    "bool": {
                        "must": [
                            {"terms": {"destination.port": [445, 5985, 5986]}},
                            time_filter.clone(),
                        ],
                    }
                }),
                index,
            ),
            // Q4: unusual internal port connections.
            SiemQuery::new(
                "unusual_internal_ports",
                serde_json::json!({
                    "bool": {
                        "must": [time_filter],
                        "must_not": [
                            {"terms": {"destination.port": COMMON_INTERNAL_PORTS}},
                        ],
                    }
                }),
                index,
            ),
        ]
    }

    async fn analyze_results(
        &mut self,
        results: &HashMap<String, QueryResult>,
    ) -> Result<Vec<HuntFinding>, AgentError> {
        let mut findings = Vec::new();

        if let Some(result) = results
            .get("service_account_hops")
            .filter(|r| r.total_hits > 0)
        {
            findings.extend(self.analyze_service_account_hops(result));
        }

        if let Some(result) = results.get("internal_rdp").filter(|r| r.total_hits > 0) {
            findings.extend(self.analyze_rdp_fanout(result));
        }

        if let Some(result) = results.get("smb_winrm").filter(|r| r.total_hits > 0) {
            findings.extend(self.analyze_smb_winrm(result));
        }

        Ok(findings)
    }
}
