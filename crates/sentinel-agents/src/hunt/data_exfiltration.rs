//! Data exfiltration threat-hunt playbook.
//!
//! Detects large outbound transfers, DNS tunneling indicators, unusual
//! external destinations, and after-hours data movement.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Timelike;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, SentinelError, Severity};
use sentinel_policy::PolicyEngine;

use crate::agent::{Agent, AgentCore};
use crate::error::AgentError;
use crate::hunt::models::{DataExfiltrationConfig, HuntConfig, HuntFinding, PlaybookType};
use crate::hunt::{self, HuntBase, HuntHooks, SiemQuery};
use crate::siem::{QueryResult, Siem};
use crate::tools::ToolRegistry;

const RFC1918_RANGES: &[&str] = &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Hunts for data exfiltration patterns in network logs.
pub struct DataExfiltrationHuntAgent {
    core: AgentCore,
    base: HuntBase,
    config: DataExfiltrationConfig,
}

impl DataExfiltrationHuntAgent {
    pub fn new(
        agent_config: AgentConfig,
        llm: Arc<dyn crate::llm::LlmProvider>,
        tools: Arc<ToolRegistry>,
        siem: Arc<dyn Siem>,
        config: DataExfiltrationConfig,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        Ok(Self {
            core: AgentCore::new(agent_config, llm, tools, policy)?,
            base: HuntBase::new(siem),
            config,
        })
    }

    fn analyze_large_outbound(&self, result: &QueryResult) -> Vec<HuntFinding> {
        let mut dest_bytes: BTreeMap<String, u64> = BTreeMap::new();
        let mut dest_sources: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for event in &result.events {
            let dst = event.dest_ip.clone().unwrap_or_else(|| "unknown".into());
            let src = event.source_ip.clone().unwrap_or_else(|| "unknown".into());
            let bytes = event
                .raw
                .pointer("/network/bytes")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            *dest_bytes.entry(dst.clone()).or_default() += bytes;
            dest_sources.entry(dst).or_default().insert(src);
        }

        let mut findings = Vec::new();
        for (dst_ip, total_bytes) in &dest_bytes {
            if *total_bytes < self.config.large_transfer_bytes {
                continue;
            }
            let sources = dest_sources.get(dst_ip).cloned().unwrap_or_default();
            let source_list: Vec<String> = sources.iter().cloned().collect();
            let mb = *total_bytes as f64 / (1024.0 * 1024.0);

            let mut finding = HuntFinding::new(
                PlaybookType::DataExfiltration,
                Severity::High,
                format!("Large data transfer to {dst_ip} ({mb:.0} MB)"),
                format!(
                    "Total of {mb:.1} MB transferred to external destination {dst_ip} from \
                     {} internal host(s).",
                    sources.len(),
                ),
            );
            finding
                .evidence
                .insert("dest_ips".to_string(), serde_json::json!([dst_ip]));
            finding
                .evidence
                .insert("total_bytes".to_string(), serde_json::json!(total_bytes));
            finding
                .evidence
                .insert("source_hosts".to_string(), serde_json::json!(source_list));
            finding.recommendations = vec![
                format!("Investigate traffic to {dst_ip}"),
                "Check if destination is an authorized service".to_string(),
                "Review DLP policies for sensitive data".to_string(),
            ];
            finding.affected_hosts = source_list;
            finding.mitre_technique_ids = vec!["T1567".to_string()];
            finding.mitre_tactic = "Exfiltration".to_string();
            findings.push(finding);
        }
        findings
    }

    fn analyze_dns_tunneling(&self, result: &QueryResult) -> Option<HuntFinding> {
        let mut long_queries: Vec<String> = Vec::new();
        let mut suspect_hosts: BTreeSet<String> = BTreeSet::new();
        for event in &result.events {
            let name = event
                .raw
                .pointer("/dns/question/name")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if name.len() >= self.config.dns_query_length_threshold {
                long_queries.push(name.to_string());
                if let Some(src) = &event.source_ip {
                    suspect_hosts.insert(src.clone());
                }
            }
        }

        if long_queries.is_empty() {
            return None;
        }

        let host_list: Vec<String> = suspect_hosts.iter().cloned().collect();
        let mut finding = HuntFinding::new(
            PlaybookType::DataExfiltration,
            Severity::High,
            format!("Possible DNS tunneling ({} suspicious queries)", long_queries.len()),
            format!(
                "Detected {} DNS queries with names exceeding {} characters, a common \
                 indicator of DNS tunneling.",
                long_queries.len(),
                self.config.dns_query_length_threshold,
            ),
        );
        finding.evidence.insert(
            "dns_queries".to_string(),
            serde_json::json!(long_queries.iter().take(10).collect::<Vec<_>>()),
        );
        finding
            .evidence
            .insert("source_hosts".to_string(), serde_json::json!(host_list));
        finding.evidence.insert(
            "query_count".to_string(),
            serde_json::json!(long_queries.len()),
        );
        finding.recommendations = vec![
            "Block suspicious DNS domains at resolver".to_string(),
            "Investigate source hosts for malware".to_string(),
            "Deploy DNS monitoring and filtering".to_string(),
        ];
        finding.affected_hosts = host_list;
        finding.mitre_technique_ids = vec!["T1071.004".to_string()];
        finding.mitre_tactic = "Exfiltration".to_string();
        Some(finding)
    }

    fn analyze_after_hours(&self, result: &QueryResult) -> Option<HuntFinding> {
        let mut after_hours_hosts: BTreeSet<String> = BTreeSet::new();
        let mut after_hours_count = 0u64;
        for event in &result.events {
            let Some(timestamp) = event.timestamp else {
                continue;
            };
            let hour = timestamp.hour();
            if hour >= self.config.after_hours_start || hour < self.config.after_hours_end {
                after_hours_count += 1;
                if let Some(src) = &event.source_ip {
                    after_hours_hosts.insert(src.clone());
                }
            }
        }

        if after_hours_count == 0 {
            return None;
        }

        let host_list: Vec<String> = after_hours_hosts.iter().cloned().collect();
        let mut finding = HuntFinding::new(
            PlaybookType::DataExfiltration,
            Severity::Medium,
            format!(
                "After-hours data transfers from {} host(s)",
                after_hours_hosts.len()
            ),
            format!(
                "Detected {after_hours_count} network transfer events outside business hours \
                 ({}:00-{}:00).",
                self.config.after_hours_start, self.config.after_hours_end,
            ),
        );
        finding
            .evidence
            .insert("source_hosts".to_string(), serde_json::json!(host_list));
        finding.evidence.insert(
            "event_count".to_string(),
            serde_json::json!(after_hours_count),
        );
        finding.recommendations = vec![
            "Review after-hours transfer policies".to_string(),
            "Investigate source hosts for scheduled tasks".to_string(),
            "Consider network segmentation for after-hours".to_string(),
        ];
        finding.affected_hosts = host_list;
        finding.mitre_technique_ids = vec!["T1048".to_string()];
        finding.mitre_tactic = "Exfiltration".to_string();
        Some(finding)
    }
}

#[async_trait]
impl Agent for DataExfiltrationHuntAgent {
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
impl HuntHooks for DataExfiltrationHuntAgent {
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
        let mut queries = Vec::new();

        // Q1: large outbound transfers.
        queries.push(SiemQuery::new(
            "large_outbound",
            serde_json::json!({
                "bool": {
                    "must": [
                        {"range": {"network.bytes": {"gte": self.config.large_transfer_bytes}}},
                        time_filter.clone(),
                    ],
                    "must_not": [
                        {"terms": {"destination.ip": ["10.0.0.0/8"]}},
                    ],
                }
            }),
            index,
        ));

        // Q2: DNS tunneling indicators (long query names).
        queries.push(SiemQuery::new(
            "dns_tunneling",
            serde_json::json!({
                "bool": {
                    "must": [
                        {"match": {"event.category": "dns"}},
                        time_filter.clone(),
                    ],
                }
            }),
            index,
        ));

        // Q3: unusual external destinations.
        if self.config.unusual_destination_check {
            queries.push(SiemQuery::new(
                "unusual_destinations",
                serde_json::json!({
                    "bool": {
                        "must": [
                            {"match": {"event.category": "network"}},
                            time_filter.clone(),
                        ],
                        "must_not": [
                            {"terms": {"destination.ip": RFC1918_RANGES}},
                        ],
                    }
                }),
                index,
            ));
        }

        // Q4: after-hours network activity.
        queries.push(SiemQuery::new(
            "after_hours_transfers",
            serde_json::json!({
                "bool": {
                    "must": [
                        {"match": {"event.category": "network"}},
                        {"range": {"network.bytes": {"gte": self.config.large_transfer_bytes / 10}}},
                        time_filter.clone(),
                    ],
                }
            }),
            index,
        ));

        queries
    }

    async fn analyze_results(
        &mut self,
        results: &HashMap<String, QueryResult>,
    ) -> Result<Vec<HuntFinding>, AgentError> {
        let mut findings = Vec::new();

        if let Some(result) = results.get("large_outbound").filter(|r| r.total_hits > 0) {
            findings.extend(self.analyze_large_outbound(result));
        }

        if let Some(result) = results.get("dns_tunneling").filter(|r| r.total_hits > 0) {
            findings.extend(self.analyze_dns_tunneling(result));
        }

        if let Some(result) = results
            .get("after_hours_transfers")
            .filter(|r| r.total_hits > 0)
        {
            findings.extend(self.analyze_after_hours(result));
        }

        Ok(findings)
    }
}
