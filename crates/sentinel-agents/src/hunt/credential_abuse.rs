//! Credential abuse threat-hunt playbook.
//!
//! Detects brute-force login attempts, credential stuffing, service
//! account misuse, and account lockout patterns in authentication logs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, SentinelError, Severity};
use sentinel_policy::PolicyEngine;

use crate::agent::{Agent, AgentCore};
use crate::error::AgentError;
use crate::hunt::models::{CredentialAbuseConfig, HuntConfig, HuntFinding, PlaybookType};
use crate::hunt::{self, HuntBase, HuntHooks, SiemQuery};
use crate::llm::LlmMessage;
use crate::siem::{QueryResult, Siem};
use crate::tools::ToolRegistry;

/// Hunts for credential abuse patterns in authentication logs.
pub struct CredentialAbuseHuntAgent {
    core: AgentCore,
    base: HuntBase,
    config: CredentialAbuseConfig,
}

impl CredentialAbuseHuntAgent {
    pub fn new(
        agent_config: AgentConfig,
        llm: Arc<dyn crate::llm::LlmProvider>,
        tools: Arc<ToolRegistry>,
        siem: Arc<dyn Siem>,
        config: CredentialAbuseConfig,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        Ok(Self {
            core: AgentCore::new(agent_config, llm, tools, policy)?,
            base: HuntBase::new(siem),
            config,
        })
    }

    fn analyze_failed_logins(&self, result: &QueryResult) -> Vec<HuntFinding> {
        let mut findings = Vec::new();

        let mut ip_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut ip_users: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for event in &result.events {
            let ip = event.source_ip.clone().unwrap_or_else(|| "unknown".into());
            let user = event.user.clone().unwrap_or_else(|| "unknown".into());
            *ip_counts.entry(ip.clone()).or_default() += 1;
            ip_users.entry(ip).or_default().insert(user);
        }

        // Brute force: IPs exceeding the failure threshold.
        for (ip, count) in &ip_counts {
            if *count < self.config.failed_login_threshold {
                continue;
            }
            let users = ip_users.get(ip).cloned().unwrap_or_default();
            let severity = if *count > self.config.failed_login_threshold * 3 {
                Severity::High
            } else {
                Severity::Medium
            };

            let mut finding = HuntFinding::new(
                PlaybookType::CredentialAbuse,
                severity,
                format!("Excessive failed logins from {ip}"),
                format!(
                    "Source IP {ip} had {count} failed login attempts targeting {} unique \
                     user(s) in the last {} hours.",
                    users.len(),
                    self.config.hunt.time_window_hours,
                ),
            );
            finding
                .evidence
                .insert("source_ips".to_string(), serde_json::json!([ip]));
            finding
                .evidence
                .insert("failed_count".to_string(), serde_json::json!(count));
            finding
                .evidence
                .insert("target_users".to_string(), serde_json::json!(users));
            finding
                .evidence
                .insert("event_ids".to_string(), serde_json::json!(["4625"]));
            finding.recommendations = vec![
                format!("Block IP {ip} at the perimeter firewall"),
                "Enable account lockout policies if not set".to_string(),
                "Review affected accounts for compromise".to_string(),
            ];
            finding.affected_users = users.into_iter().collect();
            finding.mitre_technique_ids = vec!["T1110.001".to_string()];
            finding.mitre_tactic = "Credential Access".to_string();
            findings.push(finding);
        }

        // Credential stuffing: one IP targeting many distinct users.
        for (ip, users) in &ip_users {
            if users.len() < self.config.credential_stuffing_unique_users {
                continue;
            }

            let mut finding = HuntFinding::new(
                PlaybookType::CredentialAbuse,
                Severity::High,
                format!("Potential credential stuffing from {ip}"),
                format!(
                    "Source IP {ip} attempted logins against {} unique accounts, indicating \
                     possible credential stuffing attack.",
                    users.len(),
                ),
            );
            finding
                .evidence
                .insert("source_ips".to_string(), serde_json::json!([ip]));
            finding
                .evidence
                .insert("target_users".to_string(), serde_json::json!(users));
            finding
                .evidence
                .insert("unique_user_count".to_string(), serde_json::json!(users.len()));
            finding.recommendations = vec![
                format!("Block IP {ip} immediately"),
                "Force password reset for targeted accounts".to_string(),
                "Enable MFA for all affected accounts".to_string(),
                "Check credentials against breach databases".to_string(),
            ];
            finding.affected_users = users.iter().cloned().collect();
            finding.mitre_technique_ids = vec!["T1110.004".to_string()];
            finding.mitre_tactic = "Credential Access".to_string();
            findings.push(finding);
        }

        findings
    }

    fn analyze_service_accounts(&self, result: &QueryResult) -> Option<HuntFinding> {
        let svc_accounts: BTreeSet<String> = result
            .events
            .iter()
            .filter_map(|e| e.user.clone())
            .collect();
        if svc_accounts.is_empty() {
            return None;
        }

        let names: Vec<String> = svc_accounts.iter().cloned().collect();
        let mut finding = HuntFinding::new(
            PlaybookType::CredentialAbuse,
            Severity::Critical,
            "Service account authentication failures",
            format!(
                "Service accounts {} experienced authentication failures. Service accounts \
                 should never fail in normal operations.",
                names.join(", "),
            ),
        );
        finding
            .evidence
            .insert("target_users".to_string(), serde_json::json!(names));
        finding.evidence.insert(
            "total_failures".to_string(),
            serde_json::json!(result.total_hits),
        );
        finding.recommendations = vec![
            "Immediately rotate affected service account credentials".to_string(),
            "Audit recent activity of these service accounts".to_string(),
            "Review service account permissions for least-privilege".to_string(),
        ];
        finding.affected_users = names;
        finding.mitre_technique_ids = vec!["T1110".to_string()];
        finding.mitre_tactic = "Credential Access".to_string();
        Some(finding)
    }

    /// Ask the LLM for subtler patterns (low-and-slow spraying, timing).
    ///
    /// Unparseable output yields no extra findings rather than an error.
    async fn llm_analyze(
        &self,
        results: &HashMap<String, QueryResult>,
    ) -> Result<Vec<HuntFinding>, AgentError> {
        let mut summary_data = serde_json::Map::new();
        for (name, result) in results {
            let sample_events: Vec<serde_json::Value> = result
                .events
                .iter()
                .take(20)
                .map(|e| {
                    serde_json::json!({
                        "timestamp": e.timestamp.map(|t| t.to_rfc3339()),
                        "source_ip": e.source_ip,
                        "user": e.user,
                        "hostname": e.hostname,
                    })
                })
                .collect();
            summary_data.insert(
                name.clone(),
                serde_json::json!({
                    "total_hits": result.total_hits,
                    "sample_events": sample_events,
                }),
            );
        }

        let prompt = format!(
            "Analyze these SIEM query results for credential abuse patterns.\n\
             Look for: time-based patterns, password spraying (low-and-slow), unusual user \
             agents.\n\n\
             Data: {}\n\n\
             Return a JSON object with 'findings' array. Each finding: severity, title, \
             description, mitre_technique_ids, affected_users (arrays of strings).",
            serde_json::Value::Object(summary_data),
        );

        let response = self
            .core
            .llm
            .complete(
                &[LlmMessage::user(prompt)],
                Some("You are a SOC analyst specializing in credential abuse."),
                1024,
            )
            .await?;

        let Ok(data) = serde_json::from_str::<serde_json::Value>(&response.content) else {
            return Ok(Vec::new());
        };
        let Some(raw_findings) = data.get("findings").and_then(|f| f.as_array()) else {
            return Ok(Vec::new());
        };

        let findings = raw_findings
            .iter()
            .map(|f| {
                let severity = f
                    .get("severity")
                    .and_then(|s| s.as_str())
                    .and_then(|s| serde_json::from_value(serde_json::json!(s)).ok())
                    .unwrap_or(Severity::Medium);
                let mut finding = HuntFinding::new(
                    PlaybookType::CredentialAbuse,
                    severity,
                    f.get("title")
                        .and_then(|t| t.as_str())
                        .unwrap_or("LLM-identified pattern"),
                    f.get("description").and_then(|d| d.as_str()).unwrap_or(""),
                );
                finding.mitre_technique_ids = string_list(f.get("mitre_technique_ids"));
                finding.affected_users = string_list(f.get("affected_users"));
                finding.mitre_tactic = "Credential Access".to_string();
                finding
            })
            .collect();
        Ok(findings)
    }
}

fn string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Agent for CredentialAbuseHuntAgent {
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
impl HuntHooks for CredentialAbuseHuntAgent {
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

        // Q1: all failed authentication events.
        queries.push(SiemQuery::new(
            "failed_logins_by_ip",
            serde_json::json!({
                "bool": {
                    "must": [
                        {"match": {"event.outcome": "failure"}},
                        {"match": {"event.category": "authentication"}},
                        time_filter.clone(),
                    ],
                }
            }),
            index,
        ));

        // Q2: account lockout events (Windows 4740 / 4625).
        if self.config.lockout_correlation {
            queries.push(SiemQuery::new(
                "account_lockouts",
                serde_json::json!({
                    "bool": {
                        "must": [
                            {"terms": {"event.code": ["4740", "4625"]}},
                            time_filter.clone(),
                        ],
                    }
                }),
                index,
            ));
        }

        // Q3: service account authentication failures.
        if self.config.service_account_monitoring {
            queries.push(SiemQuery::new(
                "service_account_failures",
                serde_json::json!({
                    "bool": {
                        "must": [
                            {"match": {"event.outcome": "failure"}},
                            {"match": {"event.category": "authentication"}},
                            {"wildcard": {"user.name": "svc-*"}},
                            time_filter.clone(),
                        ],
                    }
                }),
                index,
            ));
        }

        queries
    }

    async fn analyze_results(
        &mut self,
        results: &HashMap<String, QueryResult>,
    ) -> Result<Vec<HuntFinding>, AgentError> {
        let mut findings = Vec::new();

        let failed_logins = results
            .get("failed_logins_by_ip")
            .filter(|r| r.total_hits > 0);
        if let Some(result) = failed_logins {
            findings.extend(self.analyze_failed_logins(result));
        }

        if let Some(result) = results
            .get("service_account_failures")
            .filter(|r| r.total_hits > 0)
        {
            findings.extend(self.analyze_service_accounts(result));
        }

        if failed_logins.is_some() {
            findings.extend(self.llm_analyze(results).await?);
        }

        Ok(findings)
    }
}
