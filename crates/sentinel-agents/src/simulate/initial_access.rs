//! Initial access adversarial simulation playbook.
//!
//! Evaluates exploit of public-facing applications (T1190), external
//! remote services (T1133), phishing vectors (T1566), valid accounts
//! (T1078), and trusted relationships (T1199).

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, EdgeType, SentinelError, Severity};
use sentinel_policy::PolicyEngine;

use crate::agent::{Agent, AgentCore};
use crate::error::AgentError;
use crate::simulate::graph::{AttackPathQuery, GraphReader};
use crate::simulate::mitre::{filter_techniques, MitreTechnique};
use crate::simulate::models::{
    compute_risk_score, Effort, InitialAccessConfig, RemediationStep, SimConfig,
    SimulationFinding, TacticType,
};
use crate::simulate::{self, GraphContext, SimBase, SimHooks};
use crate::tools::ToolRegistry;

const REMOTE_SERVICE_PORTS: &[u64] = &[22, 3389, 5900, 5985];

/// Simulates initial access techniques against the digital twin.
pub struct InitialAccessSimAgent {
    core: AgentCore,
    base: SimBase,
    config: InitialAccessConfig,
}

impl InitialAccessSimAgent {
    pub fn new(
        agent_config: AgentConfig,
        llm: Arc<dyn crate::llm::LlmProvider>,
        tools: Arc<ToolRegistry>,
        graph: Arc<dyn GraphReader>,
        config: InitialAccessConfig,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        Ok(Self {
            core: AgentCore::new(agent_config, llm, tools, policy)?,
            base: SimBase::new(graph),
            config,
        })
    }

    fn path_query(&self, sources: Vec<String>, targets: Vec<String>) -> AttackPathQuery {
        AttackPathQuery {
            sources,
            targets,
            max_depth: self.config.sim.max_depth,
            max_paths: self.config.sim.max_paths,
            include_lateral: false,
            include_blast: false,
        }
    }

    // ── T1190: Exploit Public-Facing Application ────────────────

    async fn sim_t1190(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();
        let mut findings = Vec::new();

        for host in context
            .hosts
            .iter()
            .filter(|h| h.prop_bool("is_internet_facing"))
        {
            let neighbors = graph
                .query_neighbors(
                    &host.id,
                    &context.tenant_id,
                    &[EdgeType::Exposes, EdgeType::HasCve],
                    &[],
                    100,
                )
                .await?;
            let exploitable: Vec<_> = neighbors
                .iter()
                .filter(|n| n.label == "Vulnerability" && n.prop_bool("exploitable"))
                .collect();
            if exploitable.is_empty() {
                continue;
            }

            let report = graph
                .find_attack_paths(
                    &context.tenant_id,
                    &self.path_query(vec![host.id.clone()], Vec::new()),
                )
                .await?;
            let path_risk = report
                .attack_paths
                .iter()
                .map(|p| p.risk_score)
                .fold(0.0_f64, f64::max);

            let cve_ids: Vec<String> = exploitable
                .iter()
                .map(|v| v.prop_str("cve_id").unwrap_or("unknown").to_string())
                .collect();

            let mut finding = SimulationFinding::new(
                technique,
                Severity::Critical,
                format!(
                    "Exploitable public-facing service on {}",
                    host.name_or_id("hostname")
                ),
                format!(
                    "Internet-facing host {} has {} exploitable vulnerabilities ({}). \
                     {} attack path(s) found.",
                    host.name_or_id("hostname"),
                    exploitable.len(),
                    cve_ids.join(", "),
                    report.attack_paths.len(),
                ),
            );
            finding.risk_score = compute_risk_score(path_risk, Severity::Critical, 0.0);
            finding
                .evidence
                .insert("cve_ids".to_string(), serde_json::json!(cve_ids));
            finding
                .evidence
                .insert("host_id".to_string(), serde_json::json!(host.id));
            finding.evidence.insert(
                "paths_count".to_string(),
                serde_json::json!(report.attack_paths.len()),
            );
            finding.attack_paths = report.attack_paths;
            finding.affected_nodes = vec![host.id.clone()];
            finding.remediation = vec![
                RemediationStep::new(
                    &format!(
                        "Patch {}",
                        cve_ids.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
                    ),
                    "Apply security patches for exploitable CVEs",
                    Severity::Critical,
                    Effort::Medium,
                ),
                RemediationStep::new(
                    "Deploy WAF",
                    "Add web application firewall in front of exposed services",
                    Severity::High,
                    Effort::Medium,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }

    // ── T1133: External Remote Services ─────────────────────────

    async fn sim_t1133(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();
        let mut findings = Vec::new();

        for host in context
            .hosts
            .iter()
            .filter(|h| h.prop_bool("is_internet_facing"))
        {
            let neighbors = graph
                .query_neighbors(
                    &host.id,
                    &context.tenant_id,
                    &[EdgeType::HasAccess, EdgeType::Exposes],
                    &[],
                    100,
                )
                .await?;

            let remote_ports: Vec<u64> = neighbors
                .iter()
                .filter_map(|n| n.prop_u64("port"))
                .filter(|port| REMOTE_SERVICE_PORTS.contains(port))
                .collect();
            if remote_ports.is_empty() {
                continue;
            }
            let no_mfa_users = neighbors
                .iter()
                .filter(|n| n.label == "User" && !n.prop_bool("mfa_enabled"))
                .count();

            let port_names: Vec<String> =
                remote_ports.iter().map(|p| p.to_string()).collect();
            let mut finding = SimulationFinding::new(
                technique,
                Severity::High,
                format!("Exposed remote services on {}", host.name_or_id("hostname")),
                format!(
                    "Internet-facing host exposes remote services on ports {}. \
                     {no_mfa_users} user(s) without MFA.",
                    port_names.join(", "),
                ),
            );
            finding.risk_score = compute_risk_score(0.5, Severity::High, 0.0);
            finding
                .evidence
                .insert("exposed_ports".to_string(), serde_json::json!(remote_ports));
            finding.evidence.insert(
                "no_mfa_user_count".to_string(),
                serde_json::json!(no_mfa_users),
            );
            finding.affected_nodes = vec![host.id.clone()];
            finding.remediation = vec![
                RemediationStep::new(
                    "Enable MFA for all remote access",
                    "Require multi-factor authentication for RDP/SSH/VNC",
                    Severity::Critical,
                    Effort::Low,
                ),
                RemediationStep::new(
                    "Restrict source IPs",
                    "Limit remote service access to known IP ranges",
                    Severity::High,
                    Effort::Low,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }

    // ── T1566: Phishing ─────────────────────────────────────────

    async fn sim_t1566(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();

        let no_mfa_users: Vec<_> = context
            .users
            .iter()
            .filter(|u| u.prop_str("user_type") == Some("human") && !u.prop_bool("mfa_enabled"))
            .collect();
        if no_mfa_users.is_empty() {
            return Ok(Vec::new());
        }

        let mut exposed_users: Vec<serde_json::Value> = Vec::new();
        let mut affected: Vec<String> = Vec::new();
        for user in &no_mfa_users {
            let neighbors = graph
                .query_neighbors(
                    &user.id,
                    &context.tenant_id,
                    &[EdgeType::HasAccess],
                    &[],
                    100,
                )
                .await?;
            let critical_hosts = neighbors
                .iter()
                .filter(|n| matches!(n.prop_str("criticality"), Some("critical") | Some("high")))
                .count();
            if critical_hosts > 0 {
                affected.push(user.id.clone());
                exposed_users.push(serde_json::json!({
                    "user_id": user.id,
                    "username": user.prop_str("username").unwrap_or("unknown"),
                    "critical_host_count": critical_hosts,
                }));
            }
        }

        if exposed_users.is_empty() {
            return Ok(Vec::new());
        }

        let severity = if exposed_users.len() > 3 {
            Severity::High
        } else {
            Severity::Medium
        };
        let mut finding = SimulationFinding::new(
            technique,
            severity,
            format!(
                "{} phishing-vulnerable user(s) with critical access",
                exposed_users.len()
            ),
            format!(
                "{} user(s) without MFA have access to critical systems, making them viable \
                 phishing targets.",
                exposed_users.len(),
            ),
        );
        finding.risk_score = compute_risk_score(0.6, severity, 0.0);
        finding
            .evidence
            .insert("users".to_string(), serde_json::json!(exposed_users));
        finding.evidence.insert(
            "total_no_mfa".to_string(),
            serde_json::json!(no_mfa_users.len()),
        );
        finding.affected_nodes = affected;
        finding.remediation = vec![
            RemediationStep::new(
                "Enable MFA",
                "Require MFA for all users with critical system access",
                Severity::Critical,
                Effort::Low,
            ),
            RemediationStep::new(
                "Security awareness training",
                "Conduct phishing awareness training for affected users",
                Severity::High,
                Effort::Medium,
            ),
        ];
        Ok(vec![finding])
    }

    // ── T1078: Valid Accounts ───────────────────────────────────

    async fn sim_t1078(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();
        let mut findings = Vec::new();

        for svc in context
            .users
            .iter()
            .filter(|u| u.prop_str("user_type") == Some("service_account"))
        {
            let neighbors = graph
                .query_neighbors(
                    &svc.id,
                    &context.tenant_id,
                    &[EdgeType::HasAccess],
                    &[],
                    100,
                )
                .await?;
            if neighbors.len() < 5 {
                continue;
            }

            let mut finding = SimulationFinding::new(
                technique,
                Severity::High,
                format!(
                    "Overprivileged service account {}",
                    svc.name_or_id("username")
                ),
                format!(
                    "Service account '{}' has access to {} resources. Compromising it \
                     grants broad lateral access.",
                    svc.name_or_id("username"),
                    neighbors.len(),
                ),
            );
            finding.risk_score = compute_risk_score(0.5, Severity::High, 0.0);
            finding.evidence.insert(
                "username".to_string(),
                serde_json::json!(svc.prop_str("username")),
            );
            finding.evidence.insert(
                "access_count".to_string(),
                serde_json::json!(neighbors.len()),
            );
            finding.affected_nodes = vec![svc.id.clone()];
            finding.remediation = vec![
                RemediationStep::new(
                    "Apply least privilege",
                    "Restrict service account to minimum required access",
                    Severity::High,
                    Effort::Medium,
                ),
                RemediationStep::new(
                    "Rotate credentials",
                    "Rotate service account credentials regularly",
                    Severity::Medium,
                    Effort::Low,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }

    // ── T1199: Trusted Relationship ─────────────────────────────

    async fn sim_t1199(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();

        let trust_edges = graph
            .query_edges(&context.tenant_id, Some(EdgeType::Trusts), None, None, 200)
            .await?;
        if trust_edges.is_empty() {
            return Ok(Vec::new());
        }

        let affected: BTreeSet<String> = trust_edges
            .iter()
            .flat_map(|e| [e.source_id.clone(), e.target_id.clone()])
            .collect();

        let sources: Vec<String> = trust_edges.iter().map(|e| e.source_id.clone()).collect();
        let report = graph
            .find_attack_paths(&context.tenant_id, &self.path_query(sources, Vec::new()))
            .await?;
        let path_risk = report
            .attack_paths
            .iter()
            .map(|p| p.risk_score)
            .fold(0.0_f64, f64::max);

        let mut finding = SimulationFinding::new(
            technique,
            Severity::Medium,
            format!(
                "{} trust relationship(s) detected across boundaries",
                trust_edges.len()
            ),
            format!(
                "Found {} TRUSTS edge(s) that may enable lateral movement across security \
                 boundaries. {} attack path(s) found.",
                trust_edges.len(),
                report.attack_paths.len(),
            ),
        );
        finding.risk_score = compute_risk_score(path_risk, Severity::Medium, 0.0);
        finding.evidence.insert(
            "trust_count".to_string(),
            serde_json::json!(trust_edges.len()),
        );
        finding.evidence.insert(
            "paths_count".to_string(),
            serde_json::json!(report.attack_paths.len()),
        );
        finding.attack_paths = report.attack_paths;
        finding.affected_nodes = affected.into_iter().collect();
        finding.remediation = vec![
            RemediationStep::new(
                "Review trust boundaries",
                "Audit all trust relationships for necessity",
                Severity::Medium,
                Effort::Medium,
            ),
            RemediationStep::new(
                "Implement zero-trust segmentation",
                "Replace implicit trust with explicit verification",
                Severity::High,
                Effort::High,
            ),
        ];
        Ok(vec![finding])
    }
}

#[async_trait]
impl Agent for InitialAccessSimAgent {
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
        simulate::plan_simulation(self, intent, context).await
    }

    async fn execute(&mut self, plan: &AgentPlan) -> Result<AgentResult, AgentError> {
        simulate::execute_simulation(self, plan).await
    }
}

#[async_trait]
impl SimHooks for InitialAccessSimAgent {
    fn sim_base(&self) -> &SimBase {
        &self.base
    }

    fn sim_base_mut(&mut self) -> &mut SimBase {
        &mut self.base
    }

    fn sim_config(&self) -> &SimConfig {
        &self.config.sim
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn select_techniques(&self, _plan: &AgentPlan) -> Vec<MitreTechnique> {
        filter_techniques(TacticType::InitialAccess, &self.config.sim.techniques)
    }

    async fn simulate_technique(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        match technique.technique_id.as_str() {
            "T1190" => self.sim_t1190(technique, context).await,
            "T1133" => self.sim_t1133(technique, context).await,
            "T1566" => self.sim_t1566(technique, context).await,
            "T1078" => self.sim_t1078(technique, context).await,
            "T1199" => self.sim_t1199(technique, context).await,
            _ => Ok(Vec::new()),
        }
    }
}
