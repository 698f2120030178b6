//! Lateral movement adversarial simulation playbook.
//!
//! Evaluates RDP chains (T1021.001), SSH chains (T1021.004), pass the
//! hash (T1550.002), Kerberos ticket theft (T1558), and domain trust
//! discovery (T1482).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, EdgeType, SentinelError, Severity};
use sentinel_policy::PolicyEngine;

use crate::agent::{Agent, AgentCore};
use crate::error::AgentError;
use crate::simulate::graph::{AttackPathQuery, GraphReader, LateralChainRecord};
use crate::simulate::mitre::{filter_techniques, MitreTechnique};
use crate::simulate::models::{
    compute_risk_score, Effort, LateralMovementSimConfig, RemediationStep, SimConfig,
    SimulationFinding, TacticType,
};
use crate::simulate::{self, GraphContext, SimBase, SimHooks};
use crate::tools::ToolRegistry;

/// Simulates lateral movement techniques against the digital twin.
pub struct LateralMovementSimAgent {
    core: AgentCore,
    base: SimBase,
    config: LateralMovementSimConfig,
}

impl LateralMovementSimAgent {
    pub fn new(
        agent_config: AgentConfig,
        llm: Arc<dyn crate::llm::LlmProvider>,
        tools: Arc<ToolRegistry>,
        graph: Arc<dyn GraphReader>,
        config: LateralMovementSimConfig,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        Ok(Self {
            core: AgentCore::new(agent_config, llm, tools, policy)?,
            base: SimBase::new(graph),
            config,
        })
    }

    /// Lateral chains whose per-hop technique mentions the given protocol.
    async fn protocol_chains(
        &self,
        context: &GraphContext,
        protocol: &str,
    ) -> Result<Vec<LateralChainRecord>, AgentError> {
        let report = self
            .base
            .graph
            .find_attack_paths(
                &context.tenant_id,
                &AttackPathQuery {
                    sources: Vec::new(),
                    targets: Vec::new(),
                    max_depth: self.config.sim.max_depth,
                    max_paths: self.config.sim.max_paths,
                    include_lateral: true,
                    include_blast: false,
                },
            )
            .await?;
        Ok(report
            .lateral_chains
            .into_iter()
            .filter(|c| c.techniques.iter().any(|t| t.to_lowercase().contains(protocol)))
            .collect())
    }

    /// Shared body of the RDP and SSH chain techniques.
    async fn sim_remote_protocol(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
        protocol: &str,
        port: u64,
        remediation: Vec<RemediationStep>,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let services: Vec<_> = context
            .services
            .iter()
            .filter(|s| s.prop_u64("port") == Some(port))
            .collect();
        if services.is_empty() {
            return Ok(Vec::new());
        }

        let chains = self.protocol_chains(context, protocol).await?;
        if chains.is_empty() {
            return Ok(Vec::new());
        }

        let max_risk = chains
            .iter()
            .map(|c| c.risk_score)
            .fold(0.0_f64, f64::max);
        let affected: BTreeSet<String> = services
            .iter()
            .map(|s| s.prop_str("host_id").unwrap_or(&s.id).to_string())
            .collect();
        let upper = protocol.to_uppercase();

        let mut finding = SimulationFinding::new(
            technique,
            Severity::High,
            format!("{} {upper} lateral chain(s) found", chains.len()),
            format!(
                "Detected {} {upper} lateral movement chain(s) across {} host(s) with \
                 {upper} enabled.",
                chains.len(),
                services.len(),
            ),
        );
        finding.risk_score = compute_risk_score(max_risk, Severity::High, 0.0);
        finding
            .evidence
            .insert("chain_count".to_string(), serde_json::json!(chains.len()));
        finding.evidence.insert(
            format!("{protocol}_host_count"),
            serde_json::json!(services.len()),
        );
        finding.affected_nodes = affected.into_iter().collect();
        finding.remediation = remediation;
        Ok(vec![finding])
    }

    // ── T1550.002: Pass the Hash ────────────────────────────────

    async fn sim_pass_the_hash(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();
        let mut findings = Vec::new();

        for user in &context.users {
            let neighbors = graph
                .query_neighbors(
                    &user.id,
                    &context.tenant_id,
                    &[EdgeType::HasAccess],
                    &[],
                    100,
                )
                .await?;
            let admin_hosts: Vec<_> = neighbors
                .iter()
                .filter(|n| {
                    n.prop_str_list("permissions")
                        .iter()
                        .any(|p| p.to_lowercase().contains("admin"))
                })
                .collect();
            if admin_hosts.len() < 2 {
                continue;
            }

            let blast = graph
                .compute_blast_radius(
                    &context.tenant_id,
                    &user.id,
                    5,
                    self.config.sim.min_exploitability,
                )
                .await?;

            let mut finding = SimulationFinding::new(
                technique,
                Severity::Critical,
                format!(
                    "Pass-the-hash risk: {} admin on {} hosts",
                    user.name_or_id("username"),
                    admin_hosts.len(),
                ),
                format!(
                    "User '{}' has admin access to {} hosts. Credential compromise enables \
                     wide lateral movement.",
                    user.name_or_id("username"),
                    admin_hosts.len(),
                ),
            );
            finding.risk_score =
                compute_risk_score(0.7, Severity::Critical, blast.blast_score);
            finding.evidence.insert(
                "username".to_string(),
                serde_json::json!(user.prop_str("username")),
            );
            finding.evidence.insert(
                "admin_host_count".to_string(),
                serde_json::json!(admin_hosts.len()),
            );
            finding.evidence.insert(
                "blast_score".to_string(),
                serde_json::json!(blast.blast_score),
            );
            finding.affected_nodes = std::iter::once(user.id.clone())
                .chain(admin_hosts.iter().map(|h| h.id.clone()))
                .collect();
            finding.blast_radius = Some(blast);
            finding.remediation = vec![
                RemediationStep::new(
                    "Implement LAPS",
                    "Deploy Local Administrator Password Solution",
                    Severity::Critical,
                    Effort::Medium,
                ),
                RemediationStep::new(
                    "Enable Credential Guard",
                    "Enable Windows Credential Guard to protect hashes",
                    Severity::High,
                    Effort::Medium,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }

    // ── T1558: Kerberos Tickets ─────────────────────────────────

    async fn sim_kerberos(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();
        let mut findings = Vec::new();

        for user in &context.users {
            let neighbors = graph
                .query_neighbors(
                    &user.id,
                    &context.tenant_id,
                    &[EdgeType::MemberOf, EdgeType::HasAccess],
                    &[],
                    100,
                )
                .await?;

            let privileged_groups: Vec<String> = neighbors
                .iter()
                .filter(|n| {
                    n.label == "Group"
                        && n.prop_str("name").is_some_and(|name| {
                            let lower = name.to_lowercase();
                            ["admin", "domain", "enterprise"]
                                .iter()
                                .any(|kw| lower.contains(kw))
                        })
                })
                .filter_map(|n| n.prop_str("name").map(str::to_string))
                .collect();
            let dc_access: Vec<_> = neighbors
                .iter()
                .filter(|n| {
                    n.label == "Host"
                        && n.prop_str("hostname")
                            .is_some_and(|h| h.to_lowercase().contains("dc"))
                })
                .collect();

            if privileged_groups.is_empty() || dc_access.is_empty() {
                continue;
            }

            let mut finding = SimulationFinding::new(
                technique,
                Severity::Critical,
                format!("Kerberos ticket risk: {}", user.name_or_id("username")),
                format!(
                    "User '{}' is in privileged group(s) and has access to domain \
                     controller(s). Kerberoasting or golden ticket attacks are viable.",
                    user.name_or_id("username"),
                ),
            );
            finding.risk_score = compute_risk_score(0.8, Severity::Critical, 0.0);
            finding.evidence.insert(
                "username".to_string(),
                serde_json::json!(user.prop_str("username")),
            );
            finding.evidence.insert(
                "privileged_groups".to_string(),
                serde_json::json!(privileged_groups),
            );
            finding
                .evidence
                .insert("dc_count".to_string(), serde_json::json!(dc_access.len()));
            finding.affected_nodes = std::iter::once(user.id.clone())
                .chain(dc_access.iter().map(|h| h.id.clone()))
                .collect();
            finding.remediation = vec![
                RemediationStep::new(
                    "Rotate KRBTGT",
                    "Rotate the KRBTGT account password twice",
                    Severity::Critical,
                    Effort::Low,
                ),
                RemediationStep::new(
                    "Monitor Kerberos anomalies",
                    "Enable detection for unusual ticket requests",
                    Severity::High,
                    Effort::Medium,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }

    // ── T1482: Domain Trust Discovery ───────────────────────────

    async fn sim_domain_trust(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let trust_edges = self
            .base
            .graph
            .query_edges(&context.tenant_id, Some(EdgeType::Trusts), None, None, 200)
            .await?;
        if trust_edges.len() < 2 {
            return Ok(Vec::new());
        }

        // Transitive chain: the target of one trust is the source of another.
        let mut trust_targets: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in &trust_edges {
            trust_targets
                .entry(edge.source_id.as_str())
                .or_default()
                .push(edge.target_id.as_str());
        }
        let transitive_hops = trust_targets
            .values()
            .flatten()
            .filter(|target| trust_targets.contains_key(**target))
            .count();

        if transitive_hops == 0 {
            return Ok(Vec::new());
        }

        let affected: BTreeSet<String> = trust_edges
            .iter()
            .flat_map(|e| [e.source_id.clone(), e.target_id.clone()])
            .collect();

        let mut finding = SimulationFinding::new(
            technique,
            Severity::Medium,
            format!("Transitive trust chains: {transitive_hops} hop(s) detected"),
            format!(
                "Found {} trust relationship(s) with {transitive_hops} transitive hop(s). \
                 Attackers can traverse trust boundaries.",
                trust_edges.len(),
            ),
        );
        finding.risk_score = compute_risk_score(0.5, Severity::Medium, 0.0);
        finding.evidence.insert(
            "trust_count".to_string(),
            serde_json::json!(trust_edges.len()),
        );
        finding.evidence.insert(
            "transitive_hops".to_string(),
            serde_json::json!(transitive_hops),
        );
        finding.affected_nodes = affected.into_iter().collect();
        finding.remediation = vec![
            RemediationStep::new(
                "Enable SID filtering",
                "Enable SID filtering on all domain trusts",
                Severity::High,
                Effort::Low,
            ),
            RemediationStep::new(
                "Audit trust relationships",
                "Review and remove unnecessary trust relationships",
                Severity::Medium,
                Effort::Medium,
            ),
        ];
        Ok(vec![finding])
    }
}

#[async_trait]
impl Agent for LateralMovementSimAgent {
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
impl SimHooks for LateralMovementSimAgent {
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
        filter_techniques(TacticType::LateralMovement, &self.config.sim.techniques)
    }

    async fn simulate_technique(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        match technique.technique_id.as_str() {
            "T1021.001" => {
                let remediation = vec![
                    RemediationStep::new(
                        "Implement jump servers",
                        "Require all RDP access through hardened jump servers",
                        Severity::High,
                        Effort::Medium,
                    ),
                    RemediationStep::new(
                        "Enable NLA",
                        "Enable Network Level Authentication for all RDP endpoints",
                        Severity::Medium,
                        Effort::Low,
                    ),
                ];
                self.sim_remote_protocol(technique, context, "rdp", 3389, remediation)
                    .await
            }
            "T1021.004" => {
                let remediation = vec![
                    RemediationStep::new(
                        "Use SSH certificate auth",
                        "Replace password auth with certificate-based SSH",
                        Severity::High,
                        Effort::Medium,
                    ),
                    RemediationStep::new(
                        "Implement bastion hosts",
                        "Route all SSH through hardened bastion hosts",
                        Severity::High,
                        Effort::Medium,
                    ),
                ];
                self.sim_remote_protocol(technique, context, "ssh", 22, remediation)
                    .await
            }
            "T1550.002" => self.sim_pass_the_hash(technique, context).await,
            "T1558" => self.sim_kerberos(technique, context).await,
            "T1482" => self.sim_domain_trust(technique, context).await,
            _ => Ok(Vec::new()),
        }
    }
}
