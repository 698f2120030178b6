//! Privilege escalation adversarial simulation playbook.
//!
//! Evaluates exploitation for privilege escalation (T1068), default
//! accounts (T1078.001), abuse of elevation control (T1548), access token
//! manipulation (T1134), and account manipulation (T1098).

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, EdgeType, SentinelError, Severity};
use sentinel_policy::PolicyEngine;

use crate::agent::{Agent, AgentCore};
use crate::error::AgentError;
use crate::simulate::graph::{GraphReader, NodeRecord};
use crate::simulate::mitre::{filter_techniques, MitreTechnique};
use crate::simulate::models::{
    compute_risk_score, Effort, PrivilegeEscalationConfig, RemediationStep, SimConfig,
    SimulationFinding, TacticType,
};
use crate::simulate::{self, GraphContext, SimBase, SimHooks};
use crate::tools::ToolRegistry;

const DEFAULT_ACCOUNT_NAMES: &[&str] = &[
    "admin",
    "administrator",
    "root",
    "guest",
    "sa",
    "postgres",
    "oracle",
    "test",
];

const IDENTITY_KEYWORDS: &[&str] = &["iam", "identity", "user", "role"];

/// Simulates privilege escalation techniques against the digital twin.
pub struct PrivilegeEscalationSimAgent {
    core: AgentCore,
    base: SimBase,
    config: PrivilegeEscalationConfig,
}

impl PrivilegeEscalationSimAgent {
    pub fn new(
        agent_config: AgentConfig,
        llm: Arc<dyn crate::llm::LlmProvider>,
        tools: Arc<ToolRegistry>,
        graph: Arc<dyn GraphReader>,
        config: PrivilegeEscalationConfig,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        Ok(Self {
            core: AgentCore::new(agent_config, llm, tools, policy)?,
            base: SimBase::new(graph),
            config,
        })
    }

    /// Role ids reached by User-MEMBER_OF-Role edges, with per-role
    /// member lists.
    async fn roles_with_members(
        &self,
        context: &GraphContext,
    ) -> Result<Vec<(String, Vec<String>)>, AgentError> {
        let edges = self
            .base
            .graph
            .query_edges(
                &context.tenant_id,
                Some(EdgeType::MemberOf),
                Some("User"),
                Some("Role"),
                200,
            )
            .await?;

        let role_ids: BTreeSet<String> = edges.iter().map(|e| e.target_id.clone()).collect();
        Ok(role_ids
            .into_iter()
            .map(|role_id| {
                let members = edges
                    .iter()
                    .filter(|e| e.target_id == role_id)
                    .map(|e| e.source_id.clone())
                    .collect();
                (role_id, members)
            })
            .collect())
    }

    /// Resolve a role's property record via neighbor lookup.
    async fn role_record(
        &self,
        context: &GraphContext,
        role_id: &str,
    ) -> Result<Option<NodeRecord>, AgentError> {
        let neighbors = self
            .base
            .graph
            .query_neighbors(role_id, &context.tenant_id, &[], &[], 100)
            .await?;
        Ok(neighbors.into_iter().find(|n| n.id == role_id))
    }

    // ── T1068: Exploitation for Privilege Escalation ────────────

    async fn sim_t1068(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let high_cvss: Vec<_> = context
            .vulnerabilities
            .iter()
            .filter(|v| v.prop_f64("cvss_score").unwrap_or(0.0) >= 7.0 && v.prop_bool("exploitable"))
            .collect();
        if high_cvss.is_empty() {
            return Ok(Vec::new());
        }

        let cve_ids: Vec<String> = high_cvss
            .iter()
            .map(|v| v.prop_str("cve_id").unwrap_or("unknown").to_string())
            .collect();
        let max_cvss = high_cvss
            .iter()
            .filter_map(|v| v.prop_f64("cvss_score"))
            .fold(0.0_f64, f64::max);

        let mut finding = SimulationFinding::new(
            technique,
            Severity::Critical,
            format!(
                "{} exploitable privilege escalation vulnerabilities",
                high_cvss.len()
            ),
            format!(
                "Found {} vulnerabilities with CVSS >= 7.0 and exploitable=true: {}. \
                 Max CVSS: {max_cvss}.",
                high_cvss.len(),
                cve_ids.iter().take(5).cloned().collect::<Vec<_>>().join(", "),
            ),
        );
        finding.risk_score = compute_risk_score(max_cvss / 10.0, Severity::Critical, 0.0);
        finding
            .evidence
            .insert("cve_ids".to_string(), serde_json::json!(cve_ids));
        finding
            .evidence
            .insert("max_cvss".to_string(), serde_json::json!(max_cvss));
        finding
            .evidence
            .insert("vuln_count".to_string(), serde_json::json!(high_cvss.len()));
        finding.affected_nodes = high_cvss.iter().map(|v| v.id.clone()).collect();
        finding.remediation = vec![
            RemediationStep::new(
                "Patch critical vulnerabilities",
                &format!(
                    "Apply patches for {}",
                    cve_ids.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
                ),
                Severity::Critical,
                Effort::Medium,
            ),
            RemediationStep::new(
                "Application sandboxing",
                "Implement privilege separation for affected services",
                Severity::High,
                Effort::High,
            ),
        ];
        Ok(vec![finding])
    }

    // ── T1078.001: Default Accounts ─────────────────────────────

    async fn sim_default_accounts(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();
        let mut findings = Vec::new();

        let default_users: Vec<_> = context
            .users
            .iter()
            .filter(|u| {
                u.prop_str("username")
                    .map(|name| DEFAULT_ACCOUNT_NAMES.contains(&name.to_lowercase().as_str()))
                    .unwrap_or(false)
                    && u.prop_bool_or("enabled", true)
            })
            .collect();

        for user in default_users {
            let neighbors = graph
                .query_neighbors(
                    &user.id,
                    &context.tenant_id,
                    &[EdgeType::HasAccess],
                    &[],
                    100,
                )
                .await?;
            if neighbors.is_empty() {
                continue;
            }

            let mut finding = SimulationFinding::new(
                technique,
                Severity::High,
                format!("Active default account: {}", user.name_or_id("username")),
                format!(
                    "Default account '{}' is enabled and has access to {} resource(s).",
                    user.name_or_id("username"),
                    neighbors.len(),
                ),
            );
            finding.risk_score = compute_risk_score(0.6, Severity::High, 0.0);
            finding.evidence.insert(
                "username".to_string(),
                serde_json::json!(user.prop_str("username")),
            );
            finding.evidence.insert(
                "access_count".to_string(),
                serde_json::json!(neighbors.len()),
            );
            finding.affected_nodes = vec![user.id.clone()];
            finding.remediation = vec![
                RemediationStep::new(
                    "Disable default account",
                    &format!(
                        "Disable the '{}' default account",
                        user.name_or_id("username")
                    ),
                    Severity::High,
                    Effort::Low,
                )
                .automated(),
                RemediationStep::new(
                    "Enforce unique credentials",
                    "Replace default accounts with named service accounts",
                    Severity::Medium,
                    Effort::Medium,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }

    // ── T1548: Abuse Elevation Control Mechanism ────────────────

    async fn sim_wildcard_roles(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let roles = self.roles_with_members(context).await?;

        let mut overprivileged: Vec<serde_json::Value> = Vec::new();
        let mut affected: Vec<String> = Vec::new();
        for (role_id, _members) in &roles {
            let Some(role) = self.role_record(context, role_id).await? else {
                continue;
            };
            let permissions = role.prop_str_list("permissions");
            if permissions.iter().any(|p| p.contains('*')) {
                affected.push(role_id.clone());
                overprivileged.push(serde_json::json!({
                    "role_id": role_id,
                    "permissions": permissions,
                }));
            }
        }

        if overprivileged.is_empty() {
            return Ok(Vec::new());
        }

        let mut finding = SimulationFinding::new(
            technique,
            Severity::High,
            format!("{} role(s) with wildcard permissions", overprivileged.len()),
            format!(
                "Found {} role(s) with wildcard (*) permissions that enable privilege \
                 escalation.",
                overprivileged.len(),
            ),
        );
        finding.risk_score = compute_risk_score(0.6, Severity::High, 0.0);
        finding.evidence.insert(
            "role_count".to_string(),
            serde_json::json!(overprivileged.len()),
        );
        finding
            .evidence
            .insert("roles".to_string(), serde_json::json!(overprivileged));
        finding.affected_nodes = affected;
        finding.remediation = vec![RemediationStep::new(
            "Replace wildcards with specific permissions",
            "Audit roles and replace wildcard permissions with least-privilege",
            Severity::High,
            Effort::Medium,
        )];
        Ok(vec![finding])
    }

    // ── T1134: Access Token Manipulation ────────────────────────

    async fn sim_token_manipulation(
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
            let critical_hosts: Vec<_> = neighbors
                .iter()
                .filter(|n| matches!(n.prop_str("criticality"), Some("critical") | Some("high")))
                .collect();
            if critical_hosts.len() < 3 {
                continue;
            }

            let blast = graph
                .compute_blast_radius(
                    &context.tenant_id,
                    &svc.id,
                    5,
                    self.config.sim.min_exploitability,
                )
                .await?;

            let mut finding = SimulationFinding::new(
                technique,
                Severity::High,
                format!("Token manipulation risk: {}", svc.name_or_id("username")),
                format!(
                    "Service account '{}' accesses {} critical hosts. Token compromise \
                     enables wide privilege escalation.",
                    svc.name_or_id("username"),
                    critical_hosts.len(),
                ),
            );
            finding.risk_score = compute_risk_score(0.7, Severity::High, blast.blast_score);
            finding.evidence.insert(
                "username".to_string(),
                serde_json::json!(svc.prop_str("username")),
            );
            finding.evidence.insert(
                "critical_host_count".to_string(),
                serde_json::json!(critical_hosts.len()),
            );
            finding.evidence.insert(
                "blast_score".to_string(),
                serde_json::json!(blast.blast_score),
            );
            finding.affected_nodes = std::iter::once(svc.id.clone())
                .chain(critical_hosts.iter().map(|h| h.id.clone()))
                .collect();
            finding.blast_radius = Some(blast);
            finding.remediation = vec![
                RemediationStep::new(
                    "Implement token lifetime limits",
                    "Set short token expiration for service accounts",
                    Severity::High,
                    Effort::Low,
                ),
                RemediationStep::new(
                    "Restrict service account scope",
                    "Limit service account to minimum required hosts",
                    Severity::High,
                    Effort::Medium,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }

    // ── T1098: Account Manipulation ─────────────────────────────

    async fn sim_account_manipulation(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let roles = self.roles_with_members(context).await?;
        let mut findings = Vec::new();

        for (role_id, members) in &roles {
            let Some(role) = self.role_record(context, role_id).await? else {
                continue;
            };
            let permissions = role.prop_str_list("permissions");
            let has_identity_perms = permissions.iter().any(|p| {
                let lower = p.to_lowercase();
                IDENTITY_KEYWORDS.iter().any(|kw| lower.contains(kw))
            });
            if !has_identity_perms || permissions.len() <= 10 {
                continue;
            }

            let mut finding = SimulationFinding::new(
                technique,
                Severity::High,
                format!("Self-elevation risk via role {role_id}"),
                format!(
                    "Role '{role_id}' has {} permissions including identity management. \
                     {} user(s) can self-elevate.",
                    permissions.len(),
                    members.len(),
                ),
            );
            finding.risk_score = compute_risk_score(0.6, Severity::High, 0.0);
            finding
                .evidence
                .insert("role_id".to_string(), serde_json::json!(role_id));
            finding.evidence.insert(
                "permission_count".to_string(),
                serde_json::json!(permissions.len()),
            );
            finding
                .evidence
                .insert("user_count".to_string(), serde_json::json!(members.len()));
            finding.affected_nodes = std::iter::once(role_id.clone())
                .chain(members.iter().cloned())
                .collect();
            finding.remediation = vec![
                RemediationStep::new(
                    "Separation of duties",
                    "Remove identity management from broad roles",
                    Severity::High,
                    Effort::Medium,
                ),
                RemediationStep::new(
                    "Privileged access reviews",
                    "Enable periodic review of privileged role assignments",
                    Severity::Medium,
                    Effort::Low,
                ),
            ];
            findings.push(finding);
        }
        Ok(findings)
    }
}

#[async_trait]
impl Agent for PrivilegeEscalationSimAgent {
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
impl SimHooks for PrivilegeEscalationSimAgent {
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
        filter_techniques(TacticType::PrivilegeEscalation, &self.config.sim.techniques)
    }

    async fn simulate_technique(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        match technique.technique_id.as_str() {
            "T1068" => self.sim_t1068(technique, context).await,
            "T1078.001" => self.sim_default_accounts(technique, context).await,
            "T1548" => self.sim_wildcard_roles(technique, context).await,
            "T1134" => self.sim_token_manipulation(technique, context).await,
            "T1098" => self.sim_account_manipulation(technique, context).await,
            _ => Ok(Vec::new()),
        }
    }
}
