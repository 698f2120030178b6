//! Exfiltration adversarial simulation playbook.
//!
//! Evaluates exfiltration over C2 (T1041), alternative protocol (T1048),
//! web services (T1567), cloud account transfer (T1537), and scheduled
//! transfer (T1029).

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AgentConfig, AgentPlan, AgentResult, EdgeType, SentinelError, Severity};
use sentinel_policy::PolicyEngine;

use crate::agent::{Agent, AgentCore};
use crate::error::AgentError;
use crate::simulate::graph::{AttackPathQuery, GraphReader, NodeRecord};
use crate::simulate::mitre::{filter_techniques, MitreTechnique};
use crate::simulate::models::{
    compute_risk_score, Effort, ExfiltrationConfig, RemediationStep, SimConfig,
    SimulationFinding, TacticType,
};
use crate::simulate::{self, GraphContext, SimBase, SimHooks};
use crate::tools::ToolRegistry;

const SCHEDULER_KEYWORDS: &[&str] = &["cron", "scheduler", "task", "daemon"];

/// Simulates data exfiltration techniques against the digital twin.
pub struct ExfiltrationSimAgent {
    core: AgentCore,
    base: SimBase,
    config: ExfiltrationConfig,
}

impl ExfiltrationSimAgent {
    pub fn new(
        agent_config: AgentConfig,
        llm: Arc<dyn crate::llm::LlmProvider>,
        tools: Arc<ToolRegistry>,
        graph: Arc<dyn GraphReader>,
        config: ExfiltrationConfig,
        policy: Option<Arc<dyn PolicyEngine>>,
    ) -> Result<Self, SentinelError> {
        Ok(Self {
            core: AgentCore::new(agent_config, llm, tools, policy)?,
            base: SimBase::new(graph),
            config,
        })
    }

    fn sensitive_hosts<'a>(context: &'a GraphContext) -> Vec<&'a NodeRecord> {
        context
            .hosts
            .iter()
            .filter(|h| matches!(h.prop_str("criticality"), Some("critical") | Some("high")))
            .collect()
    }

    // ── T1041: Exfiltration Over C2 Channel ─────────────────────

    async fn sim_c2_egress(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let crown_jewels: Vec<_> = context
            .hosts
            .iter()
            .filter(|h| h.prop_str("criticality") == Some("critical"))
            .collect();
        let internet_facing: Vec<_> = context
            .hosts
            .iter()
            .filter(|h| h.prop_bool("is_internet_facing"))
            .collect();
        if crown_jewels.is_empty() || internet_facing.is_empty() {
            return Ok(Vec::new());
        }

        let report = self
            .base
            .graph
            .find_attack_paths(
                &context.tenant_id,
                &AttackPathQuery {
                    sources: crown_jewels.iter().map(|h| h.id.clone()).collect(),
                    targets: internet_facing.iter().map(|h| h.id.clone()).collect(),
                    max_depth: self.config.sim.max_depth,
                    max_paths: self.config.sim.max_paths,
                    include_lateral: false,
                    include_blast: false,
                },
            )
            .await?;
        if report.attack_paths.is_empty() {
            return Ok(Vec::new());
        }

        let max_risk = report
            .attack_paths
            .iter()
            .map(|p| p.risk_score)
            .fold(0.0_f64, f64::max);

        let mut finding = SimulationFinding::new(
            technique,
            Severity::Critical,
            format!(
                "{} egress path(s) from critical assets",
                report.attack_paths.len()
            ),
            format!(
                "Found {} attack path(s) from {} critical asset(s) to {} internet-facing \
                 node(s).",
                report.attack_paths.len(),
                crown_jewels.len(),
                internet_facing.len(),
            ),
        );
        finding.risk_score = compute_risk_score(max_risk, Severity::Critical, 0.0);
        finding.evidence.insert(
            "paths_count".to_string(),
            serde_json::json!(report.attack_paths.len()),
        );
        finding.evidence.insert(
            "crown_jewel_count".to_string(),
            serde_json::json!(crown_jewels.len()),
        );
        finding.evidence.insert(
            "exit_count".to_string(),
            serde_json::json!(internet_facing.len()),
        );
        finding.affected_nodes = crown_jewels.iter().map(|h| h.id.clone()).collect();
        finding.attack_paths = report.attack_paths;
        finding.remediation = vec![
            RemediationStep::new(
                "Network segmentation",
                "Isolate critical assets from internet-facing segments",
                Severity::Critical,
                Effort::High,
            ),
            RemediationStep::new(
                "Deploy DLP",
                "Implement data loss prevention on egress points",
                Severity::High,
                Effort::Medium,
            ),
        ];
        Ok(vec![finding])
    }

    // ── T1048: Exfiltration Over Alternative Protocol ───────────

    async fn sim_dns_exfil(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();

        let dns_services = context
            .services
            .iter()
            .filter(|s| s.prop_u64("port") == Some(53))
            .count();
        if dns_services == 0 {
            return Ok(Vec::new());
        }

        let mut reachable_from: Vec<String> = Vec::new();
        for host in Self::sensitive_hosts(context) {
            let neighbors = graph
                .query_neighbors(
                    &host.id,
                    &context.tenant_id,
                    &[EdgeType::CanReach, EdgeType::ConnectsTo],
                    &[],
                    100,
                )
                .await?;
            if neighbors.iter().any(|n| n.prop_u64("port") == Some(53)) {
                reachable_from.push(host.id.clone());
            }
        }

        if reachable_from.is_empty() {
            return Ok(Vec::new());
        }

        let mut finding = SimulationFinding::new(
            technique,
            Severity::High,
            format!(
                "DNS exfiltration path from {} sensitive host(s)",
                reachable_from.len()
            ),
            format!(
                "{} sensitive host(s) can reach DNS services, enabling potential DNS \
                 tunneling exfiltration.",
                reachable_from.len(),
            ),
        );
        finding.risk_score = compute_risk_score(0.5, Severity::High, 0.0);
        finding.evidence.insert(
            "dns_service_count".to_string(),
            serde_json::json!(dns_services),
        );
        finding.evidence.insert(
            "reachable_host_count".to_string(),
            serde_json::json!(reachable_from.len()),
        );
        finding.affected_nodes = reachable_from;
        finding.remediation = vec![
            RemediationStep::new(
                "Restrict DNS resolvers",
                "Limit outbound DNS to approved internal resolvers only",
                Severity::High,
                Effort::Low,
            ),
            RemediationStep::new(
                "DNS monitoring",
                "Deploy DNS query monitoring for anomalous patterns",
                Severity::Medium,
                Effort::Medium,
            ),
        ];
        Ok(vec![finding])
    }

    // ── T1567: Exfiltration Over Web Service ────────────────────

    async fn sim_web_service(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();

        let apps = graph
            .query_nodes("Application", &context.tenant_id, None, 200)
            .await?;
        let cloud_app_ids: BTreeSet<&str> = apps
            .iter()
            .filter(|a| matches!(a.prop_str("app_type"), Some("database") | Some("web_app")))
            .map(|a| a.id.as_str())
            .collect();
        if cloud_app_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sensitive = Self::sensitive_hosts(context);
        let mut reachable_apps: BTreeSet<String> = BTreeSet::new();
        for host in &sensitive {
            let neighbors = graph
                .query_neighbors(
                    &host.id,
                    &context.tenant_id,
                    &[EdgeType::CanReach, EdgeType::DependsOn],
                    &[],
                    100,
                )
                .await?;
            for neighbor in &neighbors {
                if cloud_app_ids.contains(neighbor.id.as_str()) {
                    reachable_apps.insert(neighbor.id.clone());
                }
            }
        }

        if reachable_apps.is_empty() {
            return Ok(Vec::new());
        }

        let mut finding = SimulationFinding::new(
            technique,
            Severity::High,
            format!(
                "{} cloud service(s) reachable from sensitive hosts",
                reachable_apps.len()
            ),
            format!(
                "Sensitive hosts can reach {} cloud application(s), enabling data \
                 exfiltration to web services.",
                reachable_apps.len(),
            ),
        );
        finding.risk_score = compute_risk_score(0.5, Severity::High, 0.0);
        finding.evidence.insert(
            "cloud_app_count".to_string(),
            serde_json::json!(reachable_apps.len()),
        );
        finding.evidence.insert(
            "sensitive_host_count".to_string(),
            serde_json::json!(sensitive.len()),
        );
        finding.affected_nodes = reachable_apps.into_iter().collect();
        finding.remediation = vec![
            RemediationStep::new(
                "Implement CASB",
                "Deploy cloud access security broker to control cloud service access",
                Severity::High,
                Effort::High,
            ),
            RemediationStep::new(
                "Block unauthorized cloud storage",
                "Restrict access to unapproved cloud storage services",
                Severity::High,
                Effort::Medium,
            ),
        ];
        Ok(vec![finding])
    }

    // ── T1537: Transfer Data to Cloud Account ───────────────────

    async fn sim_cloud_transfer(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();

        let apps = graph
            .query_nodes("Application", &context.tenant_id, None, 200)
            .await?;
        let storage_apps: Vec<_> = apps
            .iter()
            .filter(|a| a.prop_str("app_type") == Some("database"))
            .collect();
        if storage_apps.is_empty() {
            return Ok(Vec::new());
        }

        let mut accessors: BTreeSet<String> = BTreeSet::new();
        for app in &storage_apps {
            let neighbors = graph
                .query_neighbors(
                    &app.id,
                    &context.tenant_id,
                    &[EdgeType::HasAccess],
                    &[],
                    100,
                )
                .await?;
            accessors.extend(neighbors.iter().map(|n| n.id.clone()));
        }

        if accessors.is_empty() {
            return Ok(Vec::new());
        }

        let mut finding = SimulationFinding::new(
            technique,
            Severity::High,
            format!("{} entity(ies) can access cloud storage", accessors.len()),
            format!(
                "{} user(s)/service(s) have direct access to {} cloud storage \
                 application(s).",
                accessors.len(),
                storage_apps.len(),
            ),
        );
        finding.risk_score = compute_risk_score(0.5, Severity::High, 0.0);
        finding.evidence.insert(
            "storage_app_count".to_string(),
            serde_json::json!(storage_apps.len()),
        );
        finding.evidence.insert(
            "accessor_count".to_string(),
            serde_json::json!(accessors.len()),
        );
        finding.affected_nodes = storage_apps.iter().map(|a| a.id.clone()).collect();
        finding.remediation = vec![
            RemediationStep::new(
                "Enforce cloud storage policies",
                "Implement access policies on all cloud storage resources",
                Severity::High,
                Effort::Medium,
            ),
            RemediationStep::new(
                "Enable access logging",
                "Enable detailed logging on all cloud storage access",
                Severity::Medium,
                Effort::Low,
            ),
        ];
        Ok(vec![finding])
    }

    // ── T1029: Scheduled Transfer ───────────────────────────────

    async fn sim_scheduled_transfer(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        let graph = self.base.graph.clone();

        let scheduler_services: Vec<_> = context
            .services
            .iter()
            .filter(|s| {
                s.prop_str("name").is_some_and(|name| {
                    let lower = name.to_lowercase();
                    SCHEDULER_KEYWORDS.iter().any(|kw| lower.contains(kw))
                })
            })
            .collect();
        if scheduler_services.is_empty() {
            return Ok(Vec::new());
        }

        let mut schedulers_with_egress: Vec<serde_json::Value> = Vec::new();
        let mut affected: Vec<String> = Vec::new();
        for svc in &scheduler_services {
            let host_id = svc.prop_str("host_id").unwrap_or(&svc.id).to_string();
            let neighbors = graph
                .query_neighbors(
                    &host_id,
                    &context.tenant_id,
                    &[EdgeType::CanReach, EdgeType::ConnectsTo],
                    &[],
                    100,
                )
                .await?;
            let external = neighbors
                .iter()
                .filter(|n| n.prop_bool("is_internet_facing"))
                .count();
            if external > 0 {
                schedulers_with_egress.push(serde_json::json!({
                    "service": svc.prop_str("name").unwrap_or("unknown"),
                    "host_id": host_id,
                    "external_count": external,
                }));
                affected.push(host_id);
            }
        }

        if schedulers_with_egress.is_empty() {
            return Ok(Vec::new());
        }

        let mut finding = SimulationFinding::new(
            technique,
            Severity::Medium,
            format!(
                "{} scheduler(s) with external reach",
                schedulers_with_egress.len()
            ),
            format!(
                "Found {} scheduler service(s) that can reach external hosts, enabling \
                 automated data exfiltration.",
                schedulers_with_egress.len(),
            ),
        );
        finding.risk_score = compute_risk_score(0.4, Severity::Medium, 0.0);
        finding.evidence.insert(
            "schedulers".to_string(),
            serde_json::json!(schedulers_with_egress),
        );
        finding.affected_nodes = affected;
        finding.remediation = vec![
            RemediationStep::new(
                "Audit scheduled tasks",
                "Review all scheduled tasks for unauthorized data transfers",
                Severity::Medium,
                Effort::Medium,
            ),
            RemediationStep::new(
                "Restrict outbound connectivity",
                "Block outbound connections from scheduler hosts",
                Severity::Medium,
                Effort::Low,
            ),
        ];
        Ok(vec![finding])
    }
}

#[async_trait]
impl Agent for ExfiltrationSimAgent {
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
impl SimHooks for ExfiltrationSimAgent {
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
        filter_techniques(TacticType::Exfiltration, &self.config.sim.techniques)
    }

    async fn simulate_technique(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError> {
        match technique.technique_id.as_str() {
            "T1041" => self.sim_c2_egress(technique, context).await,
            "T1048" => self.sim_dns_exfil(technique, context).await,
            "T1567" => self.sim_web_service(technique, context).await,
            "T1537" => self.sim_cloud_transfer(technique, context).await,
            "T1029" => self.sim_scheduled_transfer(technique, context).await,
            _ => Ok(Vec::new()),
        }
    }
}
