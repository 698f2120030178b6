//! Adversarial simulation playbooks.
//!
//! Simulation agents evaluate MITRE ATT&CK techniques against the
//! knowledge graph. All simulations are read-only — they query the graph
//! and pathfind engine and never modify the digital twin.

pub mod exfiltration;
pub mod graph;
pub mod initial_access;
pub mod lateral_movement;
pub mod mitre;
pub mod models;
pub mod privilege_escalation;

pub use exfiltration::ExfiltrationSimAgent;
pub use graph::{GraphReader, NodeRecord};
pub use initial_access::InitialAccessSimAgent;
pub use lateral_movement::LateralMovementSimAgent;
pub use mitre::MitreTechnique;
pub use models::{
    compute_risk_score, ExfiltrationConfig, InitialAccessConfig, LateralMovementSimConfig,
    PrivilegeEscalationConfig, SimConfig, SimulationFinding, SimulationResult, TacticType,
};
pub use privilege_escalation::PrivilegeEscalationSimAgent;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use sentinel_core::{AgentPlan, AgentResult, Finding, TenantId};

use crate::agent::{plan_schema, Agent};
use crate::error::AgentError;
use crate::llm::{complete_typed, LlmMessage};

/// Shared simulation-agent state beyond [`crate::agent::AgentCore`].
pub struct SimBase {
    pub graph: Arc<dyn GraphReader>,
    pub last_result: Option<SimulationResult>,
}

impl SimBase {
    pub fn new(graph: Arc<dyn GraphReader>) -> Self {
        Self {
            graph,
            last_result: None,
        }
    }
}

/// High-level graph topology shared by all technique evaluations in a run.
pub struct GraphContext {
    pub tenant_id: TenantId,
    pub hosts: Vec<NodeRecord>,
    pub users: Vec<NodeRecord>,
    pub services: Vec<NodeRecord>,
    pub vulnerabilities: Vec<NodeRecord>,
}

/// Template methods and accessors a simulation playbook provides.
#[async_trait]
pub trait SimHooks: Agent {
    fn sim_base(&self) -> &SimBase;
    fn sim_base_mut(&mut self) -> &mut SimBase;
    /// The common knobs of the playbook's configuration.
    fn sim_config(&self) -> &SimConfig;
    /// The full playbook configuration, serialized for the planning prompt.
    fn config_json(&self) -> serde_json::Value;

    /// Select which MITRE techniques to simulate.
    fn select_techniques(&self, plan: &AgentPlan) -> Vec<MitreTechnique>;

    /// Simulate a single technique against the graph (read-only).
    async fn simulate_technique(
        &mut self,
        technique: &MitreTechnique,
        context: &GraphContext,
    ) -> Result<Vec<SimulationFinding>, AgentError>;
}

/// Shared plan phase: ask the LLM for a structured simulation plan.
pub async fn plan_simulation<S>(
    agent: &mut S,
    intent: &str,
    context: &serde_json::Value,
) -> Result<AgentPlan, AgentError>
where
    S: SimHooks + ?Sized,
{
    let config = agent.sim_config();
    let techniques = if config.techniques.is_empty() {
        "all".to_string()
    } else {
        config.techniques.join(", ")
    };
    let user = format!(
        "Simulation intent: {intent}\n\
         Tactic: {}\n\
         Techniques filter: {techniques}\n\
         Config: {}\n\
         Context: {context}\n\n\
         Produce a structured simulation plan.",
        config.tactic,
        agent.config_json(),
    );
    let system = "You are a red team simulation planner. Produce a plan for testing MITRE \
                  ATT&CK techniques against a network knowledge graph. This is read-only — \
                  no live attacks.";

    let llm = agent.core().llm.clone();
    let plan = complete_typed::<AgentPlan>(
        llm.as_ref(),
        &[LlmMessage::user(user)],
        &plan_schema(),
        Some(system),
        4096,
    )
    .await?;
    Ok(plan)
}

/// Shared execute phase: gather graph context, evaluate techniques in
/// order, summarize, and project findings.
pub async fn execute_simulation<S>(
    agent: &mut S,
    plan: &AgentPlan,
) -> Result<AgentResult, AgentError>
where
    S: SimHooks + ?Sized,
{
    let started = std::time::Instant::now();
    let started_at = Utc::now();

    let techniques = agent.select_techniques(plan);
    let context = build_graph_context(agent).await?;

    let mut all_findings: Vec<SimulationFinding> = Vec::new();
    let mut techniques_with_findings = 0usize;

    for technique in &techniques {
        if agent.core().is_cancelled() {
            tracing::info!(
                technique = %technique.technique_id,
                "Simulation cancelled, skipping remaining techniques"
            );
            break;
        }

        let findings = agent.simulate_technique(technique, &context).await?;
        if !findings.is_empty() {
            techniques_with_findings += 1;
        }

        agent.core_mut().record_action(
            &format!("simulate_{}", technique.technique_id),
            &format!(
                "Simulated {} ({}): {} findings",
                technique.technique_id,
                technique.technique_name,
                findings.len()
            ),
            serde_json::json!({
                "technique_id": technique.technique_id,
                "findings_count": findings.len(),
            }),
            true,
        );

        all_findings.extend(findings);
    }

    let summary = generate_summary(agent, &all_findings, techniques.len()).await?;
    let highest_risk = all_findings
        .iter()
        .map(|f| f.risk_score)
        .fold(0.0_f64, f64::max);

    let elapsed = started.elapsed().as_secs_f64();
    let simulation_result = SimulationResult {
        tactic: agent.sim_config().tactic,
        config: agent.sim_config().clone(),
        findings: all_findings.clone(),
        techniques_tested: techniques.len(),
        techniques_with_findings,
        highest_risk_score: highest_risk,
        duration_seconds: (elapsed * 100.0).round() / 100.0,
        summary,
    };
    agent.sim_base_mut().last_result = Some(simulation_result);

    let agent_findings: Vec<Finding> = all_findings.iter().map(project_finding).collect();

    let mut result = AgentResult::running(&agent.core().config, started_at);
    result.findings = agent_findings;
    result.actions_taken = techniques.len() as u32;
    Ok(result)
}

/// Gather high-level graph topology for a simulation run.
async fn build_graph_context<S>(agent: &mut S) -> Result<GraphContext, AgentError>
where
    S: SimHooks + ?Sized,
{
    let graph = agent.sim_base().graph.clone();
    let tenant_id = agent.core().config.tenant_id;

    let hosts = graph.query_nodes("Host", &tenant_id, None, 500).await?;
    let users = graph.query_nodes("User", &tenant_id, None, 500).await?;
    let services = graph.query_nodes("Service", &tenant_id, None, 500).await?;
    let vulnerabilities = graph
        .query_nodes("Vulnerability", &tenant_id, None, 500)
        .await?;

    Ok(GraphContext {
        tenant_id,
        hosts,
        users,
        services,
        vulnerabilities,
    })
}

/// Fold technique context into the evidence of an agent-level finding.
fn project_finding(sf: &SimulationFinding) -> Finding {
    let mut evidence = sf.evidence.clone();
    evidence.insert("tactic".to_string(), sf.tactic.as_str().into());
    evidence.insert("technique_id".to_string(), sf.technique_id.clone().into());
    evidence.insert(
        "technique_name".to_string(),
        sf.technique_name.clone().into(),
    );
    evidence.insert("risk_score".to_string(), serde_json::json!(sf.risk_score));
    evidence.insert(
        "attack_paths_count".to_string(),
        serde_json::json!(sf.attack_paths.len()),
    );
    evidence.insert(
        "affected_nodes".to_string(),
        serde_json::json!(sf.affected_nodes),
    );
    evidence.insert("mitre_url".to_string(), sf.mitre_url.clone().into());
    evidence.insert(
        "remediation".to_string(),
        serde_json::to_value(&sf.remediation).unwrap_or_default(),
    );

    Finding {
        id: sf.id,
        severity: sf.severity,
        title: sf.title.clone(),
        description: sf.description.clone(),
        evidence,
        recommendations: sf.remediation.iter().map(|r| r.title.clone()).collect(),
    }
}

/// Ask the LLM for a red-team assessment, or a static line when there is
/// nothing to report.
async fn generate_summary<S>(
    agent: &mut S,
    findings: &[SimulationFinding],
    techniques_tested: usize,
) -> Result<String, AgentError>
where
    S: SimHooks + ?Sized,
{
    let tactic = agent.sim_config().tactic;
    if findings.is_empty() {
        return Ok(format!(
            "No findings from {techniques_tested} {tactic} technique(s) tested."
        ));
    }

    let finding_lines = findings
        .iter()
        .map(|f| {
            format!(
                "- [{}] {} {}",
                f.severity.as_str().to_uppercase(),
                f.technique_id,
                f.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Summarize adversarial simulation results for {tactic}.\n\
         Techniques tested: {techniques_tested}\n\
         Findings ({}):\n{finding_lines}\n\n\
         Provide a concise red-team assessment for a CISO briefing.",
        findings.len(),
    );

    let llm = agent.core().llm.clone();
    let response = llm
        .complete(
            &[LlmMessage::user(prompt)],
            Some("You are a senior red team operator."),
            512,
        )
        .await?;
    Ok(response.content)
}
