//! Threat-hunt playbooks.
//!
//! A hunt agent extends the base lifecycle with SIEM access, a hunt
//! configuration, and Sigma rule generation. Playbooks supply
//! `build_queries` (programmatic — never LLM) and `analyze_results`; the
//! shared executor runs the queries in order, records per-query engram
//! actions, attaches Sigma rules, and asks the LLM for a closing summary.

pub mod credential_abuse;
pub mod data_exfiltration;
pub mod lateral_movement;
pub mod models;
pub mod sigma;

pub use credential_abuse::CredentialAbuseHuntAgent;
pub use data_exfiltration::DataExfiltrationHuntAgent;
pub use lateral_movement::LateralMovementHuntAgent;
pub use models::{
    CredentialAbuseConfig, DataExfiltrationConfig, HuntConfig, HuntFinding,
    LateralMovementConfig, PlaybookResult, PlaybookType,
};
pub use sigma::{SigmaGenerator, SigmaRule};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use sentinel_core::{AgentPlan, AgentResult, Finding};

use crate::agent::{plan_schema, Agent};
use crate::error::AgentError;
use crate::llm::{complete_typed, LlmMessage};
use crate::siem::{QueryResult, Siem};

/// A named SIEM query produced by a playbook.
#[derive(Debug, Clone)]
pub struct SiemQuery {
    pub name: String,
    pub dsl: serde_json::Value,
    /// Index pattern override; empty means the configured default.
    pub index: String,
}

impl SiemQuery {
    pub fn new(name: &str, dsl: serde_json::Value, index: &str) -> Self {
        Self {
            name: name.to_string(),
            dsl,
            index: index.to_string(),
        }
    }
}

/// Shared hunt-agent state beyond [`crate::agent::AgentCore`].
pub struct HuntBase {
    pub siem: Arc<dyn Siem>,
    pub sigma: SigmaGenerator,
    pub last_result: Option<PlaybookResult>,
}

impl HuntBase {
    pub fn new(siem: Arc<dyn Siem>) -> Self {
        Self {
            siem,
            sigma: SigmaGenerator::new(),
            last_result: None,
        }
    }
}

/// Template methods and accessors a hunt playbook provides.
#[async_trait]
pub trait HuntHooks: Agent {
    fn hunt_base(&self) -> &HuntBase;
    fn hunt_base_mut(&mut self) -> &mut HuntBase;
    /// The common knobs of the playbook's configuration.
    fn hunt_config(&self) -> &HuntConfig;
    /// The full playbook configuration, serialized for the planning prompt.
    fn config_json(&self) -> serde_json::Value;

    /// Build the SIEM queries for this playbook. Programmatic only.
    fn build_queries(&self, plan: &AgentPlan) -> Vec<SiemQuery>;

    /// Analyze query results and produce findings. May consult the LLM for
    /// soft pattern hints.
    async fn analyze_results(
        &mut self,
        results: &HashMap<String, QueryResult>,
    ) -> Result<Vec<HuntFinding>, AgentError>;
}

/// Compute the time window for a hunt based on its configuration.
pub fn time_range(config: &HuntConfig) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = Utc::now();
    let start = end - Duration::hours(config.time_window_hours);
    (start, end)
}

/// An Elasticsearch range filter over `@timestamp` for the hunt window.
pub fn time_filter(config: &HuntConfig) -> serde_json::Value {
    let (start, end) = time_range(config);
    serde_json::json!({
        "range": {
            "@timestamp": {
                "gte": start.to_rfc3339(),
                "lte": end.to_rfc3339(),
            }
        }
    })
}

/// Shared plan phase: ask the LLM for a structured hunt plan.
pub async fn plan_hunt<H>(
    agent: &mut H,
    intent: &str,
    context: &serde_json::Value,
) -> Result<AgentPlan, AgentError>
where
    H: HuntHooks + ?Sized,
{
    let config_json = agent.config_json();
    let config = agent.hunt_config();
    let system = "You are a threat hunting expert. Given a hunting intent and configuration, \
                  produce a structured plan. Include which data sources to query, what \
                  patterns to look for, and in what order.";
    let user = format!(
        "Hunt intent: {intent}\n\
         Playbook: {}\n\
         Time window: {} hours\n\
         Index pattern: {}\n\
         Config: {config_json}\n\
         Context: {context}",
        config.playbook, config.time_window_hours, config.index_pattern,
    );

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

/// Shared execute phase: run queries, analyze, generate Sigma rules.
pub async fn execute_hunt<H>(agent: &mut H, plan: &AgentPlan) -> Result<AgentResult, AgentError>
where
    H: HuntHooks + ?Sized,
{
    let started = std::time::Instant::now();
    let started_at = Utc::now();

    let queries = agent.build_queries(plan);

    let siem = agent.hunt_base().siem.clone();
    let default_index = agent.hunt_config().index_pattern.clone();
    let size = agent.hunt_config().max_results_per_query;
    let sort = serde_json::json!([{"@timestamp": {"order": "desc"}}]);

    let mut query_results: HashMap<String, QueryResult> = HashMap::new();
    let mut total_events: u64 = 0;

    for query in &queries {
        if agent.core().is_cancelled() {
            tracing::info!(query = %query.name, "Hunt cancelled, skipping remaining queries");
            break;
        }

        let index = if query.index.is_empty() {
            default_index.as_str()
        } else {
            query.index.as_str()
        };
        let result = siem
            .execute_query(&query.dsl, index, size, Some(&sort), None)
            .await?;
        total_events += result.total_hits;

        agent.core_mut().record_action(
            &format!("siem_query_{}", query.name),
            &format!("Executed query '{}': {} hits", query.name, result.total_hits),
            serde_json::json!({
                "query_dsl": query.dsl,
                "total_hits": result.total_hits,
            }),
            true,
        );

        query_results.insert(query.name.clone(), result);
    }

    let mut findings = agent.analyze_results(&query_results).await?;

    let mut sigma_rules: Vec<SigmaRule> = Vec::new();
    if agent.hunt_config().generate_sigma_rules {
        let generator = agent.hunt_base().sigma;
        for finding in &mut findings {
            if let Some(rule) = generator.from_finding(finding) {
                sigma_rules.push(rule.clone());
                finding.sigma_rule = Some(rule);
            }
        }
    }

    let summary = generate_summary(agent, &findings, total_events).await?;

    let elapsed = started.elapsed().as_secs_f64();
    let playbook_result = PlaybookResult {
        playbook: agent.hunt_config().playbook,
        config: agent.hunt_config().clone(),
        findings: findings.clone(),
        sigma_rules,
        queries_executed: queries.len(),
        events_analyzed: total_events,
        duration_seconds: (elapsed * 100.0).round() / 100.0,
        summary,
    };
    agent.hunt_base_mut().last_result = Some(playbook_result);

    let agent_findings: Vec<Finding> = findings.iter().map(project_finding).collect();

    let mut result = AgentResult::running(&agent.core().config, started_at);
    result.findings = agent_findings;
    result.actions_taken = queries.len() as u32;
    Ok(result)
}

/// Fold playbook context into the evidence of an agent-level finding.
fn project_finding(hf: &HuntFinding) -> Finding {
    let mut evidence = hf.evidence.clone();
    evidence.insert("playbook".to_string(), hf.playbook.as_str().into());
    evidence.insert(
        "affected_hosts".to_string(),
        serde_json::json!(hf.affected_hosts),
    );
    evidence.insert(
        "affected_users".to_string(),
        serde_json::json!(hf.affected_users),
    );
    evidence.insert(
        "mitre_technique_ids".to_string(),
        serde_json::json!(hf.mitre_technique_ids),
    );
    evidence.insert("mitre_tactic".to_string(), hf.mitre_tactic.clone().into());
    evidence.insert(
        "sigma_yaml".to_string(),
        hf.sigma_rule
            .as_ref()
            .and_then(|r| r.to_yaml().ok())
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    );

    Finding {
        id: hf.id,
        severity: hf.severity,
        title: hf.title.clone(),
        description: hf.description.clone(),
        evidence,
        recommendations: hf.recommendations.clone(),
    }
}


/// Ask the LLM for a short human-readable summary of hunt results.
async fn generate_summary<H>(
    agent: &mut H,
    findings: &[HuntFinding],
    total_events: u64,
) -> Result<String, AgentError>
where
    H: HuntHooks + ?Sized,
{
    let finding_descriptions = findings
        .iter()
        .map(|f| {
            format!(
                "- [{}] {}: {}",
                f.severity.as_str().to_uppercase(),
                f.title,
                f.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Summarize the results of a {} threat hunt.\n\
         Events analyzed: {total_events}\n\
         Findings ({}):\n{finding_descriptions}\n\n\
         Provide a concise 2-3 sentence summary suitable for a SOC analyst.",
        agent.hunt_config().playbook,
        findings.len(),
    );

    let llm = agent.core().llm.clone();
    let response = llm.complete(&[LlmMessage::user(prompt)], None, 256).await?;
    Ok(response.content)
}
