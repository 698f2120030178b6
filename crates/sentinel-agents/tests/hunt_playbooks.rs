//! End-to-end hunt playbook scenarios over mock SIEM and LLM.

mod common;

use std::sync::Arc;

use common::{
    agent_config, auth_failure, dns_event, plan_json, query_result, transfer_event, MockSiem,
};
use sentinel_agents::agent::Agent;
use sentinel_agents::hunt::{
    CredentialAbuseConfig, CredentialAbuseHuntAgent, DataExfiltrationConfig,
    DataExfiltrationHuntAgent, HuntHooks, LateralMovementConfig, LateralMovementHuntAgent,
    PlaybookType,
};
use sentinel_agents::llm::MockLlmProvider;
use sentinel_agents::siem::SiemEvent;
use sentinel_agents::tools::ToolRegistry;
use sentinel_core::{AgentStatus, AgentType, Severity, TenantId};
use chrono::TimeZone;

/// Mock LLM for a full hunt run: plan, optional analysis pass, summary.
/// The analysis response is deliberately not JSON so it yields no extra
/// findings.
fn hunt_llm() -> Arc<MockLlmProvider> {
    Arc::new(MockLlmProvider::new(vec![
        plan_json(),
        "nothing conclusive in the sample".to_string(),
        "Summary for the SOC.".to_string(),
    ]))
}

fn credential_agent(
    siem: Arc<MockSiem>,
    llm: Arc<MockLlmProvider>,
) -> CredentialAbuseHuntAgent {
    CredentialAbuseHuntAgent::new(
        agent_config("hunt-cred-1", AgentType::Hunt, TenantId::new()),
        llm,
        Arc::new(ToolRegistry::new()),
        siem,
        CredentialAbuseConfig::default(),
        None,
    )
    .unwrap()
}

fn exfiltration_agent(
    siem: Arc<MockSiem>,
    llm: Arc<MockLlmProvider>,
) -> DataExfiltrationHuntAgent {
    DataExfiltrationHuntAgent::new(
        agent_config("hunt-exfil-1", AgentType::Hunt, TenantId::new()),
        llm,
        Arc::new(ToolRegistry::new()),
        siem,
        DataExfiltrationConfig::default(),
        None,
    )
    .unwrap()
}

#[tokio::test]
async fn brute_force_detected_with_high_severity() {
    // 35 failures from one IP against one account; threshold is 10, and
    // 35 > 30 pushes severity to high.
    let events: Vec<SiemEvent> = (0..35)
        .map(|i| auth_failure(i, "10.0.0.99", "admin"))
        .collect();
    let siem = Arc::new(MockSiem::new(vec![
        query_result(events),
        query_result(vec![]), // account_lockouts
        query_result(vec![]), // service_account_failures
    ]));

    let mut agent = credential_agent(siem, hunt_llm());
    let result = agent
        .run("hunt for brute force", serde_json::Value::Null)
        .await;

    assert_eq!(result.status, AgentStatus::Completed);
    assert_eq!(result.findings.len(), 1);

    let finding = &result.findings[0];
    assert_eq!(finding.title, "Excessive failed logins from 10.0.0.99");
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(
        finding.evidence["mitre_technique_ids"],
        serde_json::json!(["T1110.001"])
    );
    assert_eq!(finding.evidence["failed_count"], serde_json::json!(35));

    let sigma_yaml = finding.evidence["sigma_yaml"].as_str().unwrap();
    assert!(sigma_yaml.contains("attack.credential_access"));
    assert!(sigma_yaml.contains("attack.t1110.001"));
}

#[tokio::test]
async fn moderate_brute_force_is_medium_severity() {
    // 12 failures: over the threshold but not past 3x.
    let events: Vec<SiemEvent> = (0..12)
        .map(|i| auth_failure(i, "10.0.0.50", "admin"))
        .collect();
    let siem = Arc::new(MockSiem::new(vec![
        query_result(events),
        query_result(vec![]),
        query_result(vec![]),
    ]));

    let mut agent = credential_agent(siem, hunt_llm());
    let result = agent.run("hunt", serde_json::Value::Null).await;

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].severity, Severity::Medium);
}

#[tokio::test]
async fn credential_stuffing_detected() {
    // One attempt per user across five accounts from a single source.
    let events: Vec<SiemEvent> = (1..=5)
        .map(|i| auth_failure(i, "192.168.1.50", &format!("user{i}")))
        .collect();
    let siem = Arc::new(MockSiem::new(vec![
        query_result(events),
        query_result(vec![]),
        query_result(vec![]),
    ]));

    let mut agent = credential_agent(siem, hunt_llm());
    let result = agent.run("hunt", serde_json::Value::Null).await;

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert!(finding.title.contains("credential stuffing"));
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(
        finding.evidence["mitre_technique_ids"],
        serde_json::json!(["T1110.004"])
    );
    assert_eq!(finding.evidence["unique_user_count"], serde_json::json!(5));
}

#[tokio::test]
async fn service_account_failures_are_critical() {
    let failures: Vec<SiemEvent> = (0..3)
        .map(|i| auth_failure(i, "10.0.0.7", "svc-backup"))
        .collect();
    let siem = Arc::new(MockSiem::new(vec![
        query_result(vec![]),
        query_result(vec![]),
        query_result(failures),
    ]));

    let mut agent = credential_agent(siem, hunt_llm());
    let result = agent.run("hunt", serde_json::Value::Null).await;

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Critical);
    assert!(finding.title.contains("Service account"));
    assert_eq!(
        finding.evidence["mitre_technique_ids"],
        serde_json::json!(["T1110"])
    );
}

#[tokio::test]
async fn dns_tunneling_detected() {
    let long_name = format!("{}.evil.example", "a".repeat(55));
    assert!(long_name.len() >= 50);

    let siem = Arc::new(MockSiem::new(vec![
        query_result(vec![]), // large_outbound
        query_result(vec![dns_event(1, "10.0.0.12", &long_name)]),
        query_result(vec![]), // unusual_destinations
        query_result(vec![]), // after_hours_transfers
    ]));

    let mut agent = exfiltration_agent(siem, hunt_llm());
    let result = agent.run("hunt for exfil", serde_json::Value::Null).await;

    assert_eq!(result.status, AgentStatus::Completed);
    assert_eq!(result.findings.len(), 1);

    let finding = &result.findings[0];
    assert!(finding.title.contains("DNS tunneling"));
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(
        finding.evidence["mitre_technique_ids"],
        serde_json::json!(["T1071.004"])
    );
    let sigma_yaml = finding.evidence["sigma_yaml"].as_str().unwrap();
    assert!(sigma_yaml.contains("attack.exfiltration"));
}

#[tokio::test]
async fn large_transfer_accumulates_per_destination() {
    let now = chrono::Utc.with_ymd_and_hms(2026, 3, 10, 14, 30, 0).unwrap();
    // Two 60 MB transfers to the same destination total 120 MB.
    let events = vec![
        transfer_event(1, "10.0.0.5", "203.0.113.9", 60_000_000, now),
        transfer_event(2, "10.0.0.6", "203.0.113.9", 60_000_000, now),
    ];
    let siem = Arc::new(MockSiem::new(vec![
        query_result(events),
        query_result(vec![]),
        query_result(vec![]),
        query_result(vec![]),
    ]));

    let mut agent = exfiltration_agent(siem, hunt_llm());
    let result = agent.run("hunt", serde_json::Value::Null).await;

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert!(finding.title.contains("203.0.113.9"));
    assert_eq!(finding.evidence["total_bytes"], serde_json::json!(120_000_000u64));
    assert_eq!(
        finding.evidence["mitre_technique_ids"],
        serde_json::json!(["T1567"])
    );
}

#[tokio::test]
async fn after_hours_transfers_detected() {
    let late = chrono::Utc.with_ymd_and_hms(2026, 3, 10, 23, 15, 0).unwrap();
    let business = chrono::Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap();
    let events = vec![
        transfer_event(1, "10.0.0.5", "203.0.113.9", 20_000_000, late),
        transfer_event(2, "10.0.0.6", "203.0.113.9", 20_000_000, business),
    ];
    let siem = Arc::new(MockSiem::new(vec![
        query_result(vec![]),
        query_result(vec![]),
        query_result(vec![]),
        query_result(events),
    ]));

    let mut agent = exfiltration_agent(siem, hunt_llm());
    let result = agent.run("hunt", serde_json::Value::Null).await;

    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Medium);
    assert_eq!(finding.evidence["event_count"], serde_json::json!(1));
    assert_eq!(
        finding.evidence["mitre_technique_ids"],
        serde_json::json!(["T1048"])
    );
}

#[tokio::test]
async fn lateral_movement_fanout_detected() {
    let mut rdp_events = Vec::new();
    for (i, dest) in ["10.0.0.20", "10.0.0.21", "10.0.0.22"].iter().enumerate() {
        let mut event = auth_failure(i, "10.0.0.5", "operator");
        event.dest_ip = Some(dest.to_string());
        rdp_events.push(event);
    }

    let siem = Arc::new(MockSiem::new(vec![
        query_result(rdp_events), // internal_rdp
        query_result(vec![]),     // service_account_hops
        query_result(vec![]),     // smb_winrm
        query_result(vec![]),     // unusual_internal_ports
    ]));

    let mut agent = LateralMovementHuntAgent::new(
        agent_config("hunt-lm-1", AgentType::Hunt, TenantId::new()),
        hunt_llm(),
        Arc::new(ToolRegistry::new()),
        siem,
        LateralMovementConfig::default(),
        None,
    )
    .unwrap();

    let result = agent.run("hunt", serde_json::Value::Null).await;
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert!(finding.title.contains("Internal RDP fan-out from 10.0.0.5"));
    assert_eq!(
        finding.evidence["mitre_technique_ids"],
        serde_json::json!(["T1021.001"])
    );
    let sigma_yaml = finding.evidence["sigma_yaml"].as_str().unwrap();
    assert!(sigma_yaml.contains("attack.lateral_movement"));
}

#[tokio::test]
async fn cancel_before_run_skips_all_queries() {
    let siem = Arc::new(MockSiem::new(vec![query_result(vec![auth_failure(
        1, "10.0.0.99", "admin",
    )])]));
    let mut agent = credential_agent(siem.clone(), hunt_llm());

    agent.core().request_cancel();
    let result = agent.run("hunt", serde_json::Value::Null).await;

    // No SIEM queries were executed, so no findings and no query actions.
    assert_eq!(siem.calls(), 0);
    assert!(result.findings.is_empty());
    assert_eq!(result.status, AgentStatus::Completed);

    let engram = agent.core_mut().take_finalized_engram().unwrap();
    assert!(engram
        .actions
        .iter()
        .all(|a| !a.action_type.starts_with("siem_query_")));
}

#[tokio::test]
async fn query_actions_recorded_in_order() {
    let siem = Arc::new(MockSiem::new(vec![
        query_result(vec![auth_failure(1, "10.0.0.99", "admin")]),
        query_result(vec![]),
        query_result(vec![]),
    ]));
    let mut agent = credential_agent(siem, hunt_llm());
    agent.run("hunt", serde_json::Value::Null).await;

    let engram = agent.core_mut().take_finalized_engram().unwrap();
    let query_actions: Vec<&str> = engram
        .actions
        .iter()
        .filter(|a| a.action_type.starts_with("siem_query_"))
        .map(|a| a.action_type.as_str())
        .collect();
    assert_eq!(
        query_actions,
        vec![
            "siem_query_failed_logins_by_ip",
            "siem_query_account_lockouts",
            "siem_query_service_account_failures",
        ]
    );
    // Every query action carries the DSL and hit count.
    for action in engram
        .actions
        .iter()
        .filter(|a| a.action_type.starts_with("siem_query_"))
    {
        assert!(action.details.get("query_dsl").is_some());
        assert!(action.details.get("total_hits").is_some());
    }
}

#[tokio::test]
async fn playbook_result_summarizes_the_run() {
    let siem = Arc::new(MockSiem::new(vec![
        query_result(vec![auth_failure(1, "10.0.0.99", "admin")]),
        query_result(vec![]),
        query_result(vec![]),
    ]));
    let mut agent = credential_agent(siem, hunt_llm());
    agent.run("hunt", serde_json::Value::Null).await;

    let report = agent.hunt_base().last_result.as_ref().unwrap();
    assert_eq!(report.playbook, PlaybookType::CredentialAbuse);
    assert_eq!(report.queries_executed, 3);
    assert_eq!(report.events_analyzed, 1);
    assert_eq!(report.summary, "Summary for the SOC.");
}

#[tokio::test]
async fn disabled_sigma_generation_leaves_findings_bare() {
    let events: Vec<SiemEvent> = (0..35)
        .map(|i| auth_failure(i, "10.0.0.99", "admin"))
        .collect();
    let siem = Arc::new(MockSiem::new(vec![
        query_result(events),
        query_result(vec![]),
        query_result(vec![]),
    ]));

    let mut config = CredentialAbuseConfig::default();
    config.hunt.generate_sigma_rules = false;
    let mut agent = CredentialAbuseHuntAgent::new(
        agent_config("hunt-cred-2", AgentType::Hunt, TenantId::new()),
        hunt_llm(),
        Arc::new(ToolRegistry::new()),
        siem,
        config,
        None,
    )
    .unwrap();

    let result = agent.run("hunt", serde_json::Value::Null).await;
    assert_eq!(result.findings.len(), 1);
    assert!(result.findings[0].evidence["sigma_yaml"].is_null());
}

#[tokio::test]
async fn unparseable_plan_fails_the_run() {
    let llm = Arc::new(MockLlmProvider::new(vec!["not a plan".to_string()]));
    let siem = Arc::new(MockSiem::empty());
    let mut agent = credential_agent(siem.clone(), llm);

    let result = agent.run("hunt", serde_json::Value::Null).await;
    assert_eq!(result.status, AgentStatus::Failed);
    assert!(result.engram_id.is_some());
    assert_eq!(siem.calls(), 0);
}

#[tokio::test]
async fn llm_findings_supplement_deterministic_ones() {
    let events: Vec<SiemEvent> = (0..35)
        .map(|i| auth_failure(i, "10.0.0.99", "admin"))
        .collect();
    let siem = Arc::new(MockSiem::new(vec![
        query_result(events),
        query_result(vec![]),
        query_result(vec![]),
    ]));

    let llm_findings = serde_json::json!({
        "findings": [{
            "severity": "low",
            "title": "Slow spray against admin",
            "description": "Timing suggests low-and-slow spraying",
            "mitre_technique_ids": ["T1110.003"],
            "affected_users": ["admin"],
        }]
    })
    .to_string();
    let llm = Arc::new(MockLlmProvider::new(vec![
        plan_json(),
        llm_findings,
        "summary".to_string(),
    ]));

    let mut agent = credential_agent(siem, llm);
    let result = agent.run("hunt", serde_json::Value::Null).await;

    assert_eq!(result.findings.len(), 2);
    let llm_finding = result
        .findings
        .iter()
        .find(|f| f.title == "Slow spray against admin")
        .unwrap();
    assert_eq!(llm_finding.severity, Severity::Low);
    assert_eq!(
        llm_finding.evidence["mitre_tactic"],
        serde_json::json!("Credential Access")
    );
}
