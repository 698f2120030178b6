//! End-to-end simulation playbook scenarios over a mock graph.

mod common;

use std::sync::Arc;

use common::{
    agent_config, attack_path, host, lateral_chain, plan_json, service, trust_edge, user,
    vulnerability, MockGraph,
};
use sentinel_agents::agent::Agent;
use sentinel_agents::llm::MockLlmProvider;
use sentinel_agents::simulate::graph::{BlastRadius, PathfindReport};
use sentinel_agents::simulate::{
    ExfiltrationConfig, ExfiltrationSimAgent, InitialAccessConfig, InitialAccessSimAgent,
    LateralMovementSimAgent, LateralMovementSimConfig, PrivilegeEscalationConfig,
    PrivilegeEscalationSimAgent, SimHooks, TacticType,
};
use sentinel_agents::tools::ToolRegistry;
use sentinel_core::{AgentStatus, AgentType, Severity, TenantId};

fn sim_llm() -> Arc<MockLlmProvider> {
    Arc::new(MockLlmProvider::new(vec![
        plan_json(),
        "Red-team assessment for the CISO.".to_string(),
    ]))
}

fn initial_access_agent(
    graph: Arc<MockGraph>,
    techniques: &[&str],
) -> InitialAccessSimAgent {
    let mut config = InitialAccessConfig::default();
    config.sim.techniques = techniques.iter().map(|t| t.to_string()).collect();
    InitialAccessSimAgent::new(
        agent_config("sim-ia-1", AgentType::Simulate, TenantId::new()),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        graph,
        config,
        None,
    )
    .unwrap()
}

#[tokio::test]
async fn exploitable_public_facing_host_is_critical() {
    let graph = Arc::new(
        MockGraph::default()
            .with_nodes(
                "Host",
                vec![host(
                    "h-web",
                    "web-01",
                    serde_json::json!({"is_internet_facing": true, "criticality": "high"}),
                )],
            )
            .with_neighbors(
                "h-web",
                vec![vulnerability("v-1", "CVE-2024-1234", 9.8, true)],
            )
            .with_pathfind(PathfindReport {
                attack_paths: vec![attack_path("h-web", "h-db", 0.8)],
                lateral_chains: vec![],
            }),
    );

    let mut agent = initial_access_agent(graph, &["T1190"]);
    let result = agent.run("simulate initial access", serde_json::Value::Null).await;

    assert_eq!(result.status, AgentStatus::Completed);
    assert_eq!(result.findings.len(), 1);

    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.evidence["technique_id"], serde_json::json!("T1190"));
    assert!(finding.evidence["cve_ids"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("CVE-2024-1234")));
    assert_eq!(finding.evidence["attack_paths_count"], serde_json::json!(1));

    // risk = 0.8*5 + 1.0*2.5 = 6.5
    let risk = finding.evidence["risk_score"].as_f64().unwrap();
    assert!((risk - 6.5).abs() < 1e-9);
    assert!(
        finding.evidence["mitre_url"]
            .as_str()
            .unwrap()
            .contains("attack.mitre.org")
    );
}

#[tokio::test]
async fn empty_graph_produces_no_findings_for_any_tactic() {
    // Invariant: a simulation over an empty graph completes with zero
    // findings across all four tactics.
    let tenant = TenantId::new();

    let mut ia = InitialAccessSimAgent::new(
        agent_config("sim-ia", AgentType::Simulate, tenant),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        Arc::new(MockGraph::default()),
        InitialAccessConfig::default(),
        None,
    )
    .unwrap();
    let mut lm = LateralMovementSimAgent::new(
        agent_config("sim-lm", AgentType::Simulate, tenant),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        Arc::new(MockGraph::default()),
        LateralMovementSimConfig::default(),
        None,
    )
    .unwrap();
    let mut pe = PrivilegeEscalationSimAgent::new(
        agent_config("sim-pe", AgentType::Simulate, tenant),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        Arc::new(MockGraph::default()),
        PrivilegeEscalationConfig::default(),
        None,
    )
    .unwrap();
    let mut ex = ExfiltrationSimAgent::new(
        agent_config("sim-ex", AgentType::Simulate, tenant),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        Arc::new(MockGraph::default()),
        ExfiltrationConfig::default(),
        None,
    )
    .unwrap();

    for result in [
        ia.run("simulate", serde_json::Value::Null).await,
        lm.run("simulate", serde_json::Value::Null).await,
        pe.run("simulate", serde_json::Value::Null).await,
        ex.run("simulate", serde_json::Value::Null).await,
    ] {
        assert_eq!(result.status, AgentStatus::Completed);
        assert!(result.findings.is_empty());
        // All five techniques for the tactic were still evaluated.
        assert_eq!(result.actions_taken, 5);
        assert!(result.engram_id.is_some());
    }
}

#[tokio::test]
async fn pass_the_hash_computes_blast_radius() {
    let admin_host = |id: &str| {
        host(
            id,
            id,
            serde_json::json!({"permissions": ["Admin:Full"], "criticality": "high"}),
        )
    };
    let graph = Arc::new(
        MockGraph::default()
            .with_nodes(
                "User",
                vec![user("u-1", "jdoe", serde_json::json!({"user_type": "human"}))],
            )
            .with_neighbors("u-1", vec![admin_host("h-1"), admin_host("h-2")])
            .with_blast(BlastRadius {
                blast_score: 0.6,
                total_reachable: 14,
                critical_reachable: 3,
            }),
    );

    let mut config = LateralMovementSimConfig::default();
    config.sim.techniques = vec!["T1550.002".to_string()];
    let mut agent = LateralMovementSimAgent::new(
        agent_config("sim-lm-2", AgentType::Simulate, TenantId::new()),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        graph,
        config,
        None,
    )
    .unwrap();

    let result = agent.run("simulate", serde_json::Value::Null).await;
    assert_eq!(result.findings.len(), 1);

    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.evidence["technique_id"], serde_json::json!("T1550.002"));
    assert_eq!(finding.evidence["blast_score"], serde_json::json!(0.6));
    // risk = 0.7*5 + 1.0*2.5 + 0.6*2.5 = 7.5
    let risk = finding.evidence["risk_score"].as_f64().unwrap();
    assert!((risk - 7.5).abs() < 1e-9);
}

#[tokio::test]
async fn rdp_chains_detected_from_lateral_report() {
    let graph = Arc::new(
        MockGraph::default()
            .with_nodes("Service", vec![service("s-1", "rdp", 3389)])
            .with_pathfind(PathfindReport {
                attack_paths: vec![],
                lateral_chains: vec![
                    lateral_chain(&["rdp-hop", "credential-access"], 0.7),
                    lateral_chain(&["ssh-pivot"], 0.4),
                ],
            }),
    );

    let mut config = LateralMovementSimConfig::default();
    config.sim.techniques = vec!["T1021.001".to_string()];
    let mut agent = LateralMovementSimAgent::new(
        agent_config("sim-lm-3", AgentType::Simulate, TenantId::new()),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        graph,
        config,
        None,
    )
    .unwrap();

    let result = agent.run("simulate", serde_json::Value::Null).await;
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    // Only the rdp chain counts, not the ssh one.
    assert_eq!(finding.evidence["chain_count"], serde_json::json!(1));
    assert_eq!(finding.severity, Severity::High);
}

#[tokio::test]
async fn transitive_trusts_detected() {
    let graph = Arc::new(MockGraph::default().with_edges(vec![
        trust_edge("e-1", "vpc-a", "vpc-b"),
        trust_edge("e-2", "vpc-b", "vpc-c"),
    ]));

    let mut config = LateralMovementSimConfig::default();
    config.sim.techniques = vec!["T1482".to_string()];
    let mut agent = LateralMovementSimAgent::new(
        agent_config("sim-lm-4", AgentType::Simulate, TenantId::new()),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        graph,
        config,
        None,
    )
    .unwrap();

    let result = agent.run("simulate", serde_json::Value::Null).await;
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Medium);
    assert_eq!(finding.evidence["transitive_hops"], serde_json::json!(1));
    assert_eq!(finding.evidence["trust_count"], serde_json::json!(2));
}

#[tokio::test]
async fn high_cvss_exploitables_flagged_for_privilege_escalation() {
    let graph = Arc::new(MockGraph::default().with_nodes(
        "Vulnerability",
        vec![
            vulnerability("v-1", "CVE-2024-0001", 9.8, true),
            vulnerability("v-2", "CVE-2024-0002", 8.1, true),
            vulnerability("v-3", "CVE-2024-0003", 9.9, false), // not exploitable
            vulnerability("v-4", "CVE-2024-0004", 5.0, true),  // below CVSS bar
        ],
    ));

    let mut config = PrivilegeEscalationConfig::default();
    config.sim.techniques = vec!["T1068".to_string()];
    let mut agent = PrivilegeEscalationSimAgent::new(
        agent_config("sim-pe-2", AgentType::Simulate, TenantId::new()),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        graph,
        config,
        None,
    )
    .unwrap();

    let result = agent.run("simulate", serde_json::Value::Null).await;
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.evidence["vuln_count"], serde_json::json!(2));
    assert_eq!(finding.evidence["max_cvss"], serde_json::json!(9.8));
}

#[tokio::test]
async fn enabled_default_account_with_access_flagged() {
    let graph = Arc::new(
        MockGraph::default()
            .with_nodes(
                "User",
                vec![
                    user("u-1", "Admin", serde_json::json!({"enabled": true})),
                    user("u-2", "jdoe", serde_json::json!({"enabled": true})),
                    user("u-3", "guest", serde_json::json!({"enabled": false})),
                ],
            )
            .with_neighbors(
                "u-1",
                vec![host("h-1", "db-01", serde_json::json!({"criticality": "high"}))],
            ),
    );

    let mut config = PrivilegeEscalationConfig::default();
    config.sim.techniques = vec!["T1078.001".to_string()];
    let mut agent = PrivilegeEscalationSimAgent::new(
        agent_config("sim-pe-3", AgentType::Simulate, TenantId::new()),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        graph,
        config,
        None,
    )
    .unwrap();

    let result = agent.run("simulate", serde_json::Value::Null).await;
    // One finding per default account with access: only "Admin" qualifies.
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert!(finding.title.contains("Admin"));
    assert_eq!(finding.severity, Severity::High);
}

#[tokio::test]
async fn egress_paths_from_crown_jewels_are_critical() {
    let graph = Arc::new(
        MockGraph::default()
            .with_nodes(
                "Host",
                vec![
                    host("h-db", "db-01", serde_json::json!({"criticality": "critical"})),
                    host(
                        "h-web",
                        "web-01",
                        serde_json::json!({"is_internet_facing": true, "criticality": "low"}),
                    ),
                ],
            )
            .with_pathfind(PathfindReport {
                attack_paths: vec![attack_path("h-db", "h-web", 0.9)],
                lateral_chains: vec![],
            }),
    );

    let mut config = ExfiltrationConfig::default();
    config.sim.techniques = vec!["T1041".to_string()];
    let mut agent = ExfiltrationSimAgent::new(
        agent_config("sim-ex-2", AgentType::Simulate, TenantId::new()),
        sim_llm(),
        Arc::new(ToolRegistry::new()),
        graph,
        config,
        None,
    )
    .unwrap();

    let result = agent.run("simulate", serde_json::Value::Null).await;
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.evidence["paths_count"], serde_json::json!(1));
    assert_eq!(finding.evidence["crown_jewel_count"], serde_json::json!(1));
}

#[tokio::test]
async fn all_risk_scores_stay_in_range() {
    let graph = Arc::new(
        MockGraph::default()
            .with_nodes(
                "Host",
                vec![host(
                    "h-web",
                    "web-01",
                    serde_json::json!({"is_internet_facing": true, "criticality": "critical"}),
                )],
            )
            .with_nodes(
                "User",
                vec![user(
                    "u-1",
                    "root",
                    serde_json::json!({"user_type": "human", "mfa_enabled": false, "enabled": true}),
                )],
            )
            .with_nodes("Service", vec![service("s-1", "sshd", 22)])
            .with_nodes(
                "Vulnerability",
                vec![vulnerability("v-1", "CVE-2024-1234", 10.0, true)],
            )
            .with_neighbors(
                "h-web",
                vec![
                    vulnerability("v-1", "CVE-2024-1234", 10.0, true),
                    service("s-ssh", "sshd", 22),
                ],
            )
            .with_neighbors(
                "u-1",
                vec![host("h-crit", "dc-01", serde_json::json!({"criticality": "critical"}))],
            )
            .with_pathfind(PathfindReport {
                attack_paths: vec![attack_path("h-web", "h-crit", 1.0)],
                lateral_chains: vec![lateral_chain(&["ssh-pivot"], 1.0)],
            })
            .with_blast(BlastRadius {
                blast_score: 1.0,
                total_reachable: 50,
                critical_reachable: 10,
            }),
    );

    let mut agent = initial_access_agent(graph, &[]);
    let result = agent.run("simulate everything", serde_json::Value::Null).await;

    assert_eq!(result.status, AgentStatus::Completed);
    assert!(!result.findings.is_empty());
    for finding in &result.findings {
        let risk = finding.evidence["risk_score"].as_f64().unwrap();
        assert!((0.0..=10.0).contains(&risk), "risk {risk} out of range");
    }
}

#[tokio::test]
async fn cancel_before_run_skips_technique_simulation() {
    let graph = Arc::new(
        MockGraph::default()
            .with_nodes(
                "Host",
                vec![host(
                    "h-web",
                    "web-01",
                    serde_json::json!({"is_internet_facing": true}),
                )],
            )
            .with_neighbors(
                "h-web",
                vec![vulnerability("v-1", "CVE-2024-1234", 9.8, true)],
            ),
    );

    let mut agent = initial_access_agent(graph.clone(), &[]);
    agent.core().request_cancel();
    let result = agent.run("simulate", serde_json::Value::Null).await;

    assert!(result.findings.is_empty());
    // No technique ever touched the graph's neighbor API.
    assert_eq!(graph.neighbor_calls(), 0);

    let engram = agent.core_mut().take_finalized_engram().unwrap();
    assert!(engram
        .actions
        .iter()
        .all(|a| !a.action_type.starts_with("simulate_")));
}

#[tokio::test]
async fn technique_actions_recorded_per_simulation() {
    let mut agent = initial_access_agent(Arc::new(MockGraph::default()), &[]);
    agent.run("simulate", serde_json::Value::Null).await;

    let engram = agent.core_mut().take_finalized_engram().unwrap();
    let technique_actions: Vec<&str> = engram
        .actions
        .iter()
        .filter(|a| a.action_type.starts_with("simulate_"))
        .map(|a| a.action_type.as_str())
        .collect();
    assert_eq!(
        technique_actions,
        vec![
            "simulate_T1190",
            "simulate_T1133",
            "simulate_T1566",
            "simulate_T1078",
            "simulate_T1199",
        ]
    );

    let report = agent.sim_base().last_result.as_ref().unwrap();
    assert_eq!(report.tactic, TacticType::InitialAccess);
    assert_eq!(report.techniques_tested, 5);
    assert_eq!(report.techniques_with_findings, 0);
    assert!(report.summary.contains("No findings"));
}
