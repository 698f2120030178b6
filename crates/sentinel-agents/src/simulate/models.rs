//! Simulation configuration hierarchy and finding/result types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sentinel_core::{Evidence, Severity};

use crate::simulate::graph::{AttackPathRecord, BlastRadius};

/// MITRE ATT&CK tactic categories covered by simulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TacticType {
    InitialAccess,
    LateralMovement,
    PrivilegeEscalation,
    Exfiltration,
}

impl TacticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialAccess => "initial_access",
            Self::LateralMovement => "lateral_movement",
            Self::PrivilegeEscalation => "privilege_escalation",
            Self::Exfiltration => "exfiltration",
        }
    }
}

impl std::fmt::Display for TacticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base configuration for all adversarial simulations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub tactic: TacticType,
    /// Filter to specific MITRE ids; empty means all for the tactic.
    #[serde(default)]
    pub techniques: Vec<String>,
    pub max_paths: u32,
    pub max_depth: u32,
    pub min_exploitability: f64,
    pub include_blast_radius: bool,
    /// Empty means auto-detect crown jewels.
    #[serde(default)]
    pub target_node_ids: Vec<String>,
    /// Empty means auto-detect internet-facing nodes.
    #[serde(default)]
    pub source_node_ids: Vec<String>,
}

impl SimConfig {
    pub fn new(tactic: TacticType) -> Self {
        Self {
            tactic,
            techniques: Vec::new(),
            max_paths: 50,
            max_depth: 10,
            min_exploitability: 0.3,
            include_blast_radius: true,
            target_node_ids: Vec::new(),
            source_node_ids: Vec::new(),
        }
    }
}

/// Configuration for initial access simulations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialAccessConfig {
    #[serde(flatten)]
    pub sim: SimConfig,
    pub check_exposed_services: bool,
    pub check_phishing_vectors: bool,
    pub check_valid_accounts: bool,
    pub exposed_service_ports: Vec<u16>,
}

impl Default for InitialAccessConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::new(TacticType::InitialAccess),
            check_exposed_services: true,
            check_phishing_vectors: true,
            check_valid_accounts: true,
            exposed_service_ports: vec![80, 443, 8080, 8443, 3389, 22, 21, 25, 445],
        }
    }
}

/// Configuration for lateral movement simulations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralMovementSimConfig {
    #[serde(flatten)]
    pub sim: SimConfig,
    pub max_chain_length: u32,
    pub check_credential_reuse: bool,
    pub check_trust_exploitation: bool,
    pub check_remote_services: bool,
}

impl Default for LateralMovementSimConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::new(TacticType::LateralMovement),
            max_chain_length: 8,
            check_credential_reuse: true,
            check_trust_exploitation: true,
            check_remote_services: true,
        }
    }
}

/// Configuration for privilege escalation simulations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeEscalationConfig {
    #[serde(flatten)]
    pub sim: SimConfig,
    pub check_misconfigs: bool,
    pub check_vulnerable_services: bool,
    pub check_excessive_permissions: bool,
    pub admin_role_patterns: Vec<String>,
}

impl Default for PrivilegeEscalationConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::new(TacticType::PrivilegeEscalation),
            check_misconfigs: true,
            check_vulnerable_services: true,
            check_excessive_permissions: true,
            admin_role_patterns: vec![
                "admin".to_string(),
                "root".to_string(),
                "superuser".to_string(),
                "owner".to_string(),
                "contributor".to_string(),
            ],
        }
    }
}

/// Configuration for exfiltration simulations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExfiltrationConfig {
    #[serde(flatten)]
    pub sim: SimConfig,
    pub check_data_paths: bool,
    pub check_dns_exfil: bool,
    pub check_cloud_storage: bool,
    pub sensitive_data_labels: Vec<String>,
}

impl Default for ExfiltrationConfig {
    fn default() -> Self {
        Self {
            sim: SimConfig::new(TacticType::Exfiltration),
            check_data_paths: true,
            check_dns_exfil: true,
            check_cloud_storage: true,
            sensitive_data_labels: vec![
                "pii".to_string(),
                "phi".to_string(),
                "financial".to_string(),
                "credentials".to_string(),
                "source-code".to_string(),
            ],
        }
    }
}

/// Implementation effort for a remediation step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

/// A structured remediation recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationStep {
    pub title: String,
    pub description: String,
    pub priority: Severity,
    pub effort: Effort,
    #[serde(default)]
    pub automated: bool,
}

impl RemediationStep {
    pub fn new(title: &str, description: &str, priority: Severity, effort: Effort) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            priority,
            effort,
            automated: false,
        }
    }

    pub fn automated(mut self) -> Self {
        self.automated = true;
        self
    }
}

/// A finding from adversarial simulation with attack path context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationFinding {
    pub id: Uuid,
    pub tactic: TacticType,
    pub technique_id: String,
    pub technique_name: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub attack_paths: Vec<AttackPathRecord>,
    pub blast_radius: Option<BlastRadius>,
    /// Risk score in [0.0, 10.0].
    pub risk_score: f64,
    #[serde(default)]
    pub affected_nodes: Vec<String>,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub remediation: Vec<RemediationStep>,
    pub mitre_url: String,
}

impl SimulationFinding {
    /// A finding seeded from a technique's identity; callers fill in the
    /// pattern-specific fields.
    pub fn new(
        technique: &crate::simulate::mitre::MitreTechnique,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tactic: technique.tactic,
            technique_id: technique.technique_id.clone(),
            technique_name: technique.technique_name.clone(),
            severity,
            title: title.into(),
            description: description.into(),
            attack_paths: Vec::new(),
            blast_radius: None,
            risk_score: 0.0,
            affected_nodes: Vec::new(),
            evidence: Evidence::new(),
            remediation: Vec::new(),
            mitre_url: technique.mitre_url.clone(),
        }
    }
}

/// Complete result from a tactic simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub tactic: TacticType,
    pub config: SimConfig,
    pub findings: Vec<SimulationFinding>,
    pub techniques_tested: usize,
    pub techniques_with_findings: usize,
    pub highest_risk_score: f64,
    pub duration_seconds: f64,
    pub summary: String,
}

/// Compute a 0–10 risk score from path risk, severity, and blast radius.
pub fn compute_risk_score(path_risk: f64, severity: Severity, blast_score: f64) -> f64 {
    let severity_multiplier = match severity {
        Severity::Critical => 1.0,
        Severity::High => 0.8,
        Severity::Medium => 0.5,
        Severity::Low => 0.2,
        Severity::Info => 0.5,
    };
    let score = (path_risk * 5.0) + (severity_multiplier * 2.5) + (blast_score * 2.5);
    score.clamp(0.0, 10.0)
}
