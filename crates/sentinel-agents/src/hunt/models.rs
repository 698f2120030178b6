//! Hunt-specific data models and configuration types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sentinel_core::{Evidence, Severity};

use crate::hunt::sigma::SigmaRule;

/// Built-in hunt playbook identifiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookType {
    CredentialAbuse,
    LateralMovement,
    DataExfiltration,
}

impl PlaybookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialAbuse => "credential_abuse",
            Self::LateralMovement => "lateral_movement",
            Self::DataExfiltration => "data_exfiltration",
        }
    }
}

impl std::fmt::Display for PlaybookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base configuration shared by all hunt playbooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntConfig {
    pub playbook: PlaybookType,
    pub time_window_hours: i64,
    pub index_pattern: String,
    pub max_results_per_query: u32,
    pub severity_threshold: Severity,
    #[serde(default)]
    pub target_hosts: Vec<String>,
    #[serde(default)]
    pub target_users: Vec<String>,
    pub generate_sigma_rules: bool,
}

impl HuntConfig {
    pub fn new(playbook: PlaybookType) -> Self {
        Self {
            playbook,
            time_window_hours: 24,
            index_pattern: "filebeat-*,winlogbeat-*,logs-*".to_string(),
            max_results_per_query: 1000,
            severity_threshold: Severity::Medium,
            target_hosts: Vec::new(),
            target_users: Vec::new(),
            generate_sigma_rules: true,
        }
    }
}

/// Configuration for the credential abuse playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialAbuseConfig {
    #[serde(flatten)]
    pub hunt: HuntConfig,
    pub failed_login_threshold: u64,
    pub brute_force_window_minutes: u32,
    pub lockout_correlation: bool,
    pub credential_stuffing_unique_users: usize,
    pub service_account_monitoring: bool,
}

impl Default for CredentialAbuseConfig {
    fn default() -> Self {
        Self {
            hunt: HuntConfig::new(PlaybookType::CredentialAbuse),
            failed_login_threshold: 10,
            brute_force_window_minutes: 5,
            lockout_correlation: true,
            credential_stuffing_unique_users: 5,
            service_account_monitoring: true,
        }
    }
}

/// Configuration for the lateral movement playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralMovementConfig {
    #[serde(flatten)]
    pub hunt: HuntConfig,
    pub internal_subnet_prefixes: Vec<String>,
    pub rdp_chain_max_hops: u32,
    pub service_account_hop_threshold: usize,
    pub unusual_port_threshold: u32,
}

impl Default for LateralMovementConfig {
    fn default() -> Self {
        Self {
            hunt: HuntConfig::new(PlaybookType::LateralMovement),
            internal_subnet_prefixes: vec![
                "10.".to_string(),
                "172.16.".to_string(),
                "192.168.".to_string(),
            ],
            rdp_chain_max_hops: 3,
            service_account_hop_threshold: 2,
            unusual_port_threshold: 5,
        }
    }
}

/// Configuration for the data exfiltration playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataExfiltrationConfig {
    #[serde(flatten)]
    pub hunt: HuntConfig,
    pub large_transfer_bytes: u64,
    pub dns_query_length_threshold: usize,
    pub dns_txt_record_threshold: u32,
    pub unusual_destination_check: bool,
    /// Hour of day (UTC) after which transfers count as after-hours.
    pub after_hours_start: u32,
    /// Hour of day (UTC) before which transfers count as after-hours.
    pub after_hours_end: u32,
}

impl Default for DataExfiltrationConfig {
    fn default() -> Self {
        Self {
            hunt: HuntConfig::new(PlaybookType::DataExfiltration),
            large_transfer_bytes: 100_000_000, // 100 MB
            dns_query_length_threshold: 50,
            dns_txt_record_threshold: 10,
            unusual_destination_check: true,
            after_hours_start: 22,
            after_hours_end: 6,
        }
    }
}

/// A finding produced by a hunt playbook, with MITRE ATT&CK context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntFinding {
    pub id: Uuid,
    pub playbook: PlaybookType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub affected_hosts: Vec<String>,
    #[serde(default)]
    pub affected_users: Vec<String>,
    #[serde(default)]
    pub mitre_technique_ids: Vec<String>,
    #[serde(default)]
    pub mitre_tactic: String,
    pub sigma_rule: Option<SigmaRule>,
}

impl HuntFinding {
    pub fn new(
        playbook: PlaybookType,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            playbook,
            severity,
            title: title.into(),
            description: description.into(),
            evidence: Evidence::new(),
            recommendations: Vec::new(),
            affected_hosts: Vec::new(),
            affected_users: Vec::new(),
            mitre_technique_ids: Vec::new(),
            mitre_tactic: String::new(),
            sigma_rule: None,
        }
    }
}

/// Complete result from a hunt playbook execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookResult {
    pub playbook: PlaybookType,
    pub config: HuntConfig,
    pub findings: Vec<HuntFinding>,
    pub sigma_rules: Vec<SigmaRule>,
    pub queries_executed: usize,
    pub events_analyzed: u64,
    pub duration_seconds: f64,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playbook_type_serializes_snake_case() {
        let json = serde_json::to_string(&PlaybookType::CredentialAbuse).unwrap();
        assert_eq!(json, "\"credential_abuse\"");
        assert_eq!(PlaybookType::DataExfiltration.as_str(), "data_exfiltration");
    }

    #[test]
    fn config_defaults() {
        let config = CredentialAbuseConfig::default();
        assert_eq!(config.failed_login_threshold, 10);
        assert_eq!(config.credential_stuffing_unique_users, 5);
        assert_eq!(config.hunt.time_window_hours, 24);
        assert!(config.hunt.generate_sigma_rules);

        let config = DataExfiltrationConfig::default();
        assert_eq!(config.large_transfer_bytes, 100_000_000);
        assert_eq!(config.dns_query_length_threshold, 50);
        assert_eq!(config.after_hours_start, 22);
        assert_eq!(config.after_hours_end, 6);

        let config = LateralMovementConfig::default();
        assert_eq!(config.service_account_hop_threshold, 2);
        assert_eq!(
            config.internal_subnet_prefixes,
            vec!["10.", "172.16.", "192.168."]
        );
    }

    #[test]
    fn flattened_config_serialization() {
        let config = CredentialAbuseConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        // The common hunt fields flatten into the same object.
        assert_eq!(json["playbook"], "credential_abuse");
        assert_eq!(json["failed_login_threshold"], 10);
    }
}
