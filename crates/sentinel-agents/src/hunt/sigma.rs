//! Sigma detection rule generation from hunt findings.
//!
//! Findings are converted into portable Sigma rules conforming to the
//! SigmaHQ specification. Each playbook has its own builder that maps
//! finding evidence onto detection selections.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sentinel_core::Severity;

use crate::hunt::models::{HuntFinding, PlaybookType};

/// Detection logic for a Sigma rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigmaDetection {
    pub selection: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub filter: serde_json::Map<String, serde_json::Value>,
    pub condition: String,
}

/// A Sigma detection rule.
///
/// Field declaration order matches the SigmaHQ key order, which is
/// preserved when serializing to YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigmaRule {
    pub title: String,
    pub id: Uuid,
    pub status: String,
    pub description: String,
    pub author: String,
    pub date: String,
    pub references: Vec<String>,
    pub tags: Vec<String>,
    pub logsource: BTreeMap<String, String>,
    pub detection: SigmaDetection,
    pub falsepositives: Vec<String>,
    pub level: String,
}

impl SigmaRule {
    /// Serialize to Sigma YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Map finding severity to a Sigma level.
fn severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
        Severity::Info => "informational",
    }
}

/// Converts hunt findings into Sigma detection rules.
///
/// Dispatches to playbook-specific builders. Each builder extracts
/// evidence fields and constructs detection logic appropriate to the
/// threat category.
#[derive(Debug, Default, Clone, Copy)]
pub struct SigmaGenerator;

impl SigmaGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a Sigma rule from a hunt finding.
    ///
    /// Returns `None` when the finding carries no evidence a rule could
    /// select on.
    pub fn from_finding(&self, finding: &HuntFinding) -> Option<SigmaRule> {
        Some(match finding.playbook {
            PlaybookType::CredentialAbuse => self.credential_abuse_rule(finding),
            PlaybookType::LateralMovement => self.lateral_movement_rule(finding),
            PlaybookType::DataExfiltration => self.data_exfiltration_rule(finding),
        })
    }

    fn credential_abuse_rule(&self, finding: &HuntFinding) -> SigmaRule {
        let mut selection = serde_json::Map::new();
        selection.insert("event.outcome".to_string(), "failure".into());
        selection.insert("event.category".to_string(), "authentication".into());
        copy_evidence(&mut selection, finding, "source_ips", "source.ip");
        copy_evidence(&mut selection, finding, "target_users", "user.name");
        copy_evidence(&mut selection, finding, "event_ids", "event.code");

        self.rule(
            finding,
            "credential_access",
            selection,
            logsource("authentication", "windows"),
            vec!["Legitimate account lockout due to password change".to_string()],
        )
    }

    fn lateral_movement_rule(&self, finding: &HuntFinding) -> SigmaRule {
        let mut selection = serde_json::Map::new();
        copy_evidence(&mut selection, finding, "source_hosts", "source.ip");
        copy_evidence(&mut selection, finding, "dest_hosts", "destination.ip");
        if finding.evidence.contains_key("dest_ports") {
            copy_evidence(&mut selection, finding, "dest_ports", "destination.port");
        } else {
            selection.insert(
                "destination.port".to_string(),
                serde_json::json!([3389, 445, 5985]),
            );
        }

        self.rule(
            finding,
            "lateral_movement",
            selection,
            logsource("network_connection", "any"),
            vec!["Legitimate system administration via RDP or WinRM".to_string()],
        )
    }

    fn data_exfiltration_rule(&self, finding: &HuntFinding) -> SigmaRule {
        let mut selection = serde_json::Map::new();
        copy_evidence(&mut selection, finding, "dest_ips", "destination.ip");
        copy_evidence(&mut selection, finding, "dest_ports", "destination.port");
        copy_evidence(
            &mut selection,
            finding,
            "dns_queries",
            "dns.question.name|contains",
        );

        self.rule(
            finding,
            "exfiltration",
            selection,
            logsource("network_connection", "any"),
            vec![
                "Large legitimate file transfers".to_string(),
                "Backup operations".to_string(),
            ],
        )
    }

    fn rule(
        &self,
        finding: &HuntFinding,
        tactic_tag: &str,
        selection: serde_json::Map<String, serde_json::Value>,
        logsource: BTreeMap<String, String>,
        falsepositives: Vec<String>,
    ) -> SigmaRule {
        let mut tags = vec![format!("attack.{tactic_tag}")];
        for tid in &finding.mitre_technique_ids {
            tags.push(format!("attack.{}", tid.to_lowercase()));
        }

        SigmaRule {
            title: finding.title.clone(),
            id: Uuid::new_v4(),
            status: "experimental".to_string(),
            description: finding.description.clone(),
            author: "Sentinel Hunt Agent".to_string(),
            date: Utc::now().format("%Y/%m/%d").to_string(),
            references: Vec::new(),
            tags,
            logsource,
            detection: SigmaDetection {
                selection,
                filter: serde_json::Map::new(),
                condition: "selection".to_string(),
            },
            falsepositives,
            level: severity_to_level(finding.severity).to_string(),
        }
    }
}

fn logsource(category: &str, product: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("category".to_string(), category.to_string()),
        ("product".to_string(), product.to_string()),
    ])
}

fn copy_evidence(
    selection: &mut serde_json::Map<String, serde_json::Value>,
    finding: &HuntFinding,
    evidence_key: &str,
    selection_key: &str,
) {
    if let Some(value) = finding.evidence.get(evidence_key) {
        selection.insert(selection_key.to_string(), value.clone());
    }
}
