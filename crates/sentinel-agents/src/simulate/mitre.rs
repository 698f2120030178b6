//! MITRE ATT&CK technique taxonomy for adversarial simulation.
//!
//! Twenty built-in techniques, five per tactic, each carrying a graph
//! query pattern describing what to look for in the digital twin.

use serde::{Deserialize, Serialize};

use sentinel_core::{EdgeType, Severity};

use crate::simulate::models::TacticType;

/// Describes what to query in the graph to test a technique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQueryPattern {
    pub node_labels: Vec<String>,
    pub edge_types: Vec<EdgeType>,
    #[serde(default)]
    pub required_properties: serde_json::Value,
    pub description: String,
}

/// A MITRE ATT&CK technique with graph query metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitreTechnique {
    pub technique_id: String,
    pub technique_name: String,
    pub tactic: TacticType,
    pub description: String,
    pub mitre_url: String,
    pub severity_default: Severity,
    pub graph_query: GraphQueryPattern,
}

#[allow(clippy::too_many_arguments)]
fn technique(
    technique_id: &str,
    technique_name: &str,
    tactic: TacticType,
    description: &str,
    severity_default: Severity,
    node_labels: &[&str],
    edge_types: &[EdgeType],
    required_properties: serde_json::Value,
    query_description: &str,
) -> MitreTechnique {
    let url_path = technique_id.replace('.', "/");
    MitreTechnique {
        technique_id: technique_id.to_string(),
        technique_name: technique_name.to_string(),
        tactic,
        description: description.to_string(),
        mitre_url: format!("https://attack.mitre.org/techniques/{url_path}/"),
        severity_default,
        graph_query: GraphQueryPattern {
            node_labels: node_labels.iter().map(|l| l.to_string()).collect(),
            edge_types: edge_types.to_vec(),
            required_properties,
            description: query_description.to_string(),
        },
    }
}

/// All built-in techniques, grouped by tactic.
pub fn all_techniques() -> Vec<MitreTechnique> {
    use EdgeType::*;
    use TacticType::*;

    vec![
        // ── Initial Access ────────────────────────────────────────
        technique(
            "T1190",
            "Exploit Public-Facing Application",
            InitialAccess,
            "Adversaries may exploit vulnerabilities in internet-facing applications to gain \
             initial access.",
            Severity::Critical,
            &["Host", "Service", "Vulnerability"],
            &[RunsOn, HasCve, Exposes],
            serde_json::json!({"is_internet_facing": true, "exploitable": true}),
            "Internet-facing Hosts with Services that have exploitable CVEs",
        ),
        technique(
            "T1133",
            "External Remote Services",
            InitialAccess,
            "Adversaries may leverage external remote services (RDP, SSH, VNC) as initial \
             access vectors.",
            Severity::High,
            &["Host", "Service", "User"],
            &[Exposes, HasAccess],
            serde_json::json!({"is_internet_facing": true}),
            "Services on remote-access ports (22, 3389, 5900, 5985) on internet-facing Hosts \
             without MFA",
        ),
        technique(
            "T1566",
            "Phishing",
            InitialAccess,
            "Adversaries may send phishing messages to gain access to victim systems via user \
             interaction.",
            Severity::High,
            &["User", "Host"],
            &[HasAccess],
            serde_json::json!({"mfa_enabled": false}),
            "Users without MFA who have access to critical systems",
        ),
        technique(
            "T1078",
            "Valid Accounts",
            InitialAccess,
            "Adversaries may use valid credentials to gain initial access, including service \
             accounts and stale human accounts.",
            Severity::High,
            &["User", "Role"],
            &[HasAccess, MemberOf],
            serde_json::json!({}),
            "Service accounts with excessive access or stale human accounts",
        ),
        technique(
            "T1199",
            "Trusted Relationship",
            InitialAccess,
            "Adversaries may exploit trusted third-party relationships to gain initial access \
             to a target network.",
            Severity::Medium,
            &["Host", "Vpc"],
            &[Trusts],
            serde_json::json!({}),
            "TRUSTS edges across VPCs or cloud boundaries",
        ),
        // ── Lateral Movement ──────────────────────────────────────
        technique(
            "T1021.001",
            "Remote Desktop Protocol",
            LateralMovement,
            "Adversaries may use RDP to move laterally between internal hosts.",
            Severity::High,
            &["Host", "Service"],
            &[HasAccess, CanReach],
            serde_json::json!({"port": 3389}),
            "RDP lateral chains via port 3389",
        ),
        technique(
            "T1021.004",
            "SSH",
            LateralMovement,
            "Adversaries may use SSH to move laterally between internal hosts.",
            Severity::High,
            &["Host", "Service"],
            &[HasAccess, CanReach],
            serde_json::json!({"port": 22}),
            "SSH lateral chains via port 22",
        ),
        technique(
            "T1550.002",
            "Pass the Hash",
            LateralMovement,
            "Adversaries may use stolen password hashes to authenticate to systems without \
             knowing the plaintext password.",
            Severity::Critical,
            &["User", "Host"],
            &[HasAccess],
            serde_json::json!({}),
            "Admin users with HAS_ACCESS to multiple hosts (credential reuse)",
        ),
        technique(
            "T1558",
            "Steal or Forge Kerberos Tickets",
            LateralMovement,
            "Adversaries may steal or forge Kerberos tickets to move laterally within an \
             environment.",
            Severity::Critical,
            &["User", "Group", "Host"],
            &[MemberOf, HasAccess],
            serde_json::json!({}),
            "Privileged group members with access to domain controllers",
        ),
        technique(
            "T1482",
            "Domain Trust Discovery",
            LateralMovement,
            "Adversaries may enumerate trust relationships between domains to identify lateral \
             movement opportunities.",
            Severity::Medium,
            &["Host", "Vpc"],
            &[Trusts],
            serde_json::json!({}),
            "Transitive TRUSTS chains enabling cross-domain access",
        ),
        // ── Privilege Escalation ──────────────────────────────────
        technique(
            "T1068",
            "Exploitation for Privilege Escalation",
            PrivilegeEscalation,
            "Adversaries may exploit software vulnerabilities to escalate privileges on a \
             system.",
            Severity::Critical,
            &["Host", "Service", "Vulnerability"],
            &[RunsOn, HasCve],
            serde_json::json!({"exploitable": true}),
            "Services with high-CVSS exploitable CVEs for privilege escalation",
        ),
        technique(
            "T1078.001",
            "Valid Accounts: Default Accounts",
            PrivilegeEscalation,
            "Adversaries may use default account credentials to escalate privileges.",
            Severity::High,
            &["User"],
            &[HasAccess],
            serde_json::json!({}),
            "Users with default names (admin, root, guest, sa) that are enabled",
        ),
        technique(
            "T1548",
            "Abuse Elevation Control Mechanism",
            PrivilegeEscalation,
            "Adversaries may circumvent elevation controls to gain higher privileges on a \
             system.",
            Severity::High,
            &["User", "Role"],
            &[MemberOf],
            serde_json::json!({}),
            "Roles with wildcard or overly broad permissions",
        ),
        technique(
            "T1134",
            "Access Token Manipulation",
            PrivilegeEscalation,
            "Adversaries may modify access tokens to operate under a different security \
             context.",
            Severity::High,
            &["User", "Host"],
            &[HasAccess, Trusts],
            serde_json::json!({}),
            "Service accounts accessing many critical hosts with trust edges",
        ),
        technique(
            "T1098",
            "Account Manipulation",
            PrivilegeEscalation,
            "Adversaries may manipulate accounts to maintain or elevate access to victim \
             systems.",
            Severity::High,
            &["User", "Role", "Policy"],
            &[MemberOf, HasAccess],
            serde_json::json!({}),
            "Overly broad roles with identity management access",
        ),
        // ── Exfiltration ──────────────────────────────────────────
        technique(
            "T1041",
            "Exfiltration Over C2 Channel",
            Exfiltration,
            "Adversaries may exfiltrate data over an existing command and control channel.",
            Severity::Critical,
            &["Host"],
            &[CanReach, ConnectsTo],
            serde_json::json!({}),
            "Paths from crown jewels to internet-facing nodes",
        ),
        technique(
            "T1048",
            "Exfiltration Over Alternative Protocol",
            Exfiltration,
            "Adversaries may use non-standard protocols (DNS, ICMP) to exfiltrate data.",
            Severity::High,
            &["Host", "Service"],
            &[CanReach, ConnectsTo],
            serde_json::json!({"port": 53}),
            "DNS or non-standard services reachable from sensitive hosts",
        ),
        technique(
            "T1567",
            "Exfiltration Over Web Service",
            Exfiltration,
            "Adversaries may exfiltrate data to cloud storage or web services.",
            Severity::High,
            &["Host", "Service", "Application"],
            &[CanReach, DependsOn],
            serde_json::json!({}),
            "Paths to cloud storage endpoints from internal hosts",
        ),
        technique(
            "T1537",
            "Transfer Data to Cloud Account",
            Exfiltration,
            "Adversaries may transfer data to a cloud account they control.",
            Severity::High,
            &["Host", "Application"],
            &[CanReach, HasAccess],
            serde_json::json!({}),
            "Cloud storage applications accessible from internal hosts",
        ),
        technique(
            "T1029",
            "Scheduled Transfer",
            Exfiltration,
            "Adversaries may schedule data exfiltration to occur at certain times or \
             intervals.",
            Severity::Medium,
            &["Host", "Service", "Application"],
            &[CanReach, HasAccess],
            serde_json::json!({}),
            "Scheduler services with outbound reach to external nodes",
        ),
    ]
}

/// Return all techniques for a given tactic.
pub fn techniques_for_tactic(tactic: TacticType) -> Vec<MitreTechnique> {
    all_techniques()
        .into_iter()
        .filter(|t| t.tactic == tactic)
        .collect()
}

/// Look up a technique by id.
pub fn technique_by_id(technique_id: &str) -> Option<MitreTechnique> {
    all_techniques()
        .into_iter()
        .find(|t| t.technique_id == technique_id)
}

/// Apply a config-level technique filter: empty means all for the tactic.
pub fn filter_techniques(tactic: TacticType, filter: &[String]) -> Vec<MitreTechnique> {
    let all = techniques_for_tactic(tactic);
    if filter.is_empty() {
        return all;
    }
    all.into_iter()
        .filter(|t| filter.contains(&t.technique_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_techniques_five_per_tactic() {
        assert_eq!(all_techniques().len(), 20);
        for tactic in [
            TacticType::InitialAccess,
            TacticType::LateralMovement,
            TacticType::PrivilegeEscalation,
            TacticType::Exfiltration,
        ] {
            assert_eq!(techniques_for_tactic(tactic).len(), 5, "{tactic}");
        }
    }

    #[test]
    fn technique_ids_are_unique() {
        let techniques = all_techniques();
        let mut ids: Vec<&str> = techniques.iter().map(|t| t.technique_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn lookup_by_id() {
        let t = technique_by_id("T1190").unwrap();
        assert_eq!(t.technique_name, "Exploit Public-Facing Application");
        assert_eq!(t.tactic, TacticType::InitialAccess);
        assert_eq!(t.severity_default, Severity::Critical);
        assert!(technique_by_id("T9999").is_none());
    }

    #[test]
    fn sub_technique_url_uses_slash() {
        let t = technique_by_id("T1021.001").unwrap();
        assert_eq!(t.mitre_url, "https://attack.mitre.org/techniques/T1021/001/");
        let t = technique_by_id("T1041").unwrap();
        assert_eq!(t.mitre_url, "https://attack.mitre.org/techniques/T1041/");
    }

    #[test]
    fn filter_narrows_and_empty_selects_all() {
        let filtered = filter_techniques(
            TacticType::LateralMovement,
            &["T1550.002".to_string(), "T1482".to_string()],
        );
        assert_eq!(filtered.len(), 2);

        let all = filter_techniques(TacticType::LateralMovement, &[]);
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn graph_query_patterns_carry_required_properties() {
        let t = technique_by_id("T1190").unwrap();
        assert_eq!(
            t.graph_query.required_properties["exploitable"],
            serde_json::json!(true)
        );
        assert!(t.graph_query.edge_types.contains(&EdgeType::HasCve));
    }
}
