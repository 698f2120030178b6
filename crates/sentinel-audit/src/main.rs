//! CLI entry point for auditing Sentinel engram reasoning trails.
//!
//! The govern workflow's `review_engram` action, as an operator tool:
//! list stored engrams with filters, and verify the integrity of one
//! engram or an entire store.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use sentinel_engram::{EngramId, EngramQuery, EngramStore, FileEngramStore};

#[derive(Parser)]
#[command(name = "sentinel-audit")]
#[command(about = "Audit and verify Sentinel engram reasoning trails")]
struct Cli {
    /// Config file prefix (default: sentinel).
    #[arg(short, long, default_value = "sentinel")]
    config: String,

    /// Engram directory override (otherwise read from config).
    #[arg(long)]
    engram_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored engrams, newest first.
    List {
        /// Filter by tenant UUID.
        #[arg(long)]
        tenant_id: Option<Uuid>,

        /// Filter by agent identifier.
        #[arg(long)]
        agent_id: Option<String>,

        /// Only engrams started at or after this RFC 3339 timestamp.
        #[arg(long)]
        since: Option<String>,
    },

    /// Verify engram integrity; exits non-zero on any violation.
    Verify {
        /// Verify one engram by id; verifies the whole store when omitted.
        #[arg(long)]
        id: Option<Uuid>,
    },
}

/// Audit tool configuration.
///
/// Loaded from `sentinel.toml` `[audit]` section or `SENTINEL_AUDIT__`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
struct AuditConfig {
    #[serde(default = "default_engram_dir")]
    engram_dir: String,
}

fn default_engram_dir() -> String {
    "./engrams".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            engram_dir: default_engram_dir(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let audit_config = load_audit_config(&cli.config)?;
    let engram_dir = cli
        .engram_dir
        .unwrap_or_else(|| audit_config.engram_dir.clone());

    let store = FileEngramStore::new(&engram_dir)?;
    tracing::info!(engram_dir = %engram_dir, "Opened engram store");

    match cli.command {
        Command::List {
            tenant_id,
            agent_id,
            since,
        } => list_engrams(&store, tenant_id, agent_id, since.as_deref()),
        Command::Verify { id } => verify(&store, id),
    }
}

fn list_engrams(
    store: &FileEngramStore,
    tenant_id: Option<Uuid>,
    agent_id: Option<String>,
    since: Option<&str>,
) -> anyhow::Result<()> {
    let from = since.map(parse_timestamp).transpose()?;
    let query = EngramQuery {
        tenant_id,
        agent_id,
        from,
        ..Default::default()
    };

    let engrams = store.list(&query)?;
    for engram in &engrams {
        println!(
            "{}  {}  tenant={}  agent={}  decisions={}  actions={}  \"{}\"",
            engram.started_at.format("%Y-%m-%d %H:%M:%S"),
            engram.id,
            engram.tenant_id,
            engram.agent_id,
            engram.decisions.len(),
            engram.actions.len(),
            engram.intent,
        );
    }
    println!("{} engram(s)", engrams.len());
    Ok(())
}

fn verify(store: &FileEngramStore, id: Option<Uuid>) -> anyhow::Result<()> {
    if let Some(id) = id {
        // `get` recomputes the content hash and fails on mismatch.
        let engram = store.get(EngramId(id))?;
        println!(
            "ok {} agent={} hash={}",
            engram.id,
            engram.agent_id,
            engram.content_hash.as_deref().unwrap_or("-"),
        );
        return Ok(());
    }

    let engrams = store.list(&EngramQuery::default())?;
    let mut violations = 0usize;
    for engram in &engrams {
        if engram.verify_integrity() {
            println!("ok {}", engram.id);
        } else {
            violations += 1;
            tracing::error!(engram_id = %engram.id, "Integrity violation");
            println!("TAMPERED {}", engram.id);
        }
    }

    if violations > 0 {
        anyhow::bail!("{violations} of {} engram(s) failed verification", engrams.len());
    }
    println!("{} engram(s) verified", engrams.len());
    Ok(())
}

fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("Invalid --since timestamp '{raw}': {e}"))
}

fn load_audit_config(file_prefix: &str) -> anyhow::Result<AuditConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("SENTINEL_AUDIT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<AuditConfig>("audit") {
        Ok(c) => Ok(c),
        Err(_) => Ok(AuditConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_engram::EngramSession;

    #[test]
    fn timestamp_parsing() {
        assert!(parse_timestamp("2026-08-01T00:00:00Z").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn default_config() {
        let config = AuditConfig::default();
        assert_eq!(config.engram_dir, "./engrams");
    }

    #[test]
    fn verify_reports_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEngramStore::new(dir.path()).unwrap();

        let mut session = EngramSession::new(Uuid::new_v4(), "hunt-1", "intact");
        session.add_decision("a", "b", 1.0);
        let engram = session.finalize();
        store.save(&engram).unwrap();

        assert!(verify(&store, None).is_ok());
        assert!(verify(&store, Some(engram.id.0)).is_ok());
        assert!(verify(&store, Some(Uuid::new_v4())).is_err());
    }
}
