//! BLAKE3 content hashing for tamper evidence.
//!
//! Hashes a canonical JSON rendering of the engram: every field except
//! `content_hash`, serialized with sorted object keys and compact
//! separators. Canonicalization goes through `serde_json::Value` whose map
//! representation is key-ordered, so two engrams with equal content always
//! hash identically regardless of struct field order.

use serde::Serialize;

use crate::Engram;

/// Hashable representation of an Engram (excludes content_hash).
#[derive(Serialize)]
struct HashableEngram<'a> {
    id: &'a crate::EngramId,
    tenant_id: &'a uuid::Uuid,
    agent_id: &'a str,
    intent: &'a str,
    context: &'a serde_json::Value,
    decisions: &'a [crate::Decision],
    alternatives: &'a [crate::Alternative],
    actions: &'a [crate::Action],
    started_at: &'a chrono::DateTime<chrono::Utc>,
    completed_at: &'a Option<chrono::DateTime<chrono::Utc>>,
}

/// Compute the BLAKE3 hash of an engram's content.
///
/// Returns the hex-encoded hash of the canonical JSON bytes.
pub fn compute_engram_hash(engram: &Engram) -> String {
    let hashable = HashableEngram {
        id: &engram.id,
        tenant_id: &engram.tenant_id,
        agent_id: &engram.agent_id,
        intent: &engram.intent,
        context: &engram.context,
        decisions: &engram.decisions,
        alternatives: &engram.alternatives,
        actions: &engram.actions,
        started_at: &engram.started_at,
        completed_at: &engram.completed_at,
    };

    let bytes = canonical_json(&hashable).expect("Engram serialization should not fail");
    blake3::hash(&bytes).to_hex().to_string()
}

/// Serialize a value to canonical JSON: sorted keys, compact separators.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    // serde_json::Map is a BTreeMap, so converting through Value sorts keys.
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&value)
}
