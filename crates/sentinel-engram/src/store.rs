//! Engram storage — trait + file-system implementation.
//!
//! Engrams are stored as JSON files in a date-partitioned directory tree
//! keyed by start date and session id. Retrieval recomputes the canonical
//! content hash and refuses to return tampered records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Engram, EngramId};

/// Errors that can occur during engram storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Engram not found: {0}")]
    NotFound(EngramId),

    #[error("Integrity check failed for engram {0}: stored hash does not match content")]
    IntegrityViolation(EngramId),

    #[error("Engram has no content hash (not finalized)")]
    NotFinalized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Query parameters for listing engrams.
#[derive(Debug, Default)]
pub struct EngramQuery {
    /// Filter by tenant.
    pub tenant_id: Option<Uuid>,
    /// Filter by agent.
    pub agent_id: Option<String>,
    /// Filter by session ID.
    pub session_id: Option<EngramId>,
    /// Only include engrams started at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only include engrams started at or before this time.
    pub to: Option<DateTime<Utc>>,
}

/// Trait for engram persistence backends.
pub trait EngramStore: Send + Sync {
    /// Store a finalized engram. Returns an error if the engram has no content hash.
    fn save(&self, engram: &Engram) -> Result<(), StoreError>;

    /// Retrieve an engram by ID, verifying integrity.
    fn get(&self, id: EngramId) -> Result<Engram, StoreError>;

    /// List engrams matching the given query, ordered by started_at descending.
    fn list(&self, query: &EngramQuery) -> Result<Vec<Engram>, StoreError>;
}

/// File-system backed engram store.
///
/// Stores engrams as JSON files in a directory tree:
/// ```text
/// {root}/
///   2026/
///     08/
///       01/
///         {session_id}.json
/// ```
///
/// Writers may race; each `save` writes to a temporary file and renames it
/// into place so readers always see a complete document.
pub struct FileEngramStore {
    root: PathBuf,
}

impl FileEngramStore {
    /// Create a new store rooted at the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the file path for an engram based on its start date and ID.
    fn engram_path(&self, engram: &Engram) -> PathBuf {
        let date = engram.started_at.format("%Y/%m/%d");
        self.root.join(format!("{}/{}.json", date, engram.id.0))
    }

    /// Locate an engram file by ID, scanning the directory tree.
    fn find_path(&self, id: EngramId) -> Result<PathBuf, StoreError> {
        let filename = format!("{}.json", id.0);
        find_file_recursive(&self.root, &filename).ok_or(StoreError::NotFound(id))
    }
}

impl EngramStore for FileEngramStore {
    fn save(&self, engram: &Engram) -> Result<(), StoreError> {
        if engram.content_hash.is_none() {
            return Err(StoreError::NotFinalized);
        }

        let path = self.engram_path(engram);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(engram)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(
            engram_id = %engram.id,
            path = %path.display(),
            "Engram saved"
        );

        Ok(())
    }

    fn get(&self, id: EngramId) -> Result<Engram, StoreError> {
        let path = self.find_path(id)?;
        let json = fs::read_to_string(&path)?;
        let engram: Engram = serde_json::from_str(&json)?;

        if !engram.verify_integrity() {
            return Err(StoreError::IntegrityViolation(id));
        }

        Ok(engram)
    }

    fn list(&self, query: &EngramQuery) -> Result<Vec<Engram>, StoreError> {
        let mut results = Vec::new();
        collect_engrams_recursive(&self.root, query, &mut results)?;

        // Sort by started_at descending.
        results.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Ok(results)
    }
}

/// Recursively find a file by name.
fn find_file_recursive(dir: &Path, filename: &str) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file_recursive(&path, filename) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
            return Some(path);
        }
    }

    None
}

/// Recursively collect engrams matching a query.
///
/// Files that are not valid engram documents are skipped rather than
/// failing the whole listing, so newer writers can add sidecar files
/// without breaking older readers.
fn collect_engrams_recursive(
    dir: &Path,
    query: &EngramQuery,
    results: &mut Vec<Engram>,
) -> Result<(), StoreError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(dir)?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_engrams_recursive(&path, query, results)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            let Ok(json) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(engram) = serde_json::from_str::<Engram>(&json) else {
                tracing::debug!(path = %path.display(), "Skipping unrecognized file");
                continue;
            };

            if matches_query(&engram, query) {
                results.push(engram);
            }
        }
    }

    Ok(())
}

/// Check whether an engram matches the given query filters.
fn matches_query(engram: &Engram, query: &EngramQuery) -> bool {
    if let Some(tid) = &query.tenant_id {
        if &engram.tenant_id != tid {
            return false;
        }
    }
    if let Some(aid) = &query.agent_id {
        if &engram.agent_id != aid {
            return false;
        }
    }
    if let Some(sid) = &query.session_id {
        if &engram.id != sid {
            return false;
        }
    }
    if let Some(from) = &query.from {
        if &engram.started_at < from {
            return false;
        }
    }
    if let Some(to) = &query.to {
        if &engram.started_at > to {
            return false;
        }
    }
    true
}
