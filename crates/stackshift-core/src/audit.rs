//! Append-only audit log of operator decisions
//!
//! Every answered intervention becomes an [`AuditEntry`] keyed by migration
//! id. Entries are hash chained: each carries the SHA-256 of its content and
//! of the previous entry, so edits, reordering and deletions are detected by
//! [`verify_chain`].

use crate::error::AuditError;
use crate::step::MigrationStep;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stackshift_resolve::{InterventionResponse, PromptKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// `prev_hash` of the first entry
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Where a decision was made
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<MigrationStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_kind: Option<PromptKind>,
}

/// Decision to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub migration_id: String,
    pub response: InterventionResponse,
    pub context: AuditContext,
}

/// Sealed, chained audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Zero-based position within the migration's log
    pub sequence: u64,
    pub migration_id: String,
    pub response: InterventionResponse,
    pub context: AuditContext,
    pub prev_hash: String,
    pub hash: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashInput<'a> {
    sequence: u64,
    migration_id: &'a str,
    response: &'a InterventionResponse,
    context: &'a AuditContext,
    prev_hash: &'a str,
}

impl AuditEntry {
    /// Seal a record after `previous`
    ///
    /// # Errors
    /// `AuditError::Serialization` if the record cannot be encoded.
    pub fn seal(record: AuditRecord, previous: Option<&AuditEntry>) -> Result<Self, AuditError> {
        let (sequence, prev_hash) = previous.map_or_else(
            || (0, GENESIS_HASH.to_string()),
            |p| (p.sequence + 1, p.hash.clone()),
        );
        let mut entry = Self {
            sequence,
            migration_id: record.migration_id,
            response: record.response,
            context: record.context,
            prev_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash()?;
        Ok(entry)
    }

    fn compute_hash(&self) -> Result<String, AuditError> {
        let input = HashInput {
            sequence: self.sequence,
            migration_id: &self.migration_id,
            response: &self.response,
            context: &self.context,
            prev_hash: &self.prev_hash,
        };
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&input)?);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Check an ordered list of entries forms an unbroken chain
///
/// # Errors
/// `AuditError::IntegrityViolation` at the first broken entry.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), AuditError> {
    let mut prev = GENESIS_HASH.to_string();
    for (index, entry) in entries.iter().enumerate() {
        let violation = |reason: &str| AuditError::IntegrityViolation {
            sequence: entry.sequence,
            reason: reason.to_string(),
        };
        if entry.sequence != index as u64 {
            return Err(violation("sequence gap"));
        }
        if entry.prev_hash != prev {
            return Err(violation("previous hash mismatch"));
        }
        if entry.compute_hash()? != entry.hash {
            return Err(violation("content hash mismatch"));
        }
        prev.clone_from(&entry.hash);
    }
    Ok(())
}

/// Append-only audit storage
#[async_trait::async_trait]
pub trait AuditLog: Send + Sync + std::fmt::Debug {
    /// Seal and append a record
    async fn append(&self, record: AuditRecord) -> Result<AuditEntry, AuditError>;

    /// All entries of a migration, in append order
    async fn entries(&self, migration_id: &str) -> Result<Vec<AuditEntry>, AuditError>;

    /// Verify a migration's chain
    async fn verify_integrity(&self, migration_id: &str) -> Result<usize, AuditError> {
        let entries = self.entries(migration_id).await?;
        verify_chain(&entries)?;
        Ok(entries.len())
    }
}

/// One JSON-lines file per migration id
#[derive(Debug)]
pub struct FileAuditLog {
    dir: PathBuf,
    // Serializes read-last-then-append
    write_lock: tokio::sync::Mutex<()>,
}

impl FileAuditLog {
    /// Create log rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Path of a migration's log
    #[must_use]
    pub fn path_for(&self, migration_id: &str) -> PathBuf {
        self.dir.join(format!("{migration_id}.audit.jsonl"))
    }

    async fn read(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
        let body = match tokio::fs::read_to_string(path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AuditError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        body.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| AuditError::Corrupt {
                    line: i + 1,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl AuditLog for FileAuditLog {
    async fn append(&self, record: AuditRecord) -> Result<AuditEntry, AuditError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(&record.migration_id);
        let io = |source| AuditError::Io {
            path: path.clone(),
            source,
        };

        let existing = Self::read(&path).await?;
        let entry = AuditEntry::seal(record, existing.last())?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(io)?;
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io)?;
        file.write_all(&line).await.map_err(io)?;
        file.flush().await.map_err(io)?;

        tracing::debug!(
            migration_id = %entry.migration_id,
            sequence = entry.sequence,
            action = ?entry.response.action,
            "audit entry appended"
        );
        Ok(entry)
    }

    async fn entries(&self, migration_id: &str) -> Result<Vec<AuditEntry>, AuditError> {
        Self::read(&self.path_for(migration_id)).await
    }
}

/// In-memory log
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<HashMap<String, Vec<AuditEntry>>>,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, record: AuditRecord) -> Result<AuditEntry, AuditError> {
        let mut guard = self.entries.lock();
        let chain = guard.entry(record.migration_id.clone()).or_default();
        let entry = AuditEntry::seal(record, chain.last())?;
        chain.push(entry.clone());
        Ok(entry)
    }

    async fn entries(&self, migration_id: &str) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self
            .entries
            .lock()
            .get(migration_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackshift_resolve::ResponseAction;

    fn record(migration_id: &str, value: &str) -> AuditRecord {
        AuditRecord {
            migration_id: migration_id.to_string(),
            response: InterventionResponse::new("p-1", ResponseAction::Select, Some(value.into())),
            context: AuditContext {
                step: Some(MigrationStep::Comparison),
                resource_id: Some("UsersTable".into()),
                ..AuditContext::default()
            },
        }
    }

    #[tokio::test]
    async fn memory_log_chains_per_migration() {
        let log = MemoryAuditLog::new();
        let a0 = log.append(record("a", "x")).await.unwrap();
        let a1 = log.append(record("a", "y")).await.unwrap();
        let b0 = log.append(record("b", "z")).await.unwrap();

        assert_eq!(a0.prev_hash, GENESIS_HASH);
        assert_eq!(a1.prev_hash, a0.hash);
        assert_eq!(a1.sequence, 1);
        assert_eq!(b0.sequence, 0);
        assert_eq!(log.verify_integrity("a").await.unwrap(), 2);
        assert_eq!(log.verify_integrity("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn edits_and_deletions_are_detected() {
        let log = MemoryAuditLog::new();
        for v in ["x", "y", "z"] {
            log.append(record("m", v)).await.unwrap();
        }
        let entries = log.entries("m").await.unwrap();

        let mut edited = entries.clone();
        edited[1].response.value = Some("forged".into());
        assert!(matches!(
            verify_chain(&edited),
            Err(AuditError::IntegrityViolation { sequence: 1, .. })
        ));

        let mut removed = entries.clone();
        removed.remove(1);
        assert!(verify_chain(&removed).is_err());

        let mut truncated_head = entries;
        truncated_head.remove(0);
        assert!(verify_chain(&truncated_head).is_err());
    }

    #[tokio::test]
    async fn file_log_persists_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path());
        log.append(record("m-1", "orders-dev")).await.unwrap();
        log.append(record("m-1", "users-legacy")).await.unwrap();

        let body = std::fs::read_to_string(log.path_for("m-1")).unwrap();
        assert_eq!(body.lines().count(), 2);

        // A fresh handle sees the same chain
        let reopened = FileAuditLog::new(dir.path());
        assert_eq!(reopened.verify_integrity("m-1").await.unwrap(), 2);
        assert!(reopened.entries("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tampered_file_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path());
        log.append(record("m", "orders-dev")).await.unwrap();

        let path = log.path_for("m");
        let body = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, body.replace("orders-dev", "orders-prd")).unwrap();

        assert!(matches!(
            log.verify_integrity("m").await,
            Err(AuditError::IntegrityViolation { .. })
        ));
    }
}
