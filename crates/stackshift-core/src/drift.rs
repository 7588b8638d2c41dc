//! Drift detection port

use crate::error::MigrationError;
use stackshift_model::{DriftReport, DriftStatus, ResourceType};
use std::collections::HashMap;
use std::path::Path;

/// Source of drift reports for live resources
///
/// Detection is asynchronous on most providers: `Ok(None)` means the report
/// is not ready yet and the caller should poll again.
#[async_trait::async_trait]
pub trait DriftDetector: Send + Sync + std::fmt::Debug {
    async fn detect_drift(
        &self,
        logical_id: &str,
        physical_id: &str,
        resource_type: &ResourceType,
    ) -> Result<Option<DriftReport>, MigrationError>;
}

/// Drift reports served from a JSON snapshot
///
/// Resources absent from the snapshot are in sync.
#[derive(Debug, Clone, Default)]
pub struct InventoryDriftDetector {
    reports: HashMap<String, DriftReport>,
}

impl InventoryDriftDetector {
    /// Create detector over reports, keyed by physical id
    #[must_use]
    pub fn new(reports: impl IntoIterator<Item = DriftReport>) -> Self {
        Self {
            reports: reports
                .into_iter()
                .map(|r| (r.physical_id.clone(), r))
                .collect(),
        }
    }

    /// Load a JSON array of drift reports
    ///
    /// # Errors
    /// `MigrationError::Io` or `MigrationError::Serialization`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let path = path.as_ref();
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MigrationError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let reports: Vec<DriftReport> = serde_json::from_str(&body)?;
        Ok(Self::new(reports))
    }
}

#[async_trait::async_trait]
impl DriftDetector for InventoryDriftDetector {
    async fn detect_drift(
        &self,
        logical_id: &str,
        physical_id: &str,
        _resource_type: &ResourceType,
    ) -> Result<Option<DriftReport>, MigrationError> {
        let report = self.reports.get(physical_id).cloned().unwrap_or_else(|| DriftReport {
            logical_id: logical_id.to_string(),
            physical_id: physical_id.to_string(),
            status: DriftStatus::InSync,
            differences: Vec::new(),
        });
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_resources_are_in_sync() {
        let detector = InventoryDriftDetector::new([DriftReport {
            logical_id: "Orders".into(),
            physical_id: "orders-dev".into(),
            status: DriftStatus::Modified,
            differences: Vec::new(),
        }]);

        let drifted = detector
            .detect_drift("Orders", "orders-dev", &ResourceType::dynamodb_table())
            .await
            .unwrap()
            .unwrap();
        assert!(drifted.has_drift());

        let clean = detector
            .detect_drift("Users", "users", &ResourceType::dynamodb_table())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(clean.status, DriftStatus::InSync);
    }

    #[tokio::test]
    async fn loads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.json");
        std::fs::write(
            &path,
            r#"[{"logicalId": "A", "physicalId": "a", "status": "DELETED"}]"#,
        )
        .unwrap();

        let detector = InventoryDriftDetector::load(&path).await.unwrap();
        let report = detector
            .detect_drift("A", "a", &ResourceType::s3_bucket())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.status, DriftStatus::Deleted);
    }
}
