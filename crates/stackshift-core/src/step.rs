//! Migration steps and statuses

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// The nine migration steps, in execution order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationStep {
    InitialScan,
    Discovery,
    Classification,
    Comparison,
    TemplateModification,
    CodeGeneration,
    ImportPreparation,
    Verification,
    Complete,
}

impl MigrationStep {
    /// All steps in execution order
    pub const ALL: [MigrationStep; 9] = [
        Self::InitialScan,
        Self::Discovery,
        Self::Classification,
        Self::Comparison,
        Self::TemplateModification,
        Self::CodeGeneration,
        Self::ImportPreparation,
        Self::Verification,
        Self::Complete,
    ];

    /// First step
    pub const FIRST: MigrationStep = Self::InitialScan;

    /// Terminal step
    pub const LAST: MigrationStep = Self::Complete;

    /// Zero-based position in [`MigrationStep::ALL`]
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Step at a position
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Stable kebab-case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialScan => "initial-scan",
            Self::Discovery => "discovery",
            Self::Classification => "classification",
            Self::Comparison => "comparison",
            Self::TemplateModification => "template-modification",
            Self::CodeGeneration => "code-generation",
            Self::ImportPreparation => "import-preparation",
            Self::Verification => "verification",
            Self::Complete => "complete",
        }
    }
}

impl Display for MigrationStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MigrationStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown migration step: {s}"))
    }
}

/// Status of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RolledBack,
}

/// Status of a whole migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    Pending,
    InProgress,
    /// Stopped at a step boundary; resumable
    Paused,
    Completed,
    Failed,
    RolledBack,
}

impl MigrationStatus {
    /// Whether the migration can run further without a rollback
    #[inline]
    #[must_use]
    pub fn is_resumable(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl Display for MigrationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::RolledBack => "ROLLED_BACK",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_declaration_order() {
        for (i, step) in MigrationStep::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
            assert_eq!(MigrationStep::from_index(i), Some(*step));
        }
        assert_eq!(MigrationStep::from_index(9), None);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        assert_eq!(
            "import-preparation".parse::<MigrationStep>().unwrap(),
            MigrationStep::ImportPreparation
        );
        assert!("deploy".parse::<MigrationStep>().is_err());
    }

    #[test]
    fn serde_names_match_display() {
        let json = serde_json::to_string(&MigrationStep::TemplateModification).unwrap();
        assert_eq!(json, "\"template-modification\"");
        let json = serde_json::to_string(&MigrationStatus::RolledBack).unwrap();
        assert_eq!(json, format!("\"{}\"", MigrationStatus::RolledBack));
    }
}
