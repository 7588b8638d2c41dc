//! Migration configuration
//!
//! Loaded from TOML; every tunable has a default so a file naming only the
//! template is valid:
//!
//! ```toml
//! template_path = "cdk.out/AppStack.template.json"
//! inventory_path = "inventory.json"
//! region = "eu-west-1"
//! interaction = "auto-approve"
//!
//! [resolver]
//! auto_match_threshold = 0.95
//!
//! [commands.code_generation]
//! program = "npx"
//! args = ["cdktf", "synth"]
//! ```

use crate::error::MigrationError;
use crate::step::MigrationStep;
use serde::{Deserialize, Serialize};
use stackshift_discovery::{DiscoveryConfig, DiscoveryOptions};
use stackshift_resolve::{MatcherConfig, ResolverConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How operator prompts are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionMode {
    /// Ask an operator
    #[default]
    Interactive,
    /// Answer with automation defaults; external commands are not run
    DryRun,
    /// Answer with automation defaults and run everything
    AutoApprove,
}

impl InteractionMode {
    /// Whether prompts are answered without an operator
    #[inline]
    #[must_use]
    pub fn is_automated(self) -> bool {
        !matches!(self, Self::Interactive)
    }
}

/// Matcher tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    pub threshold: f64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}

/// Resolver tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub auto_match_threshold: f64,
    pub enable_human_intervention: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            auto_match_threshold: 0.9,
            enable_human_intervention: true,
        }
    }
}

/// Discovery tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub cache_ttl_secs: u64,
    pub concurrency: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            concurrency: 4,
        }
    }
}

/// Drift polling tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftSettings {
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            poll_attempts: 30,
            poll_interval_ms: 10_000,
        }
    }
}

impl DriftSettings {
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// External command run by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Command undoing this one, run on rollback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackCommand>,
}

/// Rollback half of a [`CommandSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create command
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            rollback: None,
        }
    }

    /// With argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// With rollback command
    #[must_use]
    pub fn with_rollback(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.rollback = Some(RollbackCommand {
            program: program.into(),
            args,
        });
        self
    }
}

/// Commands for the externally implemented steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_modification: Option<CommandSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_generation: Option<CommandSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_preparation: Option<CommandSpec>,
}

impl CommandTable {
    /// Command configured for a step
    #[must_use]
    pub fn for_step(&self, step: MigrationStep) -> Option<&CommandSpec> {
        match step {
            MigrationStep::TemplateModification => self.template_modification.as_ref(),
            MigrationStep::CodeGeneration => self.code_generation.as_ref(),
            MigrationStep::ImportPreparation => self.import_preparation.as_ref(),
            _ => None,
        }
    }
}

/// Configuration for one migration, persisted with its state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Source template (CloudFormation JSON)
    pub template_path: PathBuf,
    /// Inventory snapshot serving discovery
    pub inventory_path: Option<PathBuf>,
    /// Drift report snapshot for verification
    pub drift_path: Option<PathBuf>,
    pub region: String,
    pub interaction: InteractionMode,
    /// Roll back completed steps when a step fails
    pub auto_rollback: bool,
    /// Directory holding state and audit files
    pub state_dir: PathBuf,
    pub matcher: MatcherSettings,
    pub resolver: ResolverSettings,
    pub discovery: DiscoverySettings,
    pub drift: DriftSettings,
    pub commands: CommandTable,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("template.json"),
            inventory_path: None,
            drift_path: None,
            region: "us-east-1".to_string(),
            interaction: InteractionMode::default(),
            auto_rollback: true,
            state_dir: PathBuf::from(".stackshift"),
            matcher: MatcherSettings::default(),
            resolver: ResolverSettings::default(),
            discovery: DiscoverySettings::default(),
            drift: DriftSettings::default(),
            commands: CommandTable::default(),
        }
    }
}

impl MigrationConfig {
    /// Create config for a template with defaults
    #[must_use]
    pub fn new(template_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            ..Self::default()
        }
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `MigrationError::Config` when the document does not parse or fails
    /// validation.
    pub fn from_toml_str(source: &str) -> Result<Self, MigrationError> {
        let config: Self =
            toml::from_str(source).map_err(|e| MigrationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load TOML from a file
    ///
    /// # Errors
    /// `MigrationError::Config` on IO, parse or validation errors.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MigrationError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded migration config");
        Ok(config)
    }

    /// Check tunables are in range
    ///
    /// # Errors
    /// `MigrationError::Config` naming the offending setting.
    pub fn validate(&self) -> Result<(), MigrationError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(MigrationError::Config(format!(
                    "{name} must be within [0, 1], got {v}"
                )))
            }
        };
        unit("matcher.threshold", self.matcher.threshold)?;
        unit("resolver.auto_match_threshold", self.resolver.auto_match_threshold)?;
        if self.discovery.concurrency == 0 {
            return Err(MigrationError::Config(
                "discovery.concurrency must be at least 1".to_string(),
            ));
        }
        if self.drift.poll_attempts == 0 {
            return Err(MigrationError::Config(
                "drift.poll_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// With interaction mode
    #[inline]
    #[must_use]
    pub fn with_interaction(mut self, interaction: InteractionMode) -> Self {
        self.interaction = interaction;
        self
    }

    /// With inventory snapshot
    #[inline]
    #[must_use]
    pub fn with_inventory(mut self, path: impl Into<PathBuf>) -> Self {
        self.inventory_path = Some(path.into());
        self
    }

    /// With region
    #[inline]
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// With state directory
    #[inline]
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// With auto rollback on failure
    #[inline]
    #[must_use]
    pub fn with_auto_rollback(mut self, enabled: bool) -> Self {
        self.auto_rollback = enabled;
        self
    }

    /// With drift polling
    #[inline]
    #[must_use]
    pub fn with_drift_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.drift = DriftSettings {
            poll_attempts: attempts,
            poll_interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        };
        self
    }

    /// With command for a step
    ///
    /// Steps without an external command ignore it.
    #[must_use]
    pub fn with_command(mut self, step: MigrationStep, command: CommandSpec) -> Self {
        match step {
            MigrationStep::TemplateModification => {
                self.commands.template_modification = Some(command);
            }
            MigrationStep::CodeGeneration => self.commands.code_generation = Some(command),
            MigrationStep::ImportPreparation => self.commands.import_preparation = Some(command),
            _ => {}
        }
        self
    }

    /// Matcher configuration
    #[must_use]
    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig::new(self.matcher.threshold)
    }

    /// Resolver configuration
    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            auto_match_threshold: self.resolver.auto_match_threshold,
            enable_human_intervention: self.resolver.enable_human_intervention,
            discovery_options: DiscoveryOptions::default(),
        }
    }

    /// Discovery context configuration
    #[must_use]
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig::new(self.region.clone())
            .with_cache_ttl(Duration::from_secs(self.discovery.cache_ttl_secs))
            .with_concurrency(self.discovery.concurrency)
    }

    /// State file path for a migration
    #[must_use]
    pub fn state_file(&self, migration_id: &str) -> PathBuf {
        self.state_dir.join(format!("{migration_id}.state.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_fill_a_minimal_file() {
        let config = MigrationConfig::from_toml_str(r#"template_path = "t.json""#).unwrap();
        assert_eq!(config.template_path, PathBuf::from("t.json"));
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.interaction, InteractionMode::Interactive);
        assert!(config.auto_rollback);
        assert!((config.matcher.threshold - 0.7).abs() < f64::EPSILON);
        assert!((config.resolver.auto_match_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.discovery, DiscoverySettings::default());
        assert_eq!(config.drift.poll_attempts, 30);
        assert_eq!(config.drift.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn parses_commands_and_nested_tables() {
        let config = MigrationConfig::from_toml_str(
            r#"
            template_path = "app.json"
            interaction = "dry-run"

            [resolver]
            auto_match_threshold = 0.95

            [commands.code_generation]
            program = "npx"
            args = ["cdktf", "synth"]

            [commands.code_generation.rollback]
            program = "rm"
            args = ["-rf", "generated"]
            "#,
        )
        .unwrap();

        assert_eq!(config.interaction, InteractionMode::DryRun);
        assert!(config.resolver.enable_human_intervention);
        let cmd = config.commands.for_step(MigrationStep::CodeGeneration).unwrap();
        assert_eq!(cmd.args, vec!["cdktf", "synth"]);
        assert_eq!(cmd.rollback.as_ref().unwrap().program, "rm");
        assert!(config.commands.for_step(MigrationStep::Discovery).is_none());
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let err = MigrationConfig::from_toml_str("[matcher]\nthreshold = 1.5").unwrap_err();
        assert!(err.to_string().contains("matcher.threshold"));

        let err = MigrationConfig::from_toml_str("[discovery]\nconcurrency = 0").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn survives_json_round_trip_inside_state() {
        let config = MigrationConfig::new("x.json")
            .with_command(MigrationStep::ImportPreparation, CommandSpec::new("true"));
        let json = serde_json::to_string(&config).unwrap();
        let back: MigrationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn converts_to_component_configs() {
        let config = MigrationConfig::default().with_region("eu-west-1");
        assert_eq!(config.discovery_config().default_region, "eu-west-1");
        assert_eq!(config.discovery_config().concurrency, 4);
        assert!(config.resolver_config().enable_human_intervention);
    }
}
