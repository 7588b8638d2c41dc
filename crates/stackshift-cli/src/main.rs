//! stackshift command-line interface

mod terminal;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use stackshift_core::state_machine::calculate_progress;
use stackshift_core::{
    AuditLog, FileAuditLog, FileStateStore, InteractionMode, InventoryDriftDetector,
    MigrationConfig, MigrationOrchestrator, MigrationState, MigrationStatus, StateStore,
};
use stackshift_discovery::{DiscoveryContext, DiscoveryPort, StaticResourceProvider};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use terminal::TerminalIntervention;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_STATE_DIR: &str = ".stackshift";

#[derive(Debug, Parser)]
#[command(
    name = "stackshift",
    version,
    about = "Move stateful resources between infrastructure stacks, one resumable step at a time."
)]
struct Cli {
    /// Directory holding state and audit files [default: config's state_dir, else .stackshift]
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print migration state as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a new migration.
    Run(RunArgs),
    /// Continue a paused, failed or rolled-back migration.
    Resume(MigrationArgs),
    /// Show progress of a migration, or list known migrations.
    Status(StatusArgs),
    /// Print the decision audit trail of a migration.
    Audit(AuditArgs),
    /// Roll back every completed step of a migration, latest first.
    Rollback(MigrationArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Migration config (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Source template; overrides the config
    #[arg(long)]
    template: Option<PathBuf>,

    /// Inventory snapshot serving discovery; overrides the config
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// How prompts are answered; overrides the config.
    ///
    /// dry-run and auto-approve answer every prompt with fixed automation
    /// defaults: the top-ranked candidate for physical ids, manual review for
    /// critical differences, the live configuration for drift and continue at
    /// checkpoints. These defaults are not verified operator intent; review the
    /// audit trail afterwards. dry-run also skips external commands.
    #[arg(long, value_enum)]
    mode: Option<Mode>,
}

#[derive(Debug, Args)]
struct MigrationArgs {
    /// Migration id
    id: String,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Migration id; lists all migrations when omitted
    id: Option<String>,
}

#[derive(Debug, Args)]
struct AuditArgs {
    /// Migration id
    id: String,

    /// Verify the hash chain instead of printing entries
    #[arg(long)]
    verify: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Interactive,
    DryRun,
    AutoApprove,
}

impl From<Mode> for InteractionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Interactive => Self::Interactive,
            Mode::DryRun => Self::DryRun,
            Mode::AutoApprove => Self::AutoApprove,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match real_main(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn real_main(cli: Cli) -> anyhow::Result<ExitCode> {
    let state_dir = cli.state_dir;
    let json = cli.json;
    match cli.cmd {
        Command::Run(args) => cmd_run(args, state_dir, json).await,
        Command::Resume(args) => cmd_resume(&args.id, &state_dir_or_default(state_dir), json).await,
        Command::Status(args) => cmd_status(args, &state_dir_or_default(state_dir), json).await,
        Command::Audit(args) => cmd_audit(args, &state_dir_or_default(state_dir)).await,
        Command::Rollback(args) => {
            cmd_rollback(&args.id, &state_dir_or_default(state_dir), json).await
        }
    }
}

fn state_dir_or_default(state_dir: Option<PathBuf>) -> PathBuf {
    state_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
}

async fn cmd_run(args: RunArgs, state_dir: Option<PathBuf>, json: bool) -> anyhow::Result<ExitCode> {
    let mut config = match (&args.config, &args.template) {
        (Some(path), _) => MigrationConfig::load(path)
            .await
            .with_context(|| format!("load config {}", path.display()))?,
        (None, Some(template)) => MigrationConfig::new(template),
        (None, None) => anyhow::bail!("either --config or --template is required"),
    };
    if let Some(template) = args.template {
        config.template_path = template;
    }
    if let Some(inventory) = args.inventory {
        config = config.with_inventory(inventory);
    }
    if let Some(mode) = args.mode {
        config = config.with_interaction(mode.into());
    }
    if let Some(dir) = state_dir {
        config = config.with_state_dir(dir);
    }
    if config.interaction.is_automated() {
        warn!(
            mode = ?config.interaction,
            "prompts will be answered with automation defaults, not operator decisions"
        );
    }

    let orchestrator = build_orchestrator(&config, &config.state_dir).await?;
    let state = orchestrator.start(config).await?;
    report(&state, json)
}

async fn cmd_resume(id: &str, state_dir: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let state = load_state(id, state_dir).await?;
    let orchestrator = build_orchestrator(&state.config, state_dir).await?;
    let state = orchestrator.resume(id).await?;
    report(&state, json)
}

async fn cmd_rollback(id: &str, state_dir: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let mut state = load_state(id, state_dir).await?;
    let orchestrator = build_orchestrator(&state.config, state_dir).await?;
    orchestrator.rollback(&mut state).await?;
    report(&state, json)
}

async fn cmd_status(args: StatusArgs, state_dir: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let Some(id) = args.id else {
        let store = FileStateStore::new(state_dir);
        for id in store.list().await? {
            if let Some(state) = store.load(&id).await? {
                println!("{id}  {:<12} {}", state.status.to_string(), state.current_step);
            }
        }
        return Ok(ExitCode::SUCCESS);
    };
    let state = load_state(&id, state_dir).await?;
    print_state(&state, json)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_audit(args: AuditArgs, state_dir: &Path) -> anyhow::Result<ExitCode> {
    let audit = FileAuditLog::new(state_dir);
    if args.verify {
        return match audit.verify_integrity(&args.id).await {
            Ok(count) => {
                println!("audit chain intact: {count} entr(ies)");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                error!(migration_id = %args.id, error = %e, "audit chain broken");
                println!("audit chain broken: {e}");
                Ok(ExitCode::FAILURE)
            }
        };
    }

    for entry in audit.entries(&args.id).await? {
        let step = entry
            .context
            .step
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let kind = entry
            .context
            .prompt_kind
            .map_or_else(|| "-".to_string(), |k| format!("{k:?}"));
        println!(
            "#{:<3} {} {:<20} {:<18} {:?} {}",
            entry.sequence,
            entry.response.timestamp.to_rfc3339(),
            step,
            kind,
            entry.response.action,
            entry.response.value.as_deref().unwrap_or("-"),
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn load_state(id: &str, state_dir: &Path) -> anyhow::Result<MigrationState> {
    FileStateStore::new(state_dir)
        .load(id)
        .await?
        .with_context(|| format!("migration {id} not found in {}", state_dir.display()))
}

/// Wire file-backed persistence, inventory discovery and the operator
async fn build_orchestrator(
    config: &MigrationConfig,
    state_dir: &Path,
) -> anyhow::Result<MigrationOrchestrator> {
    let inventory = config
        .inventory_path
        .as_ref()
        .context("inventory_path must be set (config or --inventory)")?;
    let provider = StaticResourceProvider::load(inventory)
        .await
        .with_context(|| format!("load inventory {}", inventory.display()))?;
    info!(inventory = %inventory.display(), resources = provider.len(), "inventory loaded");
    let discovery: Arc<dyn DiscoveryPort> = Arc::new(DiscoveryContext::new(
        Arc::new(provider),
        config.discovery_config(),
    ));

    let mut orchestrator = MigrationOrchestrator::new(
        Arc::new(FileStateStore::new(state_dir)),
        Arc::new(FileAuditLog::new(state_dir)),
        discovery,
        Arc::new(TerminalIntervention),
    )
    .with_default_steps();
    if let Some(path) = &config.drift_path {
        let detector = InventoryDriftDetector::load(path)
            .await
            .with_context(|| format!("load drift reports {}", path.display()))?;
        orchestrator = orchestrator.with_drift_detector(Arc::new(detector));
    }

    // Ctrl-C pauses at the next step boundary
    let pause = orchestrator.pause_handle();
    ctrlc::set_handler(move || {
        eprintln!("pause requested; stopping after the current step");
        pause.request_pause();
    })
    .context("install Ctrl-C handler")?;

    Ok(orchestrator)
}

fn report(state: &MigrationState, json: bool) -> anyhow::Result<ExitCode> {
    print_state(state, json)?;
    Ok(match state.status {
        MigrationStatus::Completed | MigrationStatus::Paused => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn print_state(state: &MigrationState, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    println!("migration {}", state.id);
    println!(
        "  status:   {} at {} ({}%)",
        state.status,
        state.current_step,
        calculate_progress(state.current_step)
    );
    println!("  template: {}", state.config.template_path.display());
    if let Some(error) = &state.error {
        println!("  error:    {error}");
    }
    for result in state.step_results.values() {
        println!("  - {:<22} {:?}", result.step.to_string(), result.status);
        for check in result.validation.iter().filter(|c| !c.passed) {
            println!("      {:?} {}: {}", check.severity, check.name, check.message);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_mode_and_global_flags() {
        let cli = Cli::try_parse_from([
            "stackshift",
            "run",
            "--template",
            "t.json",
            "--mode",
            "dry-run",
            "--state-dir",
            "/tmp/s",
        ])
        .unwrap();
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/s")));
        let Command::Run(args) = cli.cmd else {
            panic!("expected run");
        };
        assert!(matches!(
            args.mode.map(InteractionMode::from),
            Some(InteractionMode::DryRun)
        ));
    }
}
