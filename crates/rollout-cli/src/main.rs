//! Rollout - atomic release deployments
//!
//! Usage:
//!   rollout deploy --from ./build          # Deploy to every configured target
//!   rollout deploy web1 --from ./build     # Deploy to one target
//!   rollout status                         # Show current release per target
//!   rollout releases list web1             # List releases on a target
//!   rollout activate web1 1700000000       # Roll back or forward

mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollout_core::config::{ConfigStore, RolloutConfig};
use rollout_core::deploy::{
    DeployOptions, DirectorySource, TargetOutcome, TargetSession, deploy_all, run_per_target,
};
use rollout_core::fs::Filesystem;
use rollout_core::release::{ReleaseError, ReleaseManager};
use rollout_core::remote::SessionNamer;
use rollout_core::status::session_status;
use rollout_core::target::ConnectionTarget;

#[derive(Parser)]
#[command(name = "rollout")]
#[command(about = "Atomic release deployments over SSH", long_about = None)]
struct Cli {
    /// Path to rollout.toml (defaults to ./rollout.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, populate and promote a new release
    Deploy(DeployArgs),

    /// Show the current release of each target
    Status {
        /// Targets to inspect (all when omitted)
        targets: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Inspect or remove releases
    Releases(ReleasesArgs),

    /// Point `current` at an existing release
    Activate {
        target: String,
        release: String,
    },

    /// Create the release directory layout
    Setup {
        /// Targets to prepare (all when omitted)
        targets: Vec<String>,
    },
}

#[derive(Args)]
struct DeployArgs {
    /// Targets to deploy to (all when omitted)
    targets: Vec<String>,

    /// Local directory to copy into the release
    #[arg(long, value_name = "DIR")]
    from: PathBuf,

    /// Release id to use instead of a generated one
    #[arg(long, value_name = "ID")]
    release: Option<String>,

    /// Show what would happen without changing anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct ReleasesArgs {
    #[command(subcommand)]
    command: ReleasesSubcommand,
}

#[derive(Subcommand)]
enum ReleasesSubcommand {
    /// List releases on a target
    List {
        target: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove a release
    #[command(alias = "rm")]
    Remove {
        target: String,
        release: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollout=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Deploy(args) => run_deploy(&config, args),
        Commands::Status { targets, format } => run_status(&config, &targets, format),
        Commands::Releases(args) => match args.command {
            ReleasesSubcommand::List { target, format } => {
                run_releases_list(&config, &target, format)
            }
            ReleasesSubcommand::Remove {
                target,
                release,
                yes,
            } => run_releases_remove(&config, &target, &release, yes),
        },
        Commands::Activate { target, release } => run_activate(&config, &target, &release),
        Commands::Setup { targets } => run_setup(&config, &targets),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RolloutConfig> {
    let store = match path {
        Some(path) => ConfigStore::from_path(path),
        None => ConfigStore::from_current_dir()?,
    };
    if path.is_some() && !store.config_path().exists() {
        anyhow::bail!("Config file not found: {}", store.config_path().display());
    }
    store.load()
}

fn resolve_targets(config: &RolloutConfig, names: &[String]) -> Result<Vec<ConnectionTarget>> {
    if config.targets.is_empty() {
        anyhow::bail!("No targets configured. Add a [[targets]] entry to rollout.toml");
    }
    config
        .select_targets(names)?
        .into_iter()
        .map(|entry| {
            ConnectionTarget::from_config(entry)
                .with_context(|| format!("Invalid target configuration: '{}'", entry.name))
        })
        .collect()
}

fn open_session(
    config: &RolloutConfig,
    target: &ConnectionTarget,
    namer: &SessionNamer,
) -> Result<TargetSession> {
    Ok(TargetSession::open(
        target,
        namer,
        &config.ssh_options(),
        config.release.name_format,
    )?)
}

fn open_single(config: &RolloutConfig, name: &str) -> Result<TargetSession> {
    let targets = resolve_targets(config, &[name.to_string()])?;
    let target = targets
        .first()
        .ok_or_else(|| anyhow::anyhow!("Unknown target '{}'", name))?;
    open_session(config, target, &SessionNamer::default())
}

/// Current release of a target. A dangling pointer reads as no release.
fn current_release<F: Filesystem>(
    manager: &ReleaseManager<F>,
    name: &str,
) -> Result<Option<String>> {
    match manager.get_current_release() {
        Ok(current) => Ok(current),
        Err(ReleaseError::DanglingCurrentPointer { target }) => {
            tracing::warn!("current on {} points at {}, which is not a release", name, target);
            Ok(None)
        }
        Err(err) => {
            Err(err).with_context(|| format!("Failed to read current release of {}", name))
        }
    }
}

/// Fail the command when any target failed.
fn check_outcomes<T, E>(outcomes: &[TargetOutcome<T, E>]) -> Result<()> {
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} target(s) failed", failed, outcomes.len());
    }
    Ok(())
}

fn run_deploy(config: &RolloutConfig, args: DeployArgs) -> Result<()> {
    if !args.from.is_dir() {
        anyhow::bail!("Source directory not found: {}", args.from.display());
    }

    let targets = resolve_targets(config, &args.targets)?;
    let mut options = DeployOptions::from_config(config);
    options.release_id = args.release;
    let namer = SessionNamer::default();

    if args.dry_run {
        let outcomes = run_per_target(&targets, |target| {
            TargetSession::open(target, &namer, &options.ssh, options.name_format)?
                .deployer()
                .plan(&options)
        });
        output::print_plans(&outcomes);
        return check_outcomes(&outcomes);
    }

    let source = DirectorySource::new(&args.from);
    let outcomes = deploy_all(&targets, &source, &options, &namer);
    output::print_deploy_outcomes(&outcomes);
    check_outcomes(&outcomes)
}

fn run_status(config: &RolloutConfig, names: &[String], format: OutputFormat) -> Result<()> {
    let targets = resolve_targets(config, names)?;
    let namer = SessionNamer::default();

    let outcomes = run_per_target(&targets, |target| -> Result<_> {
        let session = open_session(config, target, &namer)?;
        Ok(session_status(&session)?)
    });

    let mut statuses = Vec::new();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(status) => statuses.push(status.clone()),
            Err(err) => eprintln!("{}: {:#}", outcome.target, err),
        }
    }

    match format {
        OutputFormat::Table => output::print_status_table(&statuses),
        OutputFormat::Json => output::print_json(&statuses)?,
    }
    check_outcomes(&outcomes)
}

fn run_releases_list(config: &RolloutConfig, name: &str, format: OutputFormat) -> Result<()> {
    let session = open_single(config, name)?;
    let status = session_status(&session)?;
    match format {
        OutputFormat::Table => {
            output::print_releases(name, &status.releases, status.current.as_deref())
        }
        OutputFormat::Json => output::print_json(&status)?,
    }
    Ok(())
}

fn run_releases_remove(config: &RolloutConfig, name: &str, release: &str, yes: bool) -> Result<()> {
    let session = open_single(config, name)?;
    let manager = session.manager();

    if current_release(manager, name)?.as_deref() == Some(release) {
        tracing::warn!("Release {} is live on {}; current will dangle", release, name);
    }
    if !yes && !output::confirm(&format!("Remove release {release} from {name}?"))? {
        println!("Aborted");
        return Ok(());
    }

    manager
        .remove_release(release)
        .with_context(|| format!("Failed to remove release '{}' from {}", release, name))?;
    println!("Removed release {release} from {name}");
    Ok(())
}

fn run_activate(config: &RolloutConfig, name: &str, release: &str) -> Result<()> {
    let session = open_single(config, name)?;
    let manager = session.manager();
    let previous = current_release(manager, name)?;

    manager
        .set_current_release(release)
        .with_context(|| format!("Failed to activate release '{}' on {}", release, name))?;
    match previous {
        Some(previous) => println!("{name}: {previous} -> {release}"),
        None => println!("{name}: -> {release}"),
    }
    Ok(())
}

fn run_setup(config: &RolloutConfig, names: &[String]) -> Result<()> {
    let targets = resolve_targets(config, names)?;
    let namer = SessionNamer::default();

    let outcomes = run_per_target(&targets, |target| -> Result<String> {
        let session = open_session(config, target, &namer)?;
        session.manager().setup()?;
        Ok(session.manager().releases_path())
    });

    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => println!("{}: {}", outcome.target, path),
            Err(err) => eprintln!("{}: {:#}", outcome.target, err),
        }
    }
    check_outcomes(&outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rollout_core::fs::LocalFilesystem;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "rollout", "--config", "ops/rollout.toml", "deploy", "web1", "web2", "--from",
            "build", "--release", "v3", "--dry-run",
        ])
        .expect("args should parse");
        assert_eq!(cli.config, Some(PathBuf::from("ops/rollout.toml")));
        match cli.command {
            Commands::Deploy(args) => {
                assert_eq!(args.targets, vec!["web1", "web2"]);
                assert_eq!(args.from, PathBuf::from("build"));
                assert_eq!(args.release.as_deref(), Some("v3"));
                assert!(args.dry_run);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_deploy_requires_from() {
        assert!(Cli::try_parse_from(["rollout", "deploy"]).is_err());
    }

    #[test]
    fn test_parse_releases_remove_alias() {
        let cli = Cli::try_parse_from(["rollout", "releases", "rm", "web1", "v1", "-y"])
            .expect("args should parse");
        match cli.command {
            Commands::Releases(ReleasesArgs {
                command:
                    ReleasesSubcommand::Remove {
                        target,
                        release,
                        yes,
                    },
            }) => {
                assert_eq!(target, "web1");
                assert_eq!(release, "v1");
                assert!(yes);
            }
            _ => panic!("expected releases remove"),
        }
    }

    fn manager_in(dir: &tempfile::TempDir) -> ReleaseManager<LocalFilesystem> {
        ReleaseManager::new(dir.path().to_string_lossy(), LocalFilesystem::new())
    }

    #[test]
    fn test_current_release_resolves_pointer() {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        let manager = manager_in(&dir);
        manager.setup().expect("setup should succeed");
        manager.create_release(Some("v1")).expect("create should succeed");
        assert_eq!(current_release(&manager, "web1").expect("read should succeed"), None);

        manager.set_current_release("v1").expect("promote should succeed");
        assert_eq!(
            current_release(&manager, "web1").expect("read should succeed"),
            Some("v1".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_current_release_tolerates_dangling_pointer() {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        let manager = manager_in(&dir);
        manager.setup().expect("setup should succeed");
        std::os::unix::fs::symlink("/nowhere", dir.path().join("current"))
            .expect("symlink should succeed");
        assert_eq!(current_release(&manager, "web1").expect("read should succeed"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_current_release_propagates_other_errors() {
        let dir = tempfile::tempdir().expect("tempdir should succeed");
        let manager = manager_in(&dir);
        // `current` exists but `releases/` does not, so listing fails.
        std::os::unix::fs::symlink("/nowhere", dir.path().join("current"))
            .expect("symlink should succeed");
        let err = current_release(&manager, "web1").unwrap_err();
        assert!(err.to_string().contains("web1"));
    }

    #[test]
    fn test_check_outcomes() {
        let ok: Vec<TargetOutcome<(), String>> = vec![TargetOutcome {
            target: "a".to_string(),
            result: Ok(()),
        }];
        assert!(check_outcomes(&ok).is_ok());

        let mixed: Vec<TargetOutcome<(), String>> = vec![
            TargetOutcome {
                target: "a".to_string(),
                result: Ok(()),
            },
            TargetOutcome {
                target: "b".to_string(),
                result: Err("down".to_string()),
            },
        ];
        let err = check_outcomes(&mixed).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 target(s) failed");
    }
}
