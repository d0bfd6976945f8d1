use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use clap::Parser;
use dumpsweep::{
    config::{self, DumpsweepConfig},
    observability, profiler,
    retention::{self, FsRemover, RetentionPolicy, SweepResult},
};

/// CLI arguments for dumpsweep
#[derive(Parser, Debug)]
#[command(version, about = "Profiling dump retention scheduler", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "dumpsweep.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Prepare the profiler and run the cleanup scheduler until interrupted (default)
    Run,
    /// Sweep the dump directory once and exit
    Sweep {
        /// List the files that would be deleted without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the config file and print the effective cleanup policy
    Check,
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to --config)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Sweep { dry_run }) => run_sweep(&args.config, dry_run).await,
        Some(Command::Check) => run_check(&args.config),
        Some(Command::Init { output, force }) => {
            run_init(output.as_deref().unwrap_or(&args.config), force)
        }
        Some(Command::Run) | None => run(&args.config).await,
    }
}

/// Load the config file or exit with an error.
fn load_config(path: &Path) -> DumpsweepConfig {
    match DumpsweepConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &DumpsweepConfig) {
    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn retention_policy(config: &DumpsweepConfig) -> RetentionPolicy {
    match config.profiler.retention_policy() {
        Ok(policy) => policy,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Prepare the profiler and keep the dump directory clean until shutdown.
async fn run(config_path: &Path) {
    let config = load_config(config_path);
    init_logging(&config);

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics: {e}");
    }

    tracing::info!(config_file = %config_path.display(), "Starting dumpsweep");

    if !config.profiler.enabled {
        tracing::info!("Profiler disabled by configuration (profiler.enabled = false)");
        return;
    }

    let policy = retention_policy(&config);

    if let Err(e) = profiler::prepare(&config.profiler).await {
        tracing::error!(error = %e, "Failed to prepare profiler");
        std::process::exit(1);
    }

    let handle = retention::start(policy);

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping profiler cleanup...");

    match tokio::time::timeout(Duration::from_secs(30), handle.shutdown()).await {
        Ok(()) => tracing::info!("Shutdown complete"),
        Err(_) => tracing::warn!("Timeout waiting for the running sweep to finish"),
    }
}

/// Sweep once, or list what a sweep would delete.
async fn run_sweep(config_path: &Path, dry_run: bool) {
    let config = load_config(config_path);
    init_logging(&config);
    let policy = retention_policy(&config);

    if dry_run {
        let now = Utc::now();
        match retention::find_expired_dumps(&policy, now).await {
            Ok(expired) => {
                for candidate in &expired {
                    let age = now - candidate.modified;
                    println!(
                        "{}\t{}",
                        candidate.path.display(),
                        retention::format_max_age(age.to_std().unwrap_or_default())
                    );
                }
                println!(
                    "{} dump file(s) would be deleted ({})",
                    expired.len(),
                    policy.describe()
                );
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    match retention::sweep(&policy, &FsRemover, Utc::now()).await {
        Ok(result) => {
            println!("{}", sweep_summary(&result, policy.directory()));
            for failure in &result.errors {
                eprintln!("Failed to delete {}: {}", failure.path.display(), failure.error);
            }
            if result.has_errors() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// One-line outcome for `sweep`. Deletions are already logged by the sweep itself.
fn sweep_summary(result: &SweepResult, directory: &Path) -> String {
    match (result.deleted, result.errors.len()) {
        (0, 0) => format!("No expired dump files in '{}'", directory.display()),
        (deleted, failed) => format!(
            "Sweep of '{}' finished: {deleted} deleted, {failed} failed",
            directory.display()
        ),
    }
}

/// Validate the config and print what `run` would do.
fn run_check(config_path: &Path) {
    let config = load_config(config_path);
    println!("Configuration OK: {}", config_path.display());

    if !config.profiler.enabled {
        println!("Profiler disabled (profiler.enabled = false)");
        return;
    }

    let policy = retention_policy(&config);
    println!("Profiler command: {}", config.profiler.agent_command());
    println!("Profiler cleanup: {}", policy.describe());
}

/// Write the default config file.
fn run_init(output_path: &Path, force: bool) {
    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(output_path, config::default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!("Set profiler.enabled = true and run: dumpsweep --config {}", output_path.display());
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
