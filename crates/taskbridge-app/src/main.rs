use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use taskbridge_app::cli::{help_text, parse_cli, Command, ConfigUpdates};
use taskbridge_app::composition::{build_sync_service, github_client, mapping_store};
use taskbridge_app::daemon_process::{
    claim_pid_file, daemon_state, release_pid_file, start_detached, stop, KillCommand,
    StartOutcome, StopOutcome,
};
use taskbridge_app::logging::{init_file_logging, init_stderr_logging};
use taskbridge_app::status::render_status;
use taskbridge_config::{
    config_path_from_env, create_at_path, load_from_path, save_to_path, TaskbridgeConfig,
};
use taskbridge_domain::MappingStore;
use taskbridge_sync::SyncDaemon;
use time::OffsetDateTime;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    match parse_cli(std::env::args().skip(1))? {
        Command::Help => {
            print!("{}", help_text());
            Ok(())
        }
        Command::Init { force, updates } => run_init(force, &updates),
        Command::Sync { verbose } => run_sync(verbose).await,
        Command::Daemon => run_daemon().await,
        Command::Start => run_start(),
        Command::Stop => run_stop(),
        Command::Status => run_status(),
        Command::Config { verify, updates } => run_config(verify, &updates).await,
    }
}

fn load_config() -> Result<(PathBuf, TaskbridgeConfig)> {
    let path = config_path_from_env()?;
    let config = load_from_path(&path)?;
    Ok((path, config))
}

fn run_init(force: bool, updates: &ConfigUpdates) -> Result<()> {
    let path = config_path_from_env()?;
    let mut config = TaskbridgeConfig::default();
    updates.apply(&mut config);
    let config = create_at_path(&path, config, force)?;

    println!("Wrote configuration to {}", path.display());
    println!("  Things project: {}", config.things.project);
    println!("  Poll interval:  {}s", config.poll_interval_secs);
    if config.things.auth_token.is_empty() {
        println!();
        println!("No Things auth token set. Tasks can be created but not completed until you run:");
        println!("  taskbridge config --things-token <token>");
        println!("(Things > Settings > General > Enable Things URLs > Manage)");
    }
    println!();
    println!("Run `taskbridge sync` to test, then `taskbridge start` to keep syncing.");
    Ok(())
}

async fn run_sync(verbose: bool) -> Result<()> {
    init_stderr_logging(verbose);
    let (_, config) = load_config()?;
    let service = build_sync_service(&config)?;

    println!("Syncing...");
    let result = service
        .sync_once()
        .await
        .map_err(|error| anyhow!("Sync failed: {error}"))?;

    println!("Sync complete");
    println!("  Created:   {}", result.created);
    println!("  Completed: {}", result.completed);
    println!("  Unchanged: {}", result.unchanged);
    if result.has_errors() {
        println!("  Errors:    {}", result.errors.len());
        for error in &result.errors {
            println!("    - {error}");
        }
    }
    Ok(())
}

async fn run_daemon() -> Result<()> {
    let (_, config) = load_config()?;
    init_file_logging(&config.log_path())?;

    let pid_path = config.pid_path();
    let own_pid = std::process::id();
    claim_pid_file(&pid_path, own_pid, &KillCommand)?;
    info!(
        pid = own_pid,
        poll_interval_secs = config.poll_interval().as_secs(),
        project = %config.things.project,
        "daemon starting"
    );

    let service = match build_sync_service(&config) {
        Ok(service) => Arc::new(service),
        Err(error) => {
            release_pid_file(&pid_path, own_pid);
            return Err(error.into());
        }
    };
    let handle = SyncDaemon::new(service, config.poll_interval()).spawn();

    shutdown_signal().await;
    let stopped = handle.stop().await;
    release_pid_file(&pid_path, own_pid);
    stopped?;
    Ok(())
}

fn run_start() -> Result<()> {
    let (config_path, config) = load_config()?;
    let log_path = config.log_path();

    match start_detached(&config_path, &config.pid_path(), &log_path, &KillCommand)? {
        StartOutcome::Started { pid } => {
            println!("Daemon started (PID {pid})");
            println!("  Polling every {} seconds", config.poll_interval().as_secs());
            println!("  Logs: {}", log_path.display());
        }
        StartOutcome::AlreadyRunning { pid } => {
            println!("Daemon already running (PID {pid})");
            println!("  Use `taskbridge stop` to stop it first.");
        }
    }
    Ok(())
}

fn run_stop() -> Result<()> {
    let (_, config) = load_config()?;

    match stop(&config.pid_path(), &KillCommand)? {
        StopOutcome::Stopped { pid } => println!("Daemon stopped (PID {pid})"),
        StopOutcome::NotRunning => println!("Daemon is not running"),
        StopOutcome::StaleCleaned { pid } => {
            println!("Daemon was not running (removed stale PID file for {pid})")
        }
    }
    Ok(())
}

fn run_status() -> Result<()> {
    let (_, config) = load_config()?;
    let table = mapping_store(&config).snapshot();
    let daemon = daemon_state(&config.pid_path(), &KillCommand);

    print!(
        "{}",
        render_status(&config, &table, daemon, OffsetDateTime::now_utc())
    );
    Ok(())
}

async fn run_config(verify: bool, updates: &ConfigUpdates) -> Result<()> {
    let (path, mut config) = load_config()?;

    if verify {
        let github = github_client(&config)?;
        match github.health_check().await {
            Ok(()) => println!("GitHub CLI: authenticated"),
            Err(error) => println!("GitHub CLI: {error}"),
        }
        if config.things.auth_token.is_empty() {
            println!("Things auth token: not set");
        } else {
            println!("Things auth token: set (checked when tasks are completed)");
        }
        return Ok(());
    }

    if updates.is_empty() {
        println!("# {}", path.display());
        print!("{}", config.render_redacted()?);
        return Ok(());
    }

    for change in updates.apply(&mut config) {
        println!("{change}");
    }
    save_to_path(&path, &config)?;
    println!("Config saved. Restart the daemon for changes to take effect.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
                    _ = term.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to install SIGTERM handler; waiting for SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
                info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt, shutting down");
    }
}
