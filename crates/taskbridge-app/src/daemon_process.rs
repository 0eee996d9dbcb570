use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::{Command, Stdio};

use taskbridge_config::ENV_TASKBRIDGE_CONFIG;
use taskbridge_domain::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Running { pid: u32 },
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: u32 },
    NotRunning,
    StaleCleaned { pid: u32 },
}

/// Liveness probe and termination for the background process.
pub trait ProcessControl {
    fn is_alive(&self, pid: u32) -> bool;
    fn terminate(&self, pid: u32) -> Result<(), CoreError>;
}

/// Uses the system `kill` binary.
#[derive(Debug, Default)]
pub struct KillCommand;

impl ProcessControl for KillCommand {
    fn is_alive(&self, pid: u32) -> bool {
        Command::new("kill")
            .args([OsString::from("-0"), OsString::from(pid.to_string())])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn terminate(&self, pid: u32) -> Result<(), CoreError> {
        let output = Command::new("kill")
            .args([OsString::from("-TERM"), OsString::from(pid.to_string())])
            .output()
            .map_err(|error| {
                CoreError::DependencyUnavailable(format!("failed to run `kill`: {error}"))
            })?;
        if output.status.success() {
            return Ok(());
        }

        Err(CoreError::DependencyUnavailable(format!(
            "`kill -TERM {pid}` failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

pub fn read_pid(pid_path: &Path) -> Option<u32> {
    std::fs::read_to_string(pid_path)
        .ok()
        .and_then(|raw| raw.trim().parse::<u32>().ok())
}

pub fn daemon_state(pid_path: &Path, control: &dyn ProcessControl) -> DaemonState {
    match read_pid(pid_path) {
        Some(pid) if control.is_alive(pid) => DaemonState::Running { pid },
        _ => DaemonState::Stopped,
    }
}

pub fn write_pid(pid_path: &Path, pid: u32) -> Result<(), CoreError> {
    if let Some(parent) = pid_path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            CoreError::Persistence(format!(
                "failed to create data directory {}: {error}",
                parent.display()
            ))
        })?;
    }
    std::fs::write(pid_path, pid.to_string()).map_err(|error| {
        CoreError::Persistence(format!(
            "failed to write pid file {}: {error}",
            pid_path.display()
        ))
    })
}

/// Records `own_pid` unless another live process already holds the file.
pub fn claim_pid_file(
    pid_path: &Path,
    own_pid: u32,
    control: &dyn ProcessControl,
) -> Result<(), CoreError> {
    if let Some(pid) = read_pid(pid_path) {
        if pid != own_pid && control.is_alive(pid) {
            return Err(CoreError::Configuration(format!(
                "Daemon already running (PID {pid}). Use `taskbridge stop` to stop it first."
            )));
        }
    }
    write_pid(pid_path, own_pid)
}

/// Removes the pid file only while it still names `own_pid`.
pub fn release_pid_file(pid_path: &Path, own_pid: u32) {
    if read_pid(pid_path) == Some(own_pid) {
        let _ = std::fs::remove_file(pid_path);
    }
}

/// Re-executes the current binary as `taskbridge daemon` in its own process
/// group, with output appended to `log_path`.
pub fn start_detached(
    config_path: &Path,
    pid_path: &Path,
    log_path: &Path,
    control: &dyn ProcessControl,
) -> Result<StartOutcome, CoreError> {
    if let DaemonState::Running { pid } = daemon_state(pid_path, control) {
        return Ok(StartOutcome::AlreadyRunning { pid });
    }
    let _ = std::fs::remove_file(pid_path);

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            CoreError::Configuration(format!(
                "failed to create taskbridge log directory '{}': {error}",
                parent.display()
            ))
        })?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|error| {
            CoreError::Configuration(format!(
                "failed to open taskbridge log file '{}': {error}",
                log_path.display()
            ))
        })?;
    let stderr_file = log_file.try_clone().map_err(|error| {
        CoreError::Configuration(format!(
            "failed to duplicate log file handle for '{}': {error}",
            log_path.display()
        ))
    })?;

    let exe = std::env::current_exe().map_err(|error| {
        CoreError::DependencyUnavailable(format!(
            "unable to locate the taskbridge executable: {error}"
        ))
    })?;
    let mut command = Command::new(exe);
    command
        .arg("daemon")
        .env(ENV_TASKBRIDGE_CONFIG, config_path)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(stderr_file));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command.spawn().map_err(|error| {
        CoreError::DependencyUnavailable(format!("failed to start daemon: {error}"))
    })?;
    let pid = child.id();
    write_pid(pid_path, pid)?;
    Ok(StartOutcome::Started { pid })
}

pub fn stop(pid_path: &Path, control: &dyn ProcessControl) -> Result<StopOutcome, CoreError> {
    let Some(pid) = read_pid(pid_path) else {
        let _ = std::fs::remove_file(pid_path);
        return Ok(StopOutcome::NotRunning);
    };

    if !control.is_alive(pid) {
        let _ = std::fs::remove_file(pid_path);
        return Ok(StopOutcome::StaleCleaned { pid });
    }

    control.terminate(pid)?;
    let _ = std::fs::remove_file(pid_path);
    Ok(StopOutcome::Stopped { pid })
}
