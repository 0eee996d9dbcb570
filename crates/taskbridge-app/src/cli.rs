use taskbridge_config::{
    parse_repo_filter, parse_sync_types, validate_poll_interval, TaskbridgeConfig,
};
use taskbridge_domain::{CoreError, RepoFilter, SyncType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init { force: bool, updates: ConfigUpdates },
    Sync { verbose: bool },
    Daemon,
    Start,
    Stop,
    Status,
    Config { verify: bool, updates: ConfigUpdates },
    Help,
}

/// Settings that `init` and `config` can change from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdates {
    pub poll_interval_secs: Option<u64>,
    pub project: Option<String>,
    pub things_token: Option<String>,
    pub sync_types: Option<Vec<SyncType>>,
    pub repo_filter: Option<RepoFilter>,
}

impl ConfigUpdates {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the updates and returns a line per changed setting.
    pub fn apply(&self, config: &mut TaskbridgeConfig) -> Vec<String> {
        let mut changes = Vec::new();
        if let Some(secs) = self.poll_interval_secs {
            config.poll_interval_secs = secs;
            changes.push(format!("Poll interval set to {secs}s"));
        }
        if let Some(project) = &self.project {
            config.things.project = project.clone();
            changes.push(format!("Things project set to \"{project}\""));
        }
        if let Some(token) = &self.things_token {
            config.things.auth_token = token.clone();
            changes.push("Things auth token updated".to_owned());
        }
        if let Some(sync_types) = &self.sync_types {
            config.sync_types = sync_types.clone();
            changes.push(format!(
                "Sync types set to {}",
                sync_types
                    .iter()
                    .map(|sync_type| sync_type.as_key())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        if let Some(filter) = &self.repo_filter {
            config.repo_filter = filter.clone();
            if filter.repos.is_empty() {
                changes.push("Syncing all repositories".to_owned());
            } else {
                changes.push(format!("Syncing repositories: {}", filter.repos.join(", ")));
            }
        }
        changes
    }
}

pub fn parse_cli<I>(args: I) -> Result<Command, CoreError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "init" => {
            let mut force = false;
            let updates = parse_config_flags("init", args, |flag| {
                if flag == "--force" {
                    force = true;
                    true
                } else {
                    false
                }
            })?;
            Ok(Command::Init { force, updates })
        }
        "sync" => {
            let mut verbose = false;
            for arg in args {
                match arg.as_str() {
                    "--verbose" | "-v" => verbose = true,
                    other => return Err(unexpected_argument("sync", other)),
                }
            }
            Ok(Command::Sync { verbose })
        }
        "daemon" => no_arguments("daemon", args).map(|_| Command::Daemon),
        "start" => no_arguments("start", args).map(|_| Command::Start),
        "stop" => no_arguments("stop", args).map(|_| Command::Stop),
        "status" => no_arguments("status", args).map(|_| Command::Status),
        "config" => {
            let mut verify = false;
            let updates = parse_config_flags("config", args, |flag| {
                if flag == "--verify" {
                    verify = true;
                    true
                } else {
                    false
                }
            })?;
            Ok(Command::Config { verify, updates })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        unknown => Err(CoreError::Configuration(format!(
            "Unknown command '{unknown}'. Run `taskbridge --help` for usage."
        ))),
    }
}

fn parse_config_flags<I, F>(
    command: &str,
    mut args: I,
    mut extra_flag: F,
) -> Result<ConfigUpdates, CoreError>
where
    I: Iterator<Item = String>,
    F: FnMut(&str) -> bool,
{
    let mut updates = ConfigUpdates::default();

    while let Some(raw) = args.next() {
        let (flag, inline_value) = match raw.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => {
                (flag.to_owned(), Some(value.to_owned()))
            }
            _ => (raw.clone(), None),
        };

        if inline_value.is_none() && extra_flag(&flag) {
            continue;
        }

        let mut value = || -> Result<String, CoreError> {
            let value = match inline_value.clone() {
                Some(value) => value,
                None => args.next().ok_or_else(|| {
                    CoreError::Configuration(format!("Missing value after {flag}."))
                })?,
            };
            let value = value.trim().to_owned();
            if value.is_empty() {
                return Err(CoreError::Configuration(format!(
                    "Flag '{flag}' requires a non-empty value."
                )));
            }
            Ok(value)
        };

        match flag.as_str() {
            "--interval" => {
                let raw = value()?;
                let secs = raw.parse::<u64>().map_err(|_| {
                    CoreError::Configuration(format!(
                        "Interval must be a whole number of seconds, got '{raw}'."
                    ))
                })?;
                updates.poll_interval_secs =
                    Some(validate_poll_interval(secs).map_err(config_error)?);
            }
            "--project" => updates.project = Some(value()?),
            "--things-token" => updates.things_token = Some(value()?),
            "--sync-types" => {
                updates.sync_types = Some(parse_sync_types(&value()?).map_err(config_error)?);
            }
            "--repos" => {
                updates.repo_filter = Some(parse_repo_filter(&value()?).map_err(config_error)?);
            }
            other if other.starts_with("--") => {
                return Err(CoreError::Configuration(format!(
                    "Unknown flag '{other}'. Run `taskbridge --help` for valid flags."
                )));
            }
            other => return Err(unexpected_argument(command, other)),
        }
    }

    Ok(updates)
}

fn no_arguments<I>(command: &str, mut args: I) -> Result<(), CoreError>
where
    I: Iterator<Item = String>,
{
    match args.next() {
        Some(arg) => Err(unexpected_argument(command, &arg)),
        None => Ok(()),
    }
}

fn unexpected_argument(command: &str, arg: &str) -> CoreError {
    CoreError::Configuration(format!(
        "Unexpected argument '{arg}' for `taskbridge {command}`. Run `taskbridge --help` for usage."
    ))
}

fn config_error(error: taskbridge_config::ConfigError) -> CoreError {
    CoreError::Configuration(error.to_string())
}

pub fn help_text() -> &'static str {
    "Usage: taskbridge <command> [flags]

Commands:
  init [--force] [settings]   Create the configuration file
  sync [--verbose]            Run a single sync and print the result
  daemon                      Run the sync loop in the foreground
  start                       Start the sync loop in the background
  stop                        Stop the background sync loop
  status                      Show daemon state, last sync and tracked tasks
  config [--verify] [settings]
                              Show or change the configuration

Settings:
  --interval <seconds>        Poll interval (minimum 60)
  --project <name>            Things project for new tasks
  --things-token <token>      Things auth token used to complete tasks
  --sync-types <list|all>     pr-reviews, prs-created, issues-assigned, issues-created
  --repos <list|all>          Comma-separated owner/name repositories to sync
"
}
