use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskbridge_domain::{
    ItemQuery, RepoFilter, RepoFilterMode, SyncType, ALL_SYNC_TYPES, DEFAULT_FETCH_LIMIT,
    DEFAULT_USERNAME_SCOPE,
};
use thiserror::Error;

pub const ENV_TASKBRIDGE_CONFIG: &str = "TASKBRIDGE_CONFIG";
pub const MIN_POLL_INTERVAL_SECS: u64 = 60;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_GH_BINARY: &str = "gh";
const DEFAULT_THINGS_PROJECT: &str = "GitHub";
const DEFAULT_OSASCRIPT_BINARY: &str = "osascript";
const DEFAULT_OPEN_BINARY: &str = "open";
const DEFAULT_URL_SCHEME_FALLBACK: bool = true;
const STATE_FILE_NAME: &str = "state.json";
const PID_FILE_NAME: &str = "daemon.pid";
const LOG_FILE_NAME: &str = "daemon.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("not configured: no config file at {}. Run `taskbridge init` first.", path.display())]
    NotFound { path: PathBuf },
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskbridgeConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_sync_types")]
    pub sync_types: Vec<SyncType>,
    #[serde(default)]
    pub repo_filter: RepoFilter,
    #[serde(default)]
    pub github: GithubConfigToml,
    #[serde(default)]
    pub things: ThingsConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubConfigToml {
    #[serde(default = "default_gh_binary")]
    pub binary: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
}

impl Default for GithubConfigToml {
    fn default() -> Self {
        Self {
            binary: default_gh_binary(),
            username: default_username(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThingsConfigToml {
    #[serde(default = "default_things_project")]
    pub project: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_osascript_binary")]
    pub osascript_binary: String,
    #[serde(default = "default_open_binary")]
    pub open_binary: String,
    #[serde(default = "default_url_scheme_fallback")]
    pub url_scheme_fallback: bool,
}

impl Default for ThingsConfigToml {
    fn default() -> Self {
        Self {
            project: default_things_project(),
            auth_token: String::new(),
            osascript_binary: default_osascript_binary(),
            open_binary: default_open_binary(),
            url_scheme_fallback: default_url_scheme_fallback(),
        }
    }
}

impl Default for TaskbridgeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            poll_interval_secs: default_poll_interval_secs(),
            sync_types: default_sync_types(),
            repo_filter: RepoFilter::default(),
            github: GithubConfigToml::default(),
            things: ThingsConfigToml::default(),
        }
    }
}

impl TaskbridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    pub fn item_query(&self) -> ItemQuery {
        ItemQuery {
            username: self.github.username.clone(),
            sync_types: self.sync_types.clone(),
            repo_filter: self.repo_filter.clone(),
            fetch_limit: self.github.fetch_limit,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_str())
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir().join(STATE_FILE_NAME)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.data_dir().join(PID_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join(LOG_FILE_NAME)
    }

    /// TOML rendering with the Things auth token masked.
    pub fn render_redacted(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        if !redacted.things.auth_token.is_empty() {
            redacted.things.auth_token = "********".to_owned();
        }
        toml::to_string_pretty(&redacted).map_err(|err| {
            ConfigError::configuration(format!("Failed to render configuration: {err}"))
        })
    }
}

/// Loads an existing configuration. A missing file is `ConfigError::NotFound`;
/// configuration is never created implicitly.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<TaskbridgeConfig, ConfigError> {
    let path = path.as_ref();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read TASKBRIDGE_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: TaskbridgeConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse TASKBRIDGE_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    if normalize_config(&mut config) {
        save_to_path(path, &config)?;
    }

    Ok(config)
}

/// Writes `config` to `path`, creating parent directories. The file holds the
/// Things auth token, so on Unix it is restricted to the owner.
pub fn save_to_path(path: impl AsRef<Path>, config: &TaskbridgeConfig) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                ConfigError::configuration(format!(
                    "Failed to create parent directory {} for TASKBRIDGE_CONFIG: {err}",
                    parent.display()
                ))
            })?;
        }
    }

    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize TASKBRIDGE_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write TASKBRIDGE_CONFIG to {}: {err}",
            path.display()
        ))
    })?;

    restrict_permissions(path)
}

/// Creates a fresh configuration file. Refuses to overwrite unless `force`.
pub fn create_at_path(
    path: impl AsRef<Path>,
    mut config: TaskbridgeConfig,
    force: bool,
) -> Result<TaskbridgeConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() && !force {
        return Err(ConfigError::configuration(format!(
            "Configuration already exists at {}. Use `taskbridge config` to change it or pass --force.",
            path.display()
        )));
    }

    normalize_config(&mut config);
    save_to_path(path, &config)?;
    Ok(config)
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("taskbridge").join("config.toml"))
}

pub fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_TASKBRIDGE_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "TASKBRIDGE_CONFIG contained invalid UTF-8",
        )),
    }
}

/// Parses a `--sync-types` argument: `all` or a comma-separated list of keys.
pub fn parse_sync_types(raw: &str) -> Result<Vec<SyncType>, ConfigError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("all") {
        return Ok(ALL_SYNC_TYPES.to_vec());
    }

    let mut parsed = Vec::new();
    for value in raw.split(',').map(str::trim).filter(|value| !value.is_empty()) {
        let sync_type = SyncType::from_key(&value.to_ascii_lowercase()).ok_or_else(|| {
            ConfigError::configuration(format!(
                "Unknown sync type '{value}'. Valid types: {}.",
                ALL_SYNC_TYPES
                    .iter()
                    .map(|sync_type| sync_type.as_key())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
        if !parsed.contains(&sync_type) {
            parsed.push(sync_type);
        }
    }

    if parsed.is_empty() {
        return Err(ConfigError::configuration(
            "At least one sync type is required (or `all`).",
        ));
    }

    Ok(parsed)
}

/// Parses a `--repos` argument: `all` or a comma-separated list of `owner/name`.
pub fn parse_repo_filter(raw: &str) -> Result<RepoFilter, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return Ok(RepoFilter::default());
    }

    let mut repos = Vec::new();
    for value in raw.split(',').map(str::trim).filter(|value| !value.is_empty()) {
        match value.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                if !repos.iter().any(|repo: &String| repo.eq_ignore_ascii_case(value)) {
                    repos.push(value.to_owned());
                }
            }
            _ => {
                return Err(ConfigError::configuration(format!(
                    "Repository '{value}' must be in owner/name form."
                )));
            }
        }
    }

    Ok(RepoFilter::selected(repos))
}

pub fn validate_poll_interval(secs: u64) -> Result<u64, ConfigError> {
    if secs < MIN_POLL_INTERVAL_SECS {
        return Err(ConfigError::configuration(format!(
            "Interval must be at least {MIN_POLL_INTERVAL_SECS} seconds"
        )));
    }
    Ok(secs)
}

fn normalize_config(config: &mut TaskbridgeConfig) -> bool {
    let mut changed = false;

    changed |= normalize_non_empty_string(&mut config.data_dir, default_data_dir());

    let normalized_poll_interval_secs = if config.poll_interval_secs == 0 {
        default_poll_interval_secs()
    } else {
        config.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS)
    };
    if normalized_poll_interval_secs != config.poll_interval_secs {
        config.poll_interval_secs = normalized_poll_interval_secs;
        changed = true;
    }

    let mut deduped = Vec::with_capacity(config.sync_types.len());
    for sync_type in &config.sync_types {
        if !deduped.contains(sync_type) {
            deduped.push(*sync_type);
        }
    }
    if deduped.is_empty() {
        deduped = default_sync_types();
    }
    if deduped != config.sync_types {
        config.sync_types = deduped;
        changed = true;
    }

    changed |= normalize_string_vec(&mut config.repo_filter.repos);
    if config.repo_filter.mode == RepoFilterMode::All && !config.repo_filter.repos.is_empty() {
        config.repo_filter.repos.clear();
        changed = true;
    }

    changed |= normalize_non_empty_string(&mut config.github.binary, default_gh_binary());
    changed |= normalize_non_empty_string(&mut config.github.username, default_username());
    if config.github.fetch_limit == 0 {
        config.github.fetch_limit = default_fetch_limit();
        changed = true;
    }

    changed |= normalize_non_empty_string(&mut config.things.project, default_things_project());
    if config.things.auth_token.trim() != config.things.auth_token {
        config.things.auth_token = config.things.auth_token.trim().to_owned();
        changed = true;
    }
    changed |= normalize_non_empty_string(
        &mut config.things.osascript_binary,
        default_osascript_binary(),
    );
    changed |= normalize_non_empty_string(&mut config.things.open_binary, default_open_binary());

    changed
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

fn normalize_string_vec(values: &mut Vec<String>) -> bool {
    let normalized = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect::<Vec<_>>();
    if *values != normalized {
        *values = normalized;
        return true;
    }
    false
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to restrict permissions on {}: {err}",
            path.display()
        ))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

fn default_taskbridge_data_dir() -> PathBuf {
    resolve_data_local_dir().join("taskbridge")
}

fn resolve_data_local_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(path) = std::env::var("LOCALAPPDATA") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
        if let Some(home) = resolve_home_dir() {
            return home.join("AppData").join("Local");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = resolve_home_dir() {
            return home.join("Library").join("Application Support");
        }
    }

    #[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
    {
        if let Ok(path) = std::env::var("XDG_DATA_HOME") {
            let path = path.trim();
            if !path.is_empty() {
                return absolutize_path(PathBuf::from(path));
            }
        }
        if let Some(home) = resolve_home_dir() {
            return home.join(".local").join("share");
        }
    }

    std::env::temp_dir()
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

#[cfg(not(target_os = "macos"))]
fn absolutize_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }

    if let Ok(current) = std::env::current_dir() {
        return current.join(path);
    }

    std::env::temp_dir().join(path)
}

fn default_data_dir() -> String {
    default_taskbridge_data_dir().to_string_lossy().to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_sync_types() -> Vec<SyncType> {
    ALL_SYNC_TYPES.to_vec()
}

fn default_gh_binary() -> String {
    DEFAULT_GH_BINARY.to_owned()
}

fn default_username() -> String {
    DEFAULT_USERNAME_SCOPE.to_owned()
}

fn default_fetch_limit() -> u32 {
    DEFAULT_FETCH_LIMIT
}

fn default_things_project() -> String {
    DEFAULT_THINGS_PROJECT.to_owned()
}

fn default_osascript_binary() -> String {
    DEFAULT_OSASCRIPT_BINARY.to_owned()
}

fn default_open_binary() -> String {
    DEFAULT_OPEN_BINARY.to_owned()
}

fn default_url_scheme_fallback() -> bool {
    DEFAULT_URL_SCHEME_FALLBACK
}
