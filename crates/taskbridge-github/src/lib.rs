use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use taskbridge_domain::{
    CoreError, ItemCategory, ItemId, ItemQuery, ItemState, RemoteItem, RemoteItemSource,
    ALL_SYNC_TYPES,
};
use tracing::debug;

pub const ENV_GH_BIN: &str = "TASKBRIDGE_GH_BIN";
const SEARCH_JSON_FIELDS: &str = "id,number,title,url,repository,createdAt,updatedAt";

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[OsString]) -> io::Result<std::process::Output>;
}

/// Spawns `gh` on the tokio runtime. Dropping the returned future kills the
/// child, so a cancelled sync does not leave `gh` running.
#[derive(Debug, Default)]
pub struct ProcessCommandRunner;

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(&self, program: &str, args: &[OsString]) -> io::Result<std::process::Output> {
        tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
    }
}

/// Remote item source backed by `gh search`.
pub struct GhCliClient<R: CommandRunner> {
    runner: R,
    binary: PathBuf,
}

impl<R: CommandRunner> GhCliClient<R> {
    /// `TASKBRIDGE_GH_BIN` takes precedence over `configured_binary`.
    pub fn new(runner: R, configured_binary: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let binary = match std::env::var_os(ENV_GH_BIN) {
            Some(value) => {
                if value.is_empty() {
                    return Err(CoreError::Configuration(format!(
                        "{ENV_GH_BIN} is set but empty. Provide a valid gh binary path or unset it."
                    )));
                }
                PathBuf::from(value)
            }
            None => configured_binary.into(),
        };
        if binary.as_os_str().is_empty() {
            return Err(CoreError::Configuration(
                "GitHub CLI binary path must not be empty.".to_owned(),
            ));
        }

        Ok(Self { runner, binary })
    }

    pub fn health_check_args() -> Vec<OsString> {
        vec![OsString::from("auth"), OsString::from("status")]
    }

    pub async fn health_check(&self) -> Result<(), CoreError> {
        self.run_gh(&Self::health_check_args()).await.map(|_| ())
    }

    fn search_args(category: ItemCategory, username: &str, limit: u32) -> Vec<OsString> {
        let (kind, qualifier) = match category {
            ItemCategory::PrReview => ("prs", "--review-requested"),
            ItemCategory::PrCreated => ("prs", "--author"),
            ItemCategory::IssueAssigned => ("issues", "--assignee"),
            ItemCategory::IssueCreated => ("issues", "--author"),
        };

        vec![
            OsString::from("search"),
            OsString::from(kind),
            OsString::from("--state"),
            OsString::from("open"),
            OsString::from(qualifier),
            OsString::from(username),
            OsString::from("--json"),
            OsString::from(SEARCH_JSON_FIELDS),
            OsString::from("--limit"),
            OsString::from(limit.to_string()),
        ]
    }

    async fn search_category(
        &self,
        category: ItemCategory,
        query: &ItemQuery,
    ) -> Result<Vec<RemoteItem>, CoreError> {
        let args = Self::search_args(category, query.username.as_str(), query.fetch_limit);
        let output = self.run_gh(&args).await?;
        let results: Vec<GhSearchItem> =
            serde_json::from_slice(&output.stdout).map_err(|error| {
                CoreError::DependencyUnavailable(format!(
                    "Failed to parse `gh {}` JSON output: {error}. Output: {}",
                    Self::render_args(&args[..2]),
                    Self::truncate_for_error(&String::from_utf8_lossy(&output.stdout))
                ))
            })?;

        Ok(results
            .into_iter()
            .map(|result| result.into_remote_item(category))
            .collect())
    }

    async fn run_gh_raw(&self, args: &[OsString]) -> Result<std::process::Output, CoreError> {
        let program = self
            .binary
            .to_str()
            .ok_or_else(|| CoreError::Configuration("Invalid gh binary path".to_owned()))?;
        self.runner
            .run(program, args)
            .await
            .map_err(|error| match error.kind() {
                io::ErrorKind::NotFound => CoreError::DependencyUnavailable(format!(
                    "GitHub CLI `{}` was not found. Install gh and authenticate with `gh auth login`.",
                    self.binary.display()
                )),
                _ => CoreError::DependencyUnavailable(format!(
                    "Failed to execute GitHub CLI `{}`: {error}",
                    self.binary.display()
                )),
            })
    }

    async fn run_gh(&self, args: &[OsString]) -> Result<std::process::Output, CoreError> {
        let output = self.run_gh_raw(args).await?;
        if output.status.success() {
            return Ok(output);
        }

        Err(self.command_failed(args, &output))
    }

    fn command_failed(&self, args: &[OsString], output: &std::process::Output) -> CoreError {
        CoreError::DependencyUnavailable(format!(
            "GitHub CLI command failed (`{} {}`): {}",
            self.binary.display(),
            Self::render_args(args),
            Self::command_output_detail(output)
        ))
    }

    fn render_args(args: &[OsString]) -> String {
        args.iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command_output_detail(output: &std::process::Output) -> String {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if !stderr.is_empty() {
            return stderr;
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if !stdout.is_empty() {
            return stdout;
        }

        format!("exit status {}", output.status)
    }

    fn truncate_for_error(body: &str) -> String {
        const MAX_LEN: usize = 200;
        if body.chars().count() <= MAX_LEN {
            body.to_owned()
        } else {
            format!("{}...", body.chars().take(MAX_LEN).collect::<String>())
        }
    }
}

#[async_trait]
impl<R: CommandRunner> RemoteItemSource for GhCliClient<R> {
    async fn fetch_open_items(&self, query: &ItemQuery) -> Result<Vec<RemoteItem>, CoreError> {
        let mut items = Vec::new();
        for sync_type in ALL_SYNC_TYPES {
            if !query.includes(sync_type) {
                continue;
            }

            let category = sync_type.category();
            let found = self.search_category(category, query).await?;
            let fetched = found.len();
            items.extend(
                found
                    .into_iter()
                    .filter(|item| query.repo_filter.admits(&item.repo)),
            );
            debug!(
                category = category.as_key(),
                fetched,
                "fetched open items from GitHub"
            );
        }

        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhSearchItem {
    #[serde(default)]
    id: String,
    number: u64,
    title: String,
    url: String,
    #[serde(default)]
    repository: Option<GhSearchRepository>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhSearchRepository {
    #[serde(default)]
    name_with_owner: Option<String>,
}

impl GhSearchItem {
    fn into_remote_item(self, category: ItemCategory) -> RemoteItem {
        let repo = extract_repository_name(self.repository.as_ref(), &self.url)
            .unwrap_or_else(|| "unknown/unknown".to_owned());
        // Node ids are stable across renames; the URL is only a last resort.
        let id = if self.id.trim().is_empty() {
            self.url.clone()
        } else {
            self.id
        };

        RemoteItem {
            id: ItemId::new(id),
            category,
            title: self.title,
            url: self.url,
            repo,
            number: self.number,
            state: ItemState::Open,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn extract_repository_name(repository: Option<&GhSearchRepository>, url: &str) -> Option<String> {
    if let Some(value) = repository
        .and_then(|repository| repository.name_with_owner.as_deref())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(value.to_owned());
    }

    let path = url
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, path)| path)?;
    let mut segments = path.split('/');
    let owner = segments.next()?.trim();
    let repository = segments.next()?.trim();
    if owner.is_empty() || repository.is_empty() {
        return None;
    }

    Some(format!("{owner}/{repository}"))
}
