use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use taskbridge_domain::{CoreError, RemoteItem, TaskId, TaskSink};
use tracing::{info, warn};

mod format;

const DEFAULT_THINGS_PROJECT: &str = "GitHub";
/// Prefix of ids handed out when a task was created through the URL scheme,
/// which does not report the real Things id back.
pub const PSEUDO_ID_PREFIX: &str = "url-";

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[OsString]) -> io::Result<std::process::Output>;
}

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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingsConfig {
    pub project: String,
    pub auth_token: String,
    pub osascript_binary: PathBuf,
    pub open_binary: PathBuf,
    pub url_scheme_fallback: bool,
}

impl Default for ThingsConfig {
    fn default() -> Self {
        Self {
            project: DEFAULT_THINGS_PROJECT.to_owned(),
            auth_token: String::new(),
            osascript_binary: PathBuf::from("osascript"),
            open_binary: PathBuf::from("open"),
            url_scheme_fallback: true,
        }
    }
}

/// Task sink for Things 3 on macOS.
///
/// Creation goes through AppleScript so the new to-do's id can be read back.
/// Completion goes through the `things:///update` URL, which requires the
/// user's Things auth token.
pub struct ThingsClient<R: CommandRunner> {
    runner: R,
    config: ThingsConfig,
}

impl<R: CommandRunner> ThingsClient<R> {
    pub fn new(runner: R, config: ThingsConfig) -> Result<Self, CoreError> {
        if config.project.trim().is_empty() {
            return Err(CoreError::Configuration(
                "Things project name must be a non-empty string.".to_owned(),
            ));
        }

        Ok(Self { runner, config })
    }

    pub fn config(&self) -> &ThingsConfig {
        &self.config
    }

    pub fn is_pseudo_id(task_id: &TaskId) -> bool {
        task_id.as_str().starts_with(PSEUDO_ID_PREFIX)
    }

    async fn create_via_applescript(
        &self,
        title: &str,
        notes: &str,
        tags: &str,
    ) -> Result<TaskId, CoreError> {
        let script = format::create_script(&self.config.project, title, notes, tags);
        let args = vec![OsString::from("-e"), OsString::from(script)];
        let output = self
            .run_checked(&self.config.osascript_binary, &args)
            .await?;

        let task_id = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if task_id.is_empty() {
            return Err(CoreError::DependencyUnavailable(
                "AppleScript returned no Things task id.".to_owned(),
            ));
        }

        Ok(TaskId::new(task_id))
    }

    async fn create_via_url_scheme(
        &self,
        title: &str,
        notes: &str,
        tags: &str,
    ) -> Result<TaskId, CoreError> {
        let url = format::things_url(
            "add",
            &[
                ("title", title),
                ("notes", notes),
                ("tags", tags),
                ("when", "today"),
                ("list", self.config.project.as_str()),
            ],
        );
        self.open_url(&url).await?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Ok(TaskId::new(format!("{PSEUDO_ID_PREFIX}{millis}")))
    }

    async fn open_url(&self, url: &str) -> Result<(), CoreError> {
        self.run_checked(&self.config.open_binary, &[OsString::from(url)])
            .await
            .map(|_| ())
    }

    async fn run_checked(
        &self,
        binary: &Path,
        args: &[OsString],
    ) -> Result<std::process::Output, CoreError> {
        let program = binary.to_str().ok_or_else(|| {
            CoreError::Configuration(format!("Invalid binary path {}", binary.display()))
        })?;
        let output = self
            .runner
            .run(program, args)
            .await
            .map_err(|error| match error.kind() {
                io::ErrorKind::NotFound => CoreError::DependencyUnavailable(format!(
                    "`{}` was not found. Things integration requires macOS with Things 3 installed.",
                    binary.display()
                )),
                _ => CoreError::DependencyUnavailable(format!(
                    "Failed to execute `{}`: {error}",
                    binary.display()
                )),
            })?;
        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let detail = if stderr.is_empty() {
            format!("exit status {}", output.status)
        } else {
            stderr
        };
        Err(CoreError::DependencyUnavailable(format!(
            "`{}` failed: {detail}",
            binary.display()
        )))
    }
}

#[async_trait]
impl<R: CommandRunner> TaskSink for ThingsClient<R> {
    async fn create_task(&self, item: &RemoteItem) -> Result<TaskId, CoreError> {
        let title = format::task_title(item);
        let notes = format::task_notes(item);
        let tags = format::task_tags(item);

        match self.create_via_applescript(&title, &notes, &tags).await {
            Ok(task_id) => Ok(task_id),
            Err(error) if self.config.url_scheme_fallback => {
                warn!(
                    error = %error,
                    title = %title,
                    "AppleScript task creation failed; falling back to Things URL scheme"
                );
                self.create_via_url_scheme(&title, &notes, &tags)
                    .await
                    .map_err(|fallback| {
                        CoreError::DependencyUnavailable(format!(
                            "{error}; URL scheme fallback also failed: {fallback}"
                        ))
                    })
            }
            Err(error) => Err(error),
        }
    }

    async fn complete_task(&self, task_id: &TaskId) -> Result<(), CoreError> {
        if Self::is_pseudo_id(task_id) {
            warn!(
                task_id = %task_id,
                "task was created without a Things id and must be completed manually"
            );
            return Ok(());
        }

        if self.config.auth_token.trim().is_empty() {
            return Err(CoreError::Configuration(
                "Things auth token is not configured. Set it with `taskbridge config --things-token <token>`."
                    .to_owned(),
            ));
        }

        let url = format::things_url(
            "update",
            &[
                ("id", task_id.as_str()),
                ("auth-token", self.config.auth_token.as_str()),
                ("completed", "true"),
            ],
        );
        self.open_url(&url).await?;
        info!(task_id = %task_id, "completed Things task");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use taskbridge_domain::{ItemCategory, ItemId, ItemState};

    struct StubRunner {
        calls: Mutex<Vec<(String, Vec<OsString>)>>,
        results: Mutex<VecDeque<io::Result<std::process::Output>>>,
    }

    impl StubRunner {
        fn with_results(results: Vec<io::Result<std::process::Output>>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                results: Mutex::new(VecDeque::from(results)),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for StubRunner {
        async fn run(&self, program: &str, args: &[OsString]) -> io::Result<std::process::Output> {
            self.calls
                .lock()
                .expect("lock")
                .push((program.to_owned(), args.to_vec()));

            self.results
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "missing stubbed command output",
                    ))
                })
        }
    }

    struct StalledRunner {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl CommandRunner for StalledRunner {
        async fn run(&self, _program: &str, _args: &[OsString]) -> io::Result<std::process::Output> {
            *self.calls.lock().expect("lock") += 1;
            std::future::pending().await
        }
    }

    fn output(status_code: i32, stdout: &str, stderr: &str) -> std::process::Output {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            std::process::Output {
                status: std::process::ExitStatus::from_raw(status_code << 8),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            std::process::Output {
                status: std::process::ExitStatus::from_raw(status_code as u32),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }
        }
    }

    fn client(
        config: ThingsConfig,
        results: Vec<io::Result<std::process::Output>>,
    ) -> ThingsClient<StubRunner> {
        ThingsClient::new(StubRunner::with_results(results), config).expect("init")
    }

    fn sample_item() -> RemoteItem {
        RemoteItem {
            id: ItemId::new("I_kwDO7"),
            category: ItemCategory::IssueAssigned,
            title: "Crash on empty input".to_owned(),
            url: "https://github.com/octo/parser/issues/7".to_owned(),
            repo: "octo/parser".to_owned(),
            number: 7,
            state: ItemState::Open,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn arg(call: &(String, Vec<OsString>), index: usize) -> String {
        call.1[index].to_string_lossy().to_string()
    }

    #[test]
    fn blank_project_is_rejected() {
        let config = ThingsConfig {
            project: " ".to_owned(),
            ..ThingsConfig::default()
        };
        let error = ThingsClient::new(StubRunner::with_results(Vec::new()), config)
            .err()
            .expect("blank project should fail");
        assert!(matches!(error, CoreError::Configuration(_)));
    }

    #[tokio::test]
    async fn create_task_returns_applescript_id() {
        let client = client(
            ThingsConfig::default(),
            vec![Ok(output(0, "2Xy9AbC\n", ""))],
        );

        let task_id = client.create_task(&sample_item()).await.expect("create");
        assert_eq!(task_id.as_str(), "2Xy9AbC");

        let calls = client.runner.calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "osascript");
        assert_eq!(arg(&calls[0], 0), "-e");
        let script = arg(&calls[0], 1);
        assert!(script.contains("name:\"Issue: Crash on empty input (parser)\""));
        assert!(script.contains("tag names:\"github,issue\""));
        assert!(script.contains("project \"GitHub\""));
    }

    #[tokio::test]
    async fn create_task_falls_back_to_url_scheme() {
        let client = client(
            ThingsConfig::default(),
            vec![
                Ok(output(1, "", "execution error: Things3 got an error")),
                Ok(output(0, "", "")),
            ],
        );

        let task_id = client.create_task(&sample_item()).await.expect("create");
        assert!(ThingsClient::<StubRunner>::is_pseudo_id(&task_id));

        let calls = client.runner.calls.lock().expect("lock");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "open");
        let url = arg(&calls[1], 0);
        assert!(url.starts_with("things:///add?title=Issue%3A%20Crash"));
        assert!(url.contains("&when=today&list=GitHub"));
    }

    #[tokio::test]
    async fn create_task_fails_without_fallback() {
        let config = ThingsConfig {
            url_scheme_fallback: false,
            ..ThingsConfig::default()
        };
        let client = client(config, vec![Ok(output(1, "", "not authorized"))]);

        let error = client
            .create_task(&sample_item())
            .await
            .expect_err("create should fail");
        assert!(error.to_string().contains("not authorized"));
        assert_eq!(client.runner.calls.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn create_task_reports_both_failures() {
        let client = client(
            ThingsConfig::default(),
            vec![
                Ok(output(1, "", "script error")),
                Err(io::Error::new(io::ErrorKind::NotFound, "missing")),
            ],
        );

        let error = client
            .create_task(&sample_item())
            .await
            .expect_err("create should fail");
        let message = error.to_string();
        assert!(message.contains("script error"));
        assert!(message.contains("URL scheme fallback also failed"));
    }

    #[tokio::test]
    async fn complete_task_opens_update_url_with_token() {
        let config = ThingsConfig {
            auth_token: "tok/en".to_owned(),
            ..ThingsConfig::default()
        };
        let client = client(config, vec![Ok(output(0, "", ""))]);

        client
            .complete_task(&TaskId::new("2Xy9AbC"))
            .await
            .expect("complete");

        let calls = client.runner.calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            arg(&calls[0], 0),
            "things:///update?id=2Xy9AbC&auth-token=tok%2Fen&completed=true"
        );
    }

    #[tokio::test]
    async fn complete_task_requires_auth_token() {
        let client = client(ThingsConfig::default(), Vec::new());

        let error = client
            .complete_task(&TaskId::new("2Xy9AbC"))
            .await
            .expect_err("missing token should fail");
        assert!(matches!(error, CoreError::Configuration(_)));
        assert!(client.runner.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn complete_task_skips_pseudo_ids() {
        let client = client(ThingsConfig::default(), Vec::new());

        client
            .complete_task(&TaskId::new("url-1767225600000"))
            .await
            .expect("pseudo id completion is a no-op");
        assert!(client.runner.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn complete_task_surfaces_open_failure() {
        let config = ThingsConfig {
            auth_token: "token".to_owned(),
            ..ThingsConfig::default()
        };
        let client = client(config, vec![Ok(output(1, "", "LSOpenURLsWithRole() failed"))]);

        let error = client
            .complete_task(&TaskId::new("2Xy9AbC"))
            .await
            .expect_err("open failure should surface");
        assert!(matches!(error, CoreError::DependencyUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn create_task_yields_while_command_runs() {
        let client = ThingsClient::new(
            StalledRunner {
                calls: Mutex::new(0),
            },
            ThingsConfig::default(),
        )
        .expect("init");

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            client.create_task(&sample_item()),
        )
        .await;

        assert!(outcome.is_err(), "create_task should be cancellable mid-command");
        assert_eq!(*client.runner.calls.lock().expect("lock"), 1);
    }
}
