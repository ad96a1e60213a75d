//! External process execution
//!
//! Every side effect compoctl has on the container runtime goes through the
//! [`Executor`] trait. [`ComposeRunner`] builds well-formed `docker-compose`
//! and `docker` invocations on top of it.

use crate::error::{CompoctlError, Result};
use crate::settings::Settings;
use std::path::PathBuf;
use std::process::Stdio;

/// How the child's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Share stdin, stdout and stderr with compoctl
    Inherit,
    /// Collect stdout, share stderr
    Capture,
}

/// A single external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Stream wiring
    pub stdio: StdioMode,
    /// Working directory
    pub cwd: PathBuf,
}

impl Invocation {
    /// Program and arguments joined by spaces, for logs and errors
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of running an [`Invocation`] to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Exit code
    pub exit_code: i32,
    /// Captured stdout (empty in [`StdioMode::Inherit`])
    pub stdout: String,
}

impl Outcome {
    /// Whether the process exited with 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external processes to completion
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Run `invocation` and wait for it to exit
    async fn run(&self, invocation: &Invocation) -> Result<Outcome>;
}

/// [`Executor`] backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    async fn run(&self, invocation: &Invocation) -> Result<Outcome> {
        let mut command = tokio::process::Command::new(&invocation.program);
        command.args(&invocation.args).current_dir(&invocation.cwd);

        let spawn_error = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CompoctlError::Configuration(format!(
                    "{} not found, is it installed and on PATH?",
                    invocation.program
                ))
            } else {
                CompoctlError::Io(e)
            }
        };

        match invocation.stdio {
            StdioMode::Inherit => {
                let status = command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(spawn_error)?;

                Ok(Outcome {
                    exit_code: exit_code(status),
                    stdout: String::new(),
                })
            }
            StdioMode::Capture => {
                let output = command
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .output()
                    .await
                    .map_err(spawn_error)?;

                let stdout = String::from_utf8(output.stdout).map_err(|_| {
                    CompoctlError::Configuration(format!(
                        "`{}` printed non UTF-8 output",
                        invocation.command_line()
                    ))
                })?;

                Ok(Outcome {
                    exit_code: exit_code(output.status),
                    stdout,
                })
            }
        }
    }
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Builds and runs compose tool invocations with the global flags applied
pub struct ComposeRunner<'a, E> {
    settings: &'a Settings,
    executor: &'a E,
    files: Vec<PathBuf>,
}

impl<'a, E: Executor> ComposeRunner<'a, E> {
    /// Create a runner using the compose files from `settings`
    pub fn new(settings: &'a Settings, executor: &'a E) -> Self {
        Self {
            settings,
            executor,
            files: settings.compose_files(),
        }
    }

    /// Same runner against a different set of compose files
    pub fn with_files(&self, files: Vec<PathBuf>) -> Self {
        Self {
            settings: self.settings,
            executor: self.executor,
            files,
        }
    }

    /// Global flags placed before every compose subcommand
    pub fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for file in &self.files {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        if let Some(ref project) = self.settings.project_name {
            args.push("-p".to_string());
            args.push(project.clone());
        }
        args.extend(self.settings.compose_options.iter().cloned());
        args
    }

    fn compose_invocation(&self, subcommand: &str, args: &[&str], stdio: StdioMode) -> Invocation {
        let mut all = self.global_args();
        all.push(subcommand.to_string());
        all.extend(args.iter().map(|a| a.to_string()));

        Invocation {
            program: self.settings.compose_bin.clone(),
            args: all,
            stdio,
            cwd: self.settings.working_dir.clone(),
        }
    }

    fn docker_invocation(&self, args: &[&str], stdio: StdioMode) -> Invocation {
        Invocation {
            program: self.settings.docker_bin.clone(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdio,
            cwd: self.settings.working_dir.clone(),
        }
    }

    async fn execute(&self, invocation: Invocation) -> Result<Outcome> {
        let line = invocation.command_line();
        match invocation.stdio {
            StdioMode::Inherit => tracing::info!("Running {}", line),
            StdioMode::Capture => tracing::debug!("Running {}", line),
        }

        let outcome = self.executor.run(&invocation).await?;
        if !outcome.success() {
            return Err(CompoctlError::Execution {
                command: line,
                exit_code: outcome.exit_code,
            });
        }
        Ok(outcome)
    }

    /// Run a compose subcommand with inherited streams
    pub async fn run(&self, subcommand: &str, args: &[&str]) -> Result<()> {
        self.execute(self.compose_invocation(subcommand, args, StdioMode::Inherit))
            .await
            .map(|_| ())
    }

    /// Run a compose subcommand and return its stdout
    pub async fn capture(&self, subcommand: &str, args: &[&str]) -> Result<String> {
        self.execute(self.compose_invocation(subcommand, args, StdioMode::Capture))
            .await
            .map(|outcome| outcome.stdout)
    }

    /// Run a shell command inside the running container of `service`
    pub async fn exec(&self, service: &str, command: &str) -> Result<()> {
        self.run("exec", &["-T", service, "sh", "-c", command]).await
    }

    /// Run the docker binary with inherited streams
    pub async fn docker(&self, args: &[&str]) -> Result<()> {
        self.execute(self.docker_invocation(args, StdioMode::Inherit))
            .await
            .map(|_| ())
    }

    /// Run the docker binary and return its stdout
    pub async fn docker_capture(&self, args: &[&str]) -> Result<String> {
        self.execute(self.docker_invocation(args, StdioMode::Capture))
            .await
            .map(|outcome| outcome.stdout)
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingExecutor;
    use super::*;

    fn settings() -> Settings {
        Settings::new("/srv/app").files(vec![PathBuf::from("docker-compose.yml")])
    }

    #[tokio::test]
    async fn test_global_flags_precede_subcommand() {
        let settings = settings()
            .files(vec![PathBuf::from("a.yml"), PathBuf::from("b.yml")])
            .project_name(Some("blog".to_string()));
        let executor = RecordingExecutor::new();
        let runner = ComposeRunner::new(&settings, &executor);

        runner.run("up", &["-d"]).await.unwrap();

        assert_eq!(
            executor.lines(),
            vec!["docker-compose -f a.yml -f b.yml -p blog up -d"]
        );
        let call = &executor.calls()[0];
        assert_eq!(call.stdio, StdioMode::Inherit);
        assert_eq!(call.cwd, PathBuf::from("/srv/app"));
    }

    #[tokio::test]
    async fn test_extra_global_options_follow_project() {
        let settings = settings()
            .project_name(Some("blog".to_string()))
            .compose_options(vec!["--env-file".to_string(), ".env.prod".to_string()]);
        let executor = RecordingExecutor::new();
        let runner = ComposeRunner::new(&settings, &executor);

        runner.run("ps", &[]).await.unwrap();
        runner.docker(&["volume", "ls"]).await.unwrap();

        assert_eq!(
            executor.lines(),
            vec![
                "docker-compose -f docker-compose.yml -p blog --env-file .env.prod ps",
                "docker volume ls",
            ]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_execution_error() {
        let settings = settings();
        let executor = RecordingExecutor::new();
        executor.respond("pull", 3, "");
        let runner = ComposeRunner::new(&settings, &executor);

        let err = runner.run("pull", &[]).await.unwrap_err();
        match err {
            CompoctlError::Execution { command, exit_code } => {
                assert_eq!(command, "docker-compose -f docker-compose.yml pull");
                assert_eq!(exit_code, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_capture_returns_stdout() {
        let settings = settings();
        let executor = RecordingExecutor::new();
        executor.respond(" config", 0, "services: {}\n");
        let runner = ComposeRunner::new(&settings, &executor);

        assert_eq!(runner.capture("config", &[]).await.unwrap(), "services: {}\n");
        assert_eq!(executor.calls()[0].stdio, StdioMode::Capture);
    }

    #[tokio::test]
    async fn test_exec_wraps_command_in_shell() {
        let settings = settings();
        let executor = RecordingExecutor::new();
        let runner = ComposeRunner::new(&settings, &executor);

        runner
            .exec("postgres", "pg_dumpall -U postgres -f /backup/data.dump")
            .await
            .unwrap();

        let call = &executor.calls()[0];
        assert_eq!(
            call.args,
            vec![
                "-f",
                "docker-compose.yml",
                "exec",
                "-T",
                "postgres",
                "sh",
                "-c",
                "pg_dumpall -U postgres -f /backup/data.dump",
            ]
        );
    }

    #[tokio::test]
    async fn test_with_files_replaces_compose_files() {
        let settings = settings();
        let executor = RecordingExecutor::new();
        let runner = ComposeRunner::new(&settings, &executor);
        let restore = runner.with_files(vec![PathBuf::from("docker-compose.restore.yml")]);

        restore.run("down", &[]).await.unwrap();
        restore.docker(&["volume", "rm", "app_data"]).await.unwrap();

        assert_eq!(
            executor.lines(),
            vec![
                "docker-compose -f docker-compose.restore.yml down",
                "docker volume rm app_data",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_executor_reports_exit_code() {
        let invocation = Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo hello; exit 4".to_string()],
            stdio: StdioMode::Capture,
            cwd: std::env::temp_dir(),
        };

        let outcome = SystemExecutor.run(&invocation).await.unwrap();
        assert_eq!(outcome.exit_code, 4);
        assert_eq!(outcome.stdout, "hello\n");
    }

    #[tokio::test]
    async fn test_system_executor_missing_binary() {
        let invocation = Invocation {
            program: "compoctl-definitely-not-installed".to_string(),
            args: Vec::new(),
            stdio: StdioMode::Capture,
            cwd: std::env::temp_dir(),
        };

        let result = SystemExecutor.run(&invocation).await;
        assert!(matches!(result, Err(CompoctlError::Configuration(_))));
    }
}
