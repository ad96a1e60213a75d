//! Invocation settings
//!
//! Everything the CLI flags and environment decide is collected once into a
//! [`Settings`] value and passed by reference to every component.

use crate::compose::parser::{DEFAULT_COMPOSE_FILE, OVERRIDE_COMPOSE_FILE};
use crate::error::{CompoctlError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default compose binary
pub const DEFAULT_COMPOSE_BIN: &str = "docker-compose";

/// Default docker binary
pub const DEFAULT_DOCKER_BIN: &str = "docker";

/// Default backup directory, relative to the working directory
pub const DEFAULT_BACKUP_DIR: &str = "backup";

/// Default delay between `up -d <service>` and its restore command
pub const DEFAULT_READY_DELAY: Duration = Duration::from_secs(5);

/// Immutable per-invocation configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Compose files passed with `-f`, in order
    pub files: Vec<PathBuf>,
    /// Explicit project name (`-p`)
    pub project_name: Option<String>,
    /// Other global options forwarded to the compose tool as given
    pub compose_options: Vec<String>,
    /// Compose binary to invoke
    pub compose_bin: String,
    /// Docker binary to invoke
    pub docker_bin: String,
    /// Backup directory
    pub backup_dir: PathBuf,
    /// Wait after starting a service during restore
    pub ready_delay: Duration,
    /// Directory the compose project lives in
    pub working_dir: PathBuf,
}

impl Settings {
    /// Create settings rooted at `working_dir` with every default applied
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            files: Vec::new(),
            project_name: None,
            compose_options: Vec::new(),
            compose_bin: DEFAULT_COMPOSE_BIN.to_string(),
            docker_bin: DEFAULT_DOCKER_BIN.to_string(),
            backup_dir: working_dir.join(DEFAULT_BACKUP_DIR),
            ready_delay: DEFAULT_READY_DELAY,
            working_dir,
        }
    }

    /// Set the compose files
    pub fn files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    /// Set the project name
    pub fn project_name(mut self, name: Option<String>) -> Self {
        self.project_name = name;
        self
    }

    /// Set the global options forwarded to the compose tool
    pub fn compose_options(mut self, options: Vec<String>) -> Self {
        self.compose_options = options;
        self
    }

    /// Set the compose binary
    pub fn compose_bin(mut self, bin: &str) -> Self {
        self.compose_bin = bin.to_string();
        self
    }

    /// Set the docker binary
    pub fn docker_bin(mut self, bin: &str) -> Self {
        self.docker_bin = bin.to_string();
        self
    }

    /// Set the backup directory; relative paths resolve against the working directory
    pub fn backup_dir(mut self, dir: &Path) -> Self {
        self.backup_dir = self.resolve(dir);
        self
    }

    /// Set the restore ready delay
    pub fn ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// Resolve a path against the working directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Compose files in effect.
    ///
    /// Without explicit `-f` flags this is `docker-compose.yml`, plus
    /// `docker-compose.override.yml` when it exists.
    pub fn compose_files(&self) -> Vec<PathBuf> {
        if !self.files.is_empty() {
            return self.files.clone();
        }

        let mut files = vec![PathBuf::from(DEFAULT_COMPOSE_FILE)];
        if self.working_dir.join(OVERRIDE_COMPOSE_FILE).exists() {
            files.push(PathBuf::from(OVERRIDE_COMPOSE_FILE));
        }
        files
    }

    /// Primary compose file (the first one), resolved
    pub fn primary_compose_file(&self) -> PathBuf {
        let files = self.compose_files();
        let first = files
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPOSE_FILE));
        self.resolve(&first)
    }

    /// Project name the compose tool will use for resource prefixes,
    /// falling back to `declared` (a compose file's top-level
    /// `name`) before the working directory name. `-p` always wins.
    pub fn project_with(&self, declared: Option<&str>) -> Result<String> {
        let raw = match (&self.project_name, declared) {
            (Some(name), _) => name.clone(),
            (None, Some(name)) => name.to_string(),
            (None, None) => self
                .working_dir
                .file_name()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    CompoctlError::Configuration(format!(
                        "Cannot derive a project name from {}",
                        self.working_dir.display()
                    ))
                })?,
        };

        let name = normalize_project_name(&raw);
        if name.is_empty() {
            return Err(CompoctlError::Configuration(format!(
                "Project name '{}' has no usable characters",
                raw
            )));
        }
        Ok(name)
    }
}

/// Normalize a project name the way compose does
fn normalize_project_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
