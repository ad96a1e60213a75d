//! `restore`: rebuild the stack from `./backup`
//!
//! This is destructive. The snapshot written by `backup` replaces the
//! compose files, every data volume except the backup one is removed, and
//! services are started and restored one at a time in declaration order so
//! that later restore commands can rely on earlier services (an application
//! schema on top of its database, for instance). The cluster is unusable
//! until the whole sequence completes.

use crate::compose::config::{ComposeFile, MountSource};
use crate::compose::parser::RESTORE_COMPOSE_FILE;
use crate::error::{CompoctlError, Result};
use crate::runner::{ComposeRunner, Executor};
use crate::settings::Settings;
use std::path::{Component, Path, PathBuf};

/// What a restore run did
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// Services whose restore command ran, in order
    pub restored: Vec<String>,
    /// Runtime volumes removed
    pub removed_volumes: Vec<String>,
    /// Bind mount paths deleted from disk
    pub removed_paths: Vec<PathBuf>,
}

/// Data to wipe before services come back up
#[derive(Debug, Default, PartialEq, Eq)]
struct Teardown {
    volumes: Vec<String>,
    paths: Vec<PathBuf>,
}

/// Restore the stack from the backup directory
pub async fn restore<E: Executor>(
    settings: &Settings,
    runner: &ComposeRunner<'_, E>,
) -> Result<RestoreReport> {
    let snapshot = settings.backup_dir.join(RESTORE_COMPOSE_FILE);
    if !snapshot.exists() {
        return Err(CompoctlError::Configuration(format!(
            "{} not found, run `compoctl backup` first",
            snapshot.display()
        )));
    }

    let local = settings.working_dir.join(RESTORE_COMPOSE_FILE);
    std::fs::copy(&snapshot, &local)?;
    let compose = ComposeFile::load(&local)?;
    let runner = runner.with_files(vec![PathBuf::from(RESTORE_COMPOSE_FILE)]);

    tracing::warn!(
        "Restoring from {}: the cluster is down until this completes",
        snapshot.display()
    );

    runner.run("pull", &[]).await?;
    runner.run("down", &[]).await?;

    let project = settings.project_with(compose.name.as_deref())?;
    let teardown = plan_teardown(settings, &compose, &project);
    let mut report = RestoreReport::default();

    for volume in teardown.volumes {
        match runner.docker(&["volume", "rm", volume.as_str()]).await {
            Ok(()) => report.removed_volumes.push(volume),
            Err(CompoctlError::Execution { exit_code, .. }) => {
                tracing::warn!("Could not remove volume {} (exit code {})", volume, exit_code);
            }
            Err(e) => return Err(e),
        }
    }

    for path in teardown.paths {
        if !path.exists() {
            continue;
        }
        tracing::info!("Removing {}", path.display());
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        report.removed_paths.push(path);
    }

    for service in compose.services() {
        runner.run("up", &["-d", service.name.as_str()]).await?;

        let Some(ref cmd) = service.restore_cmd else {
            continue;
        };

        if !settings.ready_delay.is_zero() {
            tracing::info!("Waiting for {}", service.name);
            tokio::time::sleep(settings.ready_delay).await;
        }

        tracing::info!("Restoring {}", service.name);
        runner.exec(&service.name, cmd).await?;
        report.restored.push(service.name.clone());
    }

    if report.restored.is_empty() {
        tracing::warn!("No io.compoctl.restore.cmd label found: no data restore!");
    }

    runner.run("up", &["-d"]).await?;
    runner.run("logs", &[]).await?;
    runner.run("ps", &[]).await?;

    Ok(report)
}

/// Work out which volumes and host paths to wipe.
///
/// Named volumes follow `down -v`: every non external volume of the
/// project, except the one holding the backup. That is a volume named
/// after the backup directory, or one whose `driver_opts.device` lies
/// inside it. Bind mounts are only wiped for services that restore into
/// them, and only when they lie inside the project directory. Any mount
/// backing the backup directory is kept.
fn plan_teardown(settings: &Settings, compose: &ComposeFile, project: &str) -> Teardown {
    let working_dir = lexical(&settings.working_dir);
    let backup_dir = lexical(&settings.backup_dir);
    let backup_name = backup_dir.file_name().and_then(|s| s.to_str());

    let mut teardown = Teardown::default();
    let mut push_volume = |key: &str| {
        let decl = compose.volume(key);
        if decl.is_some_and(|d| d.external) {
            return;
        }
        let backs_backup = decl
            .and_then(|d| d.device.as_deref())
            .map(|device| lexical(&settings.resolve(device)))
            .is_some_and(|device| device.starts_with(&backup_dir));
        if backs_backup || Some(key) == backup_name {
            tracing::debug!("Keeping backup volume {}", key);
            return;
        }
        let name = match decl {
            Some(decl) => decl.runtime_name(project),
            None => format!("{}_{}", project, key),
        };
        if !teardown.volumes.contains(&name) {
            teardown.volumes.push(name);
        }
    };

    for decl in compose.volumes() {
        push_volume(&decl.key);
    }
    for service in compose.services() {
        for mount in &service.mounts {
            if let MountSource::Named(ref key) = mount.source {
                push_volume(key);
            }
        }
    }

    for service in compose.services().iter().filter(|s| s.restore_cmd.is_some()) {
        for mount in &service.mounts {
            let MountSource::Bind(ref source) = mount.source else {
                continue;
            };
            if source.starts_with("~") {
                tracing::debug!("Keeping host path outside the project: {}", source.display());
                continue;
            }
            let path = lexical(&settings.working_dir.join(source));
            if path == working_dir || !path.starts_with(&working_dir) {
                tracing::debug!("Keeping host path outside the project: {}", path.display());
                continue;
            }
            if path.starts_with(&backup_dir) || backup_dir.starts_with(&path) {
                continue;
            }
            if !teardown.paths.contains(&path) {
                teardown.paths.push(path);
            }
        }
    }

    teardown
}

/// Normalize `.` and `..` components without touching the filesystem
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
