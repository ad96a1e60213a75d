//! `backup`: dump labelled services and snapshot the running configuration
//!
//! Services opt in with an `io.compoctl.backup.cmd` label. The command runs
//! inside the service container through `docker-compose exec`; it is
//! expected to write into a bind mount of `./backup/<service>`:
//!
//! ```yaml
//! postgres:
//!   volumes:
//!     - ./backup/postgres:/backup
//!   labels:
//!     io.compoctl.backup.cmd: pg_dumpall -U postgres -f /backup/data.dump
//! ```
//!
//! The resolved configuration, with every image pinned to the one actually
//! running, is written to `./backup/docker-compose.restore.yml`. When a
//! `docker-compose.backup.yml` sits next to the primary compose file it is
//! brought up afterwards, so off-site export can run as ordinary containers.

use crate::compose::parser::{BACKUP_COMPOSE_FILE, RESTORE_COMPOSE_FILE};
use crate::compose::ComposeParser;
use crate::error::{CompoctlError, Result};
use crate::runner::{ComposeRunner, Executor};
use crate::settings::Settings;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Compose label identifying the service of a container
const SERVICE_LABEL: &str = "com.docker.compose.service";

/// What a backup run did
#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    /// Services whose backup command succeeded
    pub backed_up: Vec<String>,
    /// Where the configuration snapshot was written
    pub snapshot: PathBuf,
    /// Services pinned to their running image
    pub pinned: Vec<String>,
    /// Whether `docker-compose.backup.yml` was run
    pub side_pipeline: bool,
}

#[derive(Debug, Deserialize)]
struct ContainerInspect {
    #[serde(rename = "Config")]
    config: InspectConfig,
}

#[derive(Debug, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

/// Back up every labelled service.
///
/// A failing backup command does not stop the others; the last failure is
/// returned once every service had its turn and the snapshot is written.
pub async fn backup<E: Executor>(
    settings: &Settings,
    runner: &ComposeRunner<'_, E>,
) -> Result<BackupReport> {
    if !settings.backup_dir.exists() {
        tracing::info!("Creating {}", settings.backup_dir.display());
        std::fs::create_dir_all(&settings.backup_dir)?;
    }

    let rendered = runner.capture("config", &[]).await?;
    let mut compose = ComposeParser::parse_str(&rendered)?;

    let mut report = BackupReport::default();
    let mut last_failure = None;

    for service in compose.services() {
        let Some(ref cmd) = service.backup_cmd else {
            tracing::debug!("{} has no backup command", service.name);
            continue;
        };

        tracing::info!("Backing up {}", service.name);
        match runner.exec(&service.name, cmd).await {
            Ok(()) => report.backed_up.push(service.name.clone()),
            Err(CompoctlError::Execution { exit_code, .. }) => {
                tracing::error!(
                    "Backup of {} exited with code {}",
                    service.name,
                    exit_code
                );
                last_failure = Some(CompoctlError::Execution {
                    command: format!("backup of {}", service.name),
                    exit_code,
                });
            }
            Err(e) => return Err(e),
        }
    }

    for (service, image) in running_images(runner).await? {
        if compose.pin_image(&service, &image) {
            tracing::debug!("Pinned {} to {}", service, image);
            report.pinned.push(service);
        } else {
            tracing::debug!("Running container for unknown service {}", service);
        }
    }
    report.pinned.sort();

    report.snapshot = settings.backup_dir.join(RESTORE_COMPOSE_FILE);
    tracing::info!(
        "Writing {} with hard coded images",
        report.snapshot.display()
    );
    std::fs::write(&report.snapshot, compose.to_yaml()?)?;

    if report.backed_up.is_empty() && last_failure.is_none() {
        tracing::warn!("No io.compoctl.backup.cmd label found: no data backup!");
    }

    if let Some(failure) = last_failure {
        tracing::warn!("Skipping {} because a backup failed", BACKUP_COMPOSE_FILE);
        return Err(failure);
    }

    let side_pipeline = settings
        .primary_compose_file()
        .parent()
        .map(|dir| dir.join(BACKUP_COMPOSE_FILE))
        .filter(|path| path.exists());

    if let Some(path) = side_pipeline {
        tracing::info!("Running {}", path.display());
        runner.with_files(vec![path]).run("up", &[]).await?;
        report.side_pipeline = true;
    }

    Ok(report)
}

/// Image of every running container, keyed by compose service
async fn running_images<E: Executor>(
    runner: &ComposeRunner<'_, E>,
) -> Result<HashMap<String, String>> {
    let ids = runner.capture("ps", &["-q"]).await?;
    let ids: Vec<&str> = ids.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut args = vec!["inspect"];
    args.extend(ids);
    let inspected = runner.docker_capture(&args).await?;
    let containers: Vec<ContainerInspect> = serde_json::from_str(&inspected)?;

    Ok(containers
        .into_iter()
        .filter_map(|c| {
            let service = c.config.labels?.remove(SERVICE_LABEL)?;
            Some((service, c.config.image))
        })
        .collect())
}
