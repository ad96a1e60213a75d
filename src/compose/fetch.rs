//! Remote compose files
//!
//! `-f https://host/path/compose.yml` is downloaded next to the project and
//! the local copy is handed to the compose tool instead.

use crate::error::{CompoctlError, Result};
use std::path::{Path, PathBuf};

/// Whether a `-f` argument points at an HTTP(S) URL
pub fn is_remote(file: &str) -> bool {
    file.starts_with("http://") || file.starts_with("https://")
}

/// File name a remote compose file is saved under
pub fn local_name(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !path.ends_with("://"))
        .map(str::to_string)
        .ok_or_else(|| CompoctlError::Fetch {
            url: url.to_string(),
            message: "URL has no file name".to_string(),
        })
}

/// Resolve every `-f` argument to a local path, downloading remote ones into `dir`
pub async fn resolve_files(files: &[String], dir: &Path) -> Result<Vec<PathBuf>> {
    let client = match files.iter().find(|f| is_remote(f)) {
        Some(url) => Some(reqwest::Client::builder().build().map_err(|e| {
            CompoctlError::Fetch {
                url: url.clone(),
                message: e.to_string(),
            }
        })?),
        None => None,
    };

    let mut resolved = Vec::with_capacity(files.len());
    for file in files {
        match &client {
            Some(client) if is_remote(file) => resolved.push(download(client, file, dir).await?),
            _ => resolved.push(PathBuf::from(file)),
        }
    }

    Ok(resolved)
}

async fn download(client: &reqwest::Client, url: &str, dir: &Path) -> Result<PathBuf> {
    let fetch_error = |message: String| CompoctlError::Fetch {
        url: url.to_string(),
        message,
    };

    tracing::info!("Fetching {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(fetch_error(format!("HTTP {}", response.status())));
    }

    let content = response
        .text()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    let name = local_name(url)?;
    let target = dir.join(&name);
    std::fs::write(&target, content)?;
    tracing::debug!("Saved {} to {}", url, target.display());

    Ok(PathBuf::from(name))
}
