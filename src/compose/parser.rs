//! Docker Compose file parser

use super::config::ComposeFile;
use crate::error::{CompoctlError, Result};
use std::path::Path;

/// Compose file used when no `-f` is given
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Override file picked up next to the default one
pub const OVERRIDE_COMPOSE_FILE: &str = "docker-compose.override.yml";

/// Snapshot of the resolved configuration written by `backup`
pub const RESTORE_COMPOSE_FILE: &str = "docker-compose.restore.yml";

/// Optional side pipeline run after `backup`
pub const BACKUP_COMPOSE_FILE: &str = "docker-compose.backup.yml";

/// Compose file parser
pub struct ComposeParser;

impl ComposeParser {
    /// Parse compose file from path
    pub fn parse_file(path: &Path) -> Result<ComposeFile> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CompoctlError::Parse(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_str(&content)
    }

    /// Parse compose file from string
    pub fn parse_str(content: &str) -> Result<ComposeFile> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| CompoctlError::Parse(format!("Failed to parse YAML: {}", e)))?;

        ComposeFile::from_document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::{MountSource, BACKUP_CMD, RESTORE_CMD};
    use tempfile::tempdir;

    const POSTGRES: &str = r#"
version: "3.8"
services:
  postgres:
    image: postgres:13
    volumes:
      - postgres-data:/var/lib/postgresql/data
      - ./backup/postgres:/backup
    labels:
      io.compoctl.backup.cmd: pg_dumpall -U postgres -f /backup/data.dump
      io.compoctl.restore.cmd: |
        psql -U postgres -f /backup/data.dump &> /backup/restore.log
  web:
    image: nginx:latest
    ports:
      - "80:80"
    depends_on:
      - postgres
  cache:
volumes:
  postgres-data:
"#;

    #[test]
    fn test_parse_keeps_declaration_order() {
        let compose = ComposeParser::parse_str(POSTGRES).unwrap();
        let names: Vec<&str> = compose.services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["postgres", "web", "cache"]);
        assert_eq!(compose.volumes().len(), 1);
        assert_eq!(compose.volumes()[0].key, "postgres-data");
    }

    #[test]
    fn test_parse_labels() {
        let compose = ComposeParser::parse_str(POSTGRES).unwrap();

        assert_eq!(
            compose.label("postgres", BACKUP_CMD),
            Some("pg_dumpall -U postgres -f /backup/data.dump")
        );
        assert_eq!(
            compose.label("postgres", RESTORE_CMD),
            Some("psql -U postgres -f /backup/data.dump &> /backup/restore.log\n")
        );
        assert_eq!(compose.label("web", BACKUP_CMD), None);
        assert_eq!(compose.label("missing", BACKUP_CMD), None);

        let cache = compose.service("cache").unwrap();
        assert!(cache.backup_cmd.is_none());
        assert!(cache.restore_cmd.is_none());
        assert!(cache.mounts.is_empty());
    }

    #[test]
    fn test_parse_mounts() {
        let compose = ComposeParser::parse_str(POSTGRES).unwrap();
        let postgres = compose.service("postgres").unwrap();
        assert_eq!(
            postgres.mounts[0].source,
            MountSource::Named("postgres-data".to_string())
        );
        assert_eq!(postgres.mounts[1].target, "/backup");
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ComposeParser::parse_str("services: [unclosed");
        assert!(matches!(result, Err(CompoctlError::Parse(_))));
    }

    #[test]
    fn test_not_a_mapping() {
        let result = ComposeParser::parse_str("- just\n- a list\n");
        assert!(matches!(result, Err(CompoctlError::Parse(_))));

        let result = ComposeParser::parse_str("services: nope\n");
        assert!(matches!(result, Err(CompoctlError::Parse(_))));
    }

    #[test]
    fn test_empty_services() {
        let compose = ComposeParser::parse_str("services:\n").unwrap();
        assert!(compose.services().is_empty());
    }

    #[test]
    fn test_parse_file_missing() {
        let temp = tempdir().unwrap();
        let result = ComposeParser::parse_file(&temp.path().join("nope.yml"));
        assert!(matches!(result, Err(CompoctlError::Parse(_))));
    }

    #[test]
    fn test_pin_image_round_trips() {
        let mut compose = ComposeParser::parse_str(POSTGRES).unwrap();
        assert!(compose.pin_image("web", "nginx@sha256:abc"));
        assert!(compose.pin_image("cache", "redis:7"));
        assert!(!compose.pin_image("ghost", "x"));

        let reparsed = ComposeParser::parse_str(&compose.to_yaml().unwrap()).unwrap();
        assert_eq!(
            reparsed.service("web").unwrap().image.as_deref(),
            Some("nginx@sha256:abc")
        );
        assert_eq!(reparsed.service("cache").unwrap().image.as_deref(), Some("redis:7"));
        assert_eq!(
            reparsed.label("postgres", BACKUP_CMD),
            Some("pg_dumpall -U postgres -f /backup/data.dump")
        );
    }
}
