//! Docker Compose configuration types

use crate::error::{CompoctlError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Label namespace recognized on services
pub const LABEL_NAMESPACE: &str = "io.compoctl";

/// Label key (under [`LABEL_NAMESPACE`]) holding the backup command
pub const BACKUP_CMD: &str = "backup.cmd";

/// Label key (under [`LABEL_NAMESPACE`]) holding the restore command
pub const RESTORE_CMD: &str = "restore.cmd";

/// The subset of a compose service definition compoctl reads.
///
/// Unknown keys are ignored; the full document is kept separately on
/// [`ComposeFile`] so nothing is lost when it is written back out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Image name
    #[serde(default)]
    pub image: Option<String>,
    /// Volume mounts
    #[serde(default)]
    pub volumes: Option<Vec<VolumeMount>>,
    /// Labels
    #[serde(default)]
    pub labels: Option<LabelsConfig>,
}

/// Labels configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelsConfig {
    /// Array of "key=value" strings
    Array(Vec<String>),
    /// Map of key to value
    Map(HashMap<String, Value>),
}

impl LabelsConfig {
    /// Flatten either syntax into a key/value map
    pub fn to_map(&self) -> HashMap<String, String> {
        match self {
            LabelsConfig::Array(items) => items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (item.clone(), String::new()),
                })
                .collect(),
            LabelsConfig::Map(map) => map
                .iter()
                .filter_map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        Value::Null => String::new(),
                        _ => return None,
                    };
                    Some((key.clone(), value))
                })
                .collect(),
        }
    }
}

/// Volume mount configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeMount {
    /// Short syntax: "source:target:mode"
    Short(String),
    /// Long syntax
    Long(VolumeMountLong),
}

/// Long volume mount configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeMountLong {
    /// Mount type (volume, bind, tmpfs, npipe)
    #[serde(rename = "type")]
    pub mount_type: Option<String>,
    /// Source path or volume name
    pub source: Option<String>,
    /// Target path in container
    pub target: String,
}

/// Where a mount's data lives on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    /// Named volume managed by the container runtime
    Named(String),
    /// Host directory or file
    Bind(PathBuf),
    /// Anonymous volume, tmpfs or anything else with no stable host source
    Other,
}

/// A service mount reduced to its host source and container target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Host side of the mount
    pub source: MountSource,
    /// Path inside the container
    pub target: String,
}

impl VolumeMount {
    /// Classify the mount by its host source
    pub fn to_mount(&self) -> Mount {
        match self {
            VolumeMount::Short(spec) => {
                let mut parts = spec.splitn(3, ':');
                let first = parts.next().unwrap_or_default();
                match parts.next() {
                    Some(target) => Mount {
                        source: classify_source(first),
                        target: target.to_string(),
                    },
                    None => Mount {
                        source: MountSource::Other,
                        target: first.to_string(),
                    },
                }
            }
            VolumeMount::Long(long) => {
                let source = match (long.mount_type.as_deref(), long.source.as_deref()) {
                    (_, None) | (_, Some("")) => MountSource::Other,
                    (Some("bind"), Some(src)) => MountSource::Bind(PathBuf::from(src)),
                    (Some("volume"), Some(src)) => MountSource::Named(src.to_string()),
                    (None, Some(src)) => classify_source(src),
                    (Some(_), Some(_)) => MountSource::Other,
                };
                Mount {
                    source,
                    target: long.target.clone(),
                }
            }
        }
    }
}

fn classify_source(source: &str) -> MountSource {
    if source.starts_with('.') || source.starts_with('/') || source.starts_with('~') {
        MountSource::Bind(PathBuf::from(source))
    } else {
        MountSource::Named(source.to_string())
    }
}

/// One service of a compose file, with its compoctl labels resolved
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Service name
    pub name: String,
    /// Image, if set
    pub image: Option<String>,
    /// `io.compoctl.backup.cmd`
    pub backup_cmd: Option<String>,
    /// `io.compoctl.restore.cmd`
    pub restore_cmd: Option<String>,
    /// Declared mounts
    pub mounts: Vec<Mount>,
    /// All labels of the service
    pub labels: HashMap<String, String>,
}

impl ServiceSpec {
    /// Build a spec from a parsed service definition
    pub fn from_config(name: &str, config: &ServiceConfig) -> Self {
        let labels = config
            .labels
            .as_ref()
            .map(LabelsConfig::to_map)
            .unwrap_or_default();

        let mounts = config
            .volumes
            .iter()
            .flatten()
            .map(VolumeMount::to_mount)
            .collect();

        let mut spec = Self {
            name: name.to_string(),
            image: config.image.clone(),
            backup_cmd: None,
            restore_cmd: None,
            mounts,
            labels,
        };
        spec.backup_cmd = spec.label(BACKUP_CMD).map(str::to_string);
        spec.restore_cmd = spec.label(RESTORE_CMD).map(str::to_string);
        spec
    }

    /// Look up `key` under the compoctl label namespace.
    ///
    /// Blank values count as absent.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .get(&format!("{}.{}", LABEL_NAMESPACE, key))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// A top-level volume declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDecl {
    /// Key under `volumes:`
    pub key: String,
    /// Explicit runtime name (`name:`)
    pub name: Option<String>,
    /// Managed outside the project (`external: true`)
    pub external: bool,
    /// Host path backing the volume (`driver_opts.device`)
    pub device: Option<PathBuf>,
}

impl VolumeDecl {
    fn from_entry(key: &str, value: &Value) -> Self {
        let mut decl = Self {
            key: key.to_string(),
            name: value.get("name").and_then(Value::as_str).map(str::to_string),
            external: false,
            device: value
                .get("driver_opts")
                .and_then(|opts| opts.get("device"))
                .and_then(Value::as_str)
                .map(PathBuf::from),
        };

        match value.get("external") {
            Some(Value::Bool(external)) => decl.external = *external,
            // legacy `external: { name: ... }`
            Some(legacy @ Value::Mapping(_)) => {
                decl.external = true;
                if let Some(name) = legacy.get("name").and_then(Value::as_str) {
                    decl.name = Some(name.to_string());
                }
            }
            _ => {}
        }
        decl
    }

    /// Name of the volume in the container runtime
    pub fn runtime_name(&self, project: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", project, self.key))
    }
}

/// A parsed compose file
#[derive(Debug, Clone)]
pub struct ComposeFile {
    /// Project name from the top-level `name` key
    pub name: Option<String>,
    /// Services in declaration order
    services: Vec<ServiceSpec>,
    /// Top-level named volumes in declaration order
    volumes: Vec<VolumeDecl>,
    /// The whole document as read
    document: Value,
}

impl ComposeFile {
    /// Load and parse a compose file from disk
    pub fn load(path: &Path) -> Result<Self> {
        super::parser::ComposeParser::parse_file(path)
    }

    /// Build from an already parsed YAML document
    pub fn from_document(document: Value) -> Result<Self> {
        let root = document
            .as_mapping()
            .ok_or_else(|| CompoctlError::Parse("Top level is not a mapping".to_string()))?;

        let name = root.get("name").and_then(Value::as_str).map(str::to_string);

        let mut services = Vec::new();
        match root.get("services") {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(map)) => {
                for (key, value) in map {
                    let service_name = key.as_str().ok_or_else(|| {
                        CompoctlError::Parse(format!("Service name {:?} is not a string", key))
                    })?;
                    let config: ServiceConfig = match value {
                        Value::Null => ServiceConfig::default(),
                        other => serde_yaml::from_value(other.clone()).map_err(|e| {
                            CompoctlError::Parse(format!(
                                "Invalid service '{}': {}",
                                service_name, e
                            ))
                        })?,
                    };
                    services.push(ServiceSpec::from_config(service_name, &config));
                }
            }
            Some(_) => {
                return Err(CompoctlError::Parse(
                    "`services` is not a mapping".to_string(),
                ))
            }
        }

        let volumes = match root.get("volumes") {
            Some(Value::Mapping(map)) => map
                .iter()
                .filter_map(|(key, value)| key.as_str().map(|k| VolumeDecl::from_entry(k, value)))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            name,
            services,
            volumes,
            document,
        })
    }

    /// Services in declaration order
    pub fn services(&self) -> &[ServiceSpec] {
        &self.services
    }

    /// Service by name
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Label of a service under the compoctl namespace
    pub fn label(&self, service: &str, key: &str) -> Option<&str> {
        self.service(service).and_then(|s| s.label(key))
    }

    /// Top-level named volumes
    pub fn volumes(&self) -> &[VolumeDecl] {
        &self.volumes
    }

    /// Top-level declaration of a named volume
    pub fn volume(&self, key: &str) -> Option<&VolumeDecl> {
        self.volumes.iter().find(|v| v.key == key)
    }

    /// Override the image of a service in the document.
    ///
    /// Returns false if the service does not exist.
    pub fn pin_image(&mut self, service: &str, image: &str) -> bool {
        let Some(spec) = self.services.iter_mut().find(|s| s.name == service) else {
            return false;
        };

        let Some(entry) = self
            .document
            .get_mut("services")
            .and_then(|services| services.get_mut(service))
        else {
            return false;
        };

        if entry.is_null() {
            *entry = Value::Mapping(serde_yaml::Mapping::new());
        }
        match entry {
            Value::Mapping(map) => {
                map.insert(Value::from("image"), Value::from(image));
            }
            _ => return false,
        }

        spec.image = Some(image.to_string());
        true
    }

    /// Serialize the document back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.document)?)
    }
}
