//! Error types for compoctl

use thiserror::Error;

/// Result type for compoctl operations
pub type Result<T> = std::result::Result<T, CompoctlError>;

/// compoctl error types
#[derive(Error, Debug)]
pub enum CompoctlError {
    #[error("Compose file parse error: {0}")]
    Parse(String),

    #[error("`{command}` exited with code {exit_code}")]
    Execution { command: String, exit_code: i32 },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CompoctlError {
    /// Process exit code to report for this error.
    ///
    /// External failures keep the child's own code so that `compoctl`
    /// exits exactly like the wrapped tool would.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompoctlError::Execution { exit_code, .. } if *exit_code != 0 => *exit_code,
            _ => 1,
        }
    }
}
