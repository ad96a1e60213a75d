//! Docker Compose file model
//!
//! This module parses compose files into the services, volumes and
//! compoctl labels the operations need.

pub mod config;
pub mod fetch;
pub mod parser;

pub use config::{ComposeFile, ServiceSpec};
pub use parser::ComposeParser;
