//! High level operations built on the compose runner
//!
//! Each operation issues a fixed, sequential series of external commands;
//! nothing runs in parallel.

pub mod apply;
pub mod backup;
pub mod restore;

pub use apply::apply;
pub use backup::{backup, BackupReport};
pub use restore::{restore, RestoreReport};
