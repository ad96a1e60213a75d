//! compoctl - a docker-compose wrapper
//!
//! compoctl passes any docker-compose subcommand straight through and adds:
//!
//! - `apply`: pull, build, down, up, logs and ps in one go
//! - `backup`: run labelled dump commands inside containers and snapshot
//!   the running configuration into `./backup`
//! - `restore`: rebuild the stack from `./backup`, one service at a time

pub mod compose;
pub mod error;
pub mod ops;
pub mod runner;
pub mod settings;

pub use error::{CompoctlError, Result};
pub use runner::{ComposeRunner, Executor, SystemExecutor};
pub use settings::Settings;
