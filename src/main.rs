//! compoctl - docker-compose with apply, backup and restore
//!
//! This is the main CLI entry point for compoctl.

use clap::{Parser, Subcommand};
use compoctl::compose::fetch;
use compoctl::error::Result;
use compoctl::ops;
use compoctl::settings::{DEFAULT_BACKUP_DIR, DEFAULT_COMPOSE_BIN, DEFAULT_DOCKER_BIN};
use compoctl::{ComposeRunner, Settings, SystemExecutor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// compoctl - docker-compose wrapper
#[derive(Parser)]
#[command(name = "compoctl")]
#[command(version)]
#[command(
    about = "Wrap docker-compose: apply, backup and restore on top of every compose command",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Compose file; repeat for overrides, http(s) URLs are downloaded first
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    files: Vec<String>,

    /// Project name
    #[arg(short = 'p', long, env = "COMPOSE_PROJECT_NAME")]
    project_name: Option<String>,

    /// Backup directory
    #[arg(long, env = "COMPOCTL_BACKUP_DIR", default_value = DEFAULT_BACKUP_DIR)]
    backup_dir: PathBuf,

    /// Seconds to wait after starting a service before restoring it
    #[arg(long, env = "COMPOCTL_READY_DELAY", default_value_t = 5)]
    ready_delay: u64,

    /// docker-compose binary
    #[arg(long, env = "COMPOCTL_COMPOSE_BIN", default_value = DEFAULT_COMPOSE_BIN, hide = true)]
    compose_bin: String,

    /// docker binary
    #[arg(long, env = "COMPOCTL_DOCKER_BIN", default_value = DEFAULT_DOCKER_BIN, hide = true)]
    docker_bin: String,

    /// Unknown global options, forwarded to docker-compose
    #[arg(skip)]
    compose_options: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chain pull, build, down, up -d, logs and ps
    Apply {
        /// Skip the build step
        #[arg(long)]
        no_build: bool,
    },

    /// Run backup commands and snapshot the running configuration into the backup directory
    Backup,

    /// Destroy data volumes and restore every service from the backup directory
    Restore,

    /// Any other docker-compose command
    #[command(external_subcommand)]
    Compose(Vec<String>),
}

/// compoctl global options taking a value
const VALUE_OPTIONS: &[&str] = &[
    "-f",
    "--file",
    "-p",
    "--project-name",
    "--backup-dir",
    "--ready-delay",
    "--compose-bin",
    "--docker-bin",
];

/// compoctl global switches
const SWITCH_OPTIONS: &[&str] = &["-d", "--debug", "-h", "--help", "-V", "--version"];

/// docker-compose global options taking a value
const COMPOSE_VALUE_OPTIONS: &[&str] = &[
    "--env-file",
    "--project-directory",
    "--profile",
    "--ansi",
    "--progress",
    "--parallel",
    "-c",
    "--context",
    "-H",
    "--host",
    "--log-level",
    "--tlscacert",
    "--tlscert",
    "--tlskey",
];

/// Split the options before the subcommand into compoctl's own and the
/// ones to forward to docker-compose. Everything from the subcommand on is
/// left to clap.
fn split_compose_options(args: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut args = args.into_iter();
    let mut own: Vec<String> = args.next().into_iter().collect();
    let mut forwarded = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--" || !arg.starts_with('-') {
            own.push(arg);
            break;
        }

        let (name, inline) = match arg.split_once('=') {
            Some((name, _)) => (name, true),
            None => (arg.as_str(), false),
        };

        if VALUE_OPTIONS.contains(&name) {
            own.push(arg);
            if !inline {
                own.extend(args.next());
            }
        } else if SWITCH_OPTIONS.contains(&name) {
            own.push(arg);
        } else if !arg.starts_with("--")
            && arg.len() > 2
            && arg.get(..2).is_some_and(|short| VALUE_OPTIONS.contains(&short))
        {
            // -fdocker-compose.yml
            own.push(arg);
        } else {
            let takes_value = !inline && COMPOSE_VALUE_OPTIONS.contains(&name);
            forwarded.push(arg);
            if takes_value {
                forwarded.extend(args.next());
            }
        }
    }

    own.extend(args);
    (own, forwarded)
}

#[tokio::main]
async fn main() -> ExitCode {
    let (args, compose_options) = split_compose_options(std::env::args().collect());
    let mut cli = Cli::parse_from(args);
    cli.compose_options = compose_options;

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1).max(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let working_dir = std::env::current_dir()?;
    let files = fetch::resolve_files(&cli.files, &working_dir).await?;

    let settings = Settings::new(working_dir)
        .files(files)
        .project_name(cli.project_name)
        .compose_options(cli.compose_options)
        .compose_bin(&cli.compose_bin)
        .docker_bin(&cli.docker_bin)
        .backup_dir(&cli.backup_dir)
        .ready_delay(Duration::from_secs(cli.ready_delay));

    let executor = SystemExecutor;
    let runner = ComposeRunner::new(&settings, &executor);

    match cli.command {
        Commands::Apply { no_build } => ops::apply(&runner, !no_build).await,

        Commands::Backup => {
            let report = ops::backup(&settings, &runner).await?;
            tracing::info!(
                "Backed up {} service(s), snapshot at {}",
                report.backed_up.len(),
                report.snapshot.display()
            );
            Ok(())
        }

        Commands::Restore => {
            let report = ops::restore(&settings, &runner).await?;
            tracing::info!(
                "Restored {} service(s), removed {} volume(s)",
                report.restored.len(),
                report.removed_volumes.len()
            );
            Ok(())
        }

        Commands::Compose(args) => {
            let Some((subcommand, rest)) = args.split_first() else {
                return Ok(());
            };
            let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
            runner.run(subcommand, &rest).await
        }
    }
}
