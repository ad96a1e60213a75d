//! `apply`: pull, build, recreate and show the stack

use crate::error::Result;
use crate::runner::{ComposeRunner, Executor};

/// Steps run by `apply`, in order
pub const APPLY_STEPS: &[&[&str]] = &[
    &["pull"],
    &["build"],
    &["down"],
    &["up", "-d"],
    &["logs"],
    &["ps"],
];

/// Steps for one `apply`, optionally without `build`
pub fn steps(build: bool) -> Vec<&'static [&'static str]> {
    APPLY_STEPS
        .iter()
        .copied()
        .filter(|step| build || step.first() != Some(&"build"))
        .collect()
}

/// Run the apply pipeline, stopping at the first failing step
pub async fn apply<E: Executor>(runner: &ComposeRunner<'_, E>, build: bool) -> Result<()> {
    for step in steps(build) {
        let Some((subcommand, args)) = step.split_first() else {
            continue;
        };
        runner.run(subcommand, args).await?;
    }
    Ok(())
}
