//! Process-level async runtime for the CLI.
//!
//! Built by hand instead of `#[tokio::main]`: dropping a runtime waits for
//! every running `spawn_blocking` task, and a query that timed out may
//! leave the local embedding model working (or downloading on first use).
//! Exit must not wait on that.

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

/// How long exit waits for blocking tasks that are still running.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Run `fut` on a fresh multi-threaded runtime, then shut the runtime down
/// waiting at most `grace` for leftover blocking work.
pub fn block_on_with_grace<F: Future>(fut: F, grace: Duration) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let output = runtime.block_on(fut);
    runtime.shutdown_timeout(grace);
    Ok(output)
}
