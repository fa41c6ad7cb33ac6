//! Tracing subscriber setup for the `holo` binary.
//!
//! Diagnostics go to stderr so stdout carries only the report (text or
//! JSON). Filtering follows the `HOLO_LOG` environment variable, using the
//! usual `EnvFilter` directive syntax (`HOLO_LOG=holo_index=debug`).

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "HOLO_LOG";

/// Initialize the global subscriber. Defaults to `warn` if `HOLO_LOG` is
/// unset or unparsable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (e.g. from a test harness) is not an error worth failing on.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
