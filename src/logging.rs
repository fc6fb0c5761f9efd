//! Tracing subscriber setup for binaries.

use tracing_subscriber::EnvFilter;

use crate::config;

/// Install a global `fmt` subscriber filtered by `INTEGRATION_RUNNER_LOG` / `RUST_LOG`.
///
/// Logs go to stderr so stdout stays free for results and JSON output.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_new(&config::get().log_filter)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
