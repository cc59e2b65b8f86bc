//! Diagnostics for the `taskrun` CLI.
//!
//! What gets emitted:
//! - `warn`: a command killed after the configured `runner.timeout_secs`.
//! - `info`: one `execution recorded` event per run, inside the `execute`
//!   span (`task_id`, `has_override`), with `exit_code` and `duration_ms`.
//! - `debug`: child spawn and finish (`exit_code`, `elapsed_ms`), errors
//!   while killing or reaping a child, task saves and deletes, and every
//!   rewrite of the JSON store (`path`, `count`).
//!
//! Command output, rejection reasons and CLI JSON never go through the log;
//! they reach the caller as return values, stdout or the exit status.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber used by the CLI.
///
/// Filter comes from `RUST_LOG`, falling back to `warn` so a normal run prints
/// nothing but its JSON result. Output stays on stderr, keeping stdout
/// parseable.
///
/// # Example
/// ```bash
/// RUST_LOG=taskrun=info taskrun exec backup        # one line per recorded run
/// RUST_LOG=taskrun::io=debug taskrun exec backup   # spawn, reap and store writes
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
