//! Logging initialization.
//!
//! `tracing` + `tracing-subscriber`, filtered via `RUST_LOG` or the
//! `--debug` flag. No OTLP export: syncrclone is a single-shot CLI job
//! runner, not a long-lived service reporting to a collector.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `debug` raises the default filter to
/// `debug` and switches on file/line/target in the formatter; otherwise the
/// default level is `info` unless overridden by `RUST_LOG`.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_file(debug)
        .with_line_number(debug)
        .with_writer(std::io::stderr);

    if builder.try_init().is_err() {
        // A subscriber is already installed (e.g. set by an embedding test
        // harness) — nothing to do.
    }
}
