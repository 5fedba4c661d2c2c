//! Logging setup for the cycle tracker binaries.
//!
//! Everything is written to stderr so command output on stdout stays clean
//! enough to pipe. `RUST_LOG` always wins over the level picked here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a `-v` count to a default filter directive.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize logging at WARN unless overridden.
pub fn init() {
    init_with_level(level_for_verbosity(0))
}

/// Initialize logging from the number of `-v` flags given on the command line.
pub fn init_verbose(verbosity: u8) {
    init_with_level(level_for_verbosity(verbosity))
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Default filter directive (trace, debug, info, warn, error)
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Initialize logging for unit tests (captured by the test harness)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
