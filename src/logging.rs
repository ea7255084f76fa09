//! Logging setup on `tracing-subscriber`.
//!
//! `RUST_LOG` always wins; otherwise the level is `info`, or `debug` with
//! `--verbose`. Engine output that is not a protocol frame is logged under the
//! `hydrocal::engine_output` target, so `RUST_LOG=hydrocal::engine_output=off`
//! silences routine chatter.

use tracing_subscriber::{EnvFilter, fmt};

/// Default filter directive for the given verbosity flag.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Initialize the global subscriber. Call once, first thing in `main`.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Subscriber for tests: debug level, captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "debug");
    }

    #[test]
    fn test_init_test_is_repeatable() {
        init_test();
        init_test();
        tracing::debug!("test subscriber installed");
    }
}
