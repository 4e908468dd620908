//! Tracing setup for the CLI.
//!
//! Logs always go to stderr; stdout carries the JSON results.

use pixvault_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_directive` when it is set.
pub fn init(default_directive: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

/// Install the subscriber from `[logging]`; `--verbose` forces debug and
/// `--json-logs` forces JSON.
pub fn init_from_config(config: &Config, verbose: bool, json_logs: bool) {
    let directive = if verbose { "debug" } else { config.logging.level.as_str() };
    init(directive, json_logs || config.logging.format == "json");
}
