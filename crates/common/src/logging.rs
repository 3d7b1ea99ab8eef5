//! Logging and tracing initialization.
//!
//! Logs always go to stderr: `htmlpdf render -o -` streams the PDF itself
//! over stdout.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = fmt()
        .with_env_filter(filter_for(&config.level))
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .try_init()
    };
    installed.is_ok()
}

/// Capture logs through the libtest writer so they show up only for failing
/// tests. Safe to call from every test.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(filter_for("debug"))
        .with_test_writer()
        .try_init();
}
