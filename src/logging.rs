//! Logging setup for the provider process.
//!
//! Logs go to **stderr** so that stdout stays free for whatever plugin
//! transport the embedding host uses. Filtering follows `RUST_LOG`.
//!
//! ```bash
//! # Plan diffs, including suppressed SECURE values
//! RUST_LOG=tekton_pipeline_provider::plan=debug terraform plan
//!
//! # Everything the provider does
//! RUST_LOG=tekton_pipeline_provider=trace terraform apply
//! ```
//!
//! Property values are never logged; only resource types, ids and attribute
//! names appear in log records.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LOG_LEVEL);
}

/// Initialize logging with a custom default level used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful from tests, where several cases may race to install a subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LOG_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // non-panicking entry point is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("tekton_pipeline_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,tekton_pipeline_provider::plan=trace").is_ok());
    }

    #[test]
    fn test_try_init_logging_twice() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
