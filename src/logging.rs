//! Logging setup.
//!
//! All output goes to **stderr**; stdout belongs to the plugin host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard `tracing` filter, e.g. `cyral_provider=debug`.
//! - `TF_LOG`: Terraform's log level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`,
//!   `JSON`). Used when `RUST_LOG` is unset or unparseable.
//!
//! ```bash
//! # Dispatcher steps and HTTP calls
//! RUST_LOG=cyral_provider=debug terraform apply
//!
//! # Same effect through Terraform's own switch
//! TF_LOG=DEBUG terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a Terraform `TF_LOG` value to a `tracing` level directive.
pub fn tf_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    }
}

/// Build the filter from `RUST_LOG`, then `TF_LOG`, then `default_level`.
pub fn resolve_filter<F>(lookup: F, default_level: &str) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(filter) = lookup(EnvFilter::DEFAULT_ENV).and_then(|v| EnvFilter::try_new(v).ok()) {
        return filter;
    }
    if let Some(level) = lookup("TF_LOG").as_deref().and_then(tf_log_level) {
        return EnvFilter::new(level);
    }
    EnvFilter::new(default_level)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn build_subscriber(
    filter: EnvFilter,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber with an `info` default.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Install the global subscriber with the given default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    build_subscriber(resolve_filter(env_lookup, default_level)).init();
}

/// Install the global subscriber, returning `false` if one is already set.
pub fn try_init_logging() -> bool {
    build_subscriber(resolve_filter(env_lookup, "info"))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // filter resolution is tested here.

    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_tf_log_level() {
        assert_eq!(tf_log_level("DEBUG"), Some("debug"));
        assert_eq!(tf_log_level("json"), Some("trace"));
        assert_eq!(tf_log_level(" warn "), Some("warn"));
        assert_eq!(tf_log_level("OFF"), None);
    }

    #[test]
    fn test_rust_log_wins() {
        let filter = resolve_filter(
            lookup(&[("RUST_LOG", "cyral_provider=trace"), ("TF_LOG", "ERROR")]),
            "info",
        );
        assert_eq!(filter.to_string(), "cyral_provider=trace");
    }

    #[test]
    fn test_tf_log_fallback() {
        let filter = resolve_filter(lookup(&[("TF_LOG", "DEBUG")]), "info");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_default_level() {
        let filter = resolve_filter(lookup(&[("TF_LOG", "nonsense")]), "warn");
        assert_eq!(filter.to_string(), "warn");
    }
}
