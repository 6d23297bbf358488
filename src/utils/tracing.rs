//! Tracing subscriber setup
//!
//! Logs are written to stderr so that stdout stays free for reports.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Build the env filter: `RUST_LOG` wins over the configured level
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = build_filter(level);

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_level() {
        let filter = build_filter("debug");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_tracing("info", LogFormat::Pretty);
        init_tracing("info", LogFormat::Json);
    }
}
