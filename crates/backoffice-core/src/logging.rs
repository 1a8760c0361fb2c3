//! Structured logging setup.
//!
//! Logs go to a daily-rotated file under `<home>/logs/` so that command output
//! on stdout stays clean. `BACKOFFICE_LOG` takes an `EnvFilter` directive and
//! wins over the configured level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_ENV: &str = "BACKOFFICE_LOG";
const LOG_FILE_PREFIX: &str = "backoffice.log";

/// Builds the filter from `BACKOFFICE_LOG`, falling back to `default_level`.
fn build_filter(default_level: &str) -> EnvFilter {
    filter_from(std::env::var(LOG_ENV).ok().as_deref(), default_level)
}

/// Uses `directive` when it parses, `default_level` otherwise.
fn filter_from(directive: Option<&str>, default_level: &str) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

/// Installs the global subscriber writing to `dir`.
///
/// The returned guard flushes buffered lines on drop; keep it alive for the
/// lifetime of the process.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(dir: &Path, default_level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "logging initialized");
    Ok(guard)
}

/// Masks a credential for display and logs: keeps a short prefix and the length.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 8 {
        return "****".to_string();
    }
    format!("{visible}…({} chars)", token.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_hides_short_tokens_entirely() {
        assert_eq!(mask_token("abc"), "****");
        assert_eq!(mask_token(""), "****");
    }

    #[test]
    fn mask_keeps_prefix_and_length() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1"), "eyJh…(16 chars)");
    }

    #[test]
    fn filter_falls_back_to_default_level() {
        assert_eq!(filter_from(None, "warn").to_string(), "warn");
    }

    #[test]
    fn env_directive_wins_over_default() {
        assert_eq!(
            filter_from(Some("backoffice_core=debug"), "warn").to_string(),
            "backoffice_core=debug"
        );
    }

    #[test]
    fn unparsable_directive_falls_back() {
        assert_eq!(
            filter_from(Some("backoffice_core=verbose"), "error").to_string(),
            "error"
        );
    }
}
