#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Logging setup shared by every swarmview surface.
//!
//! Centralises the tracing-subscriber installation so embedding binaries
//! and integration tests adopt the same observability story.

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt};

/// Default logging target when `RUST_LOG` is not provided.
const DEFAULT_LOG_LEVEL: &str = "info";

static INSTALLED: OnceCell<LogFormat> = OnceCell::new();

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Machine-readable JSON lines.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::Pretty,
        }
    }
}

/// Configure and install the global tracing subscriber.
///
/// Repeated calls are tolerated once a subscriber from this crate is in
/// place, so test binaries can initialise logging per test.
///
/// # Errors
///
/// Returns an error if a foreign subscriber was installed globally before
/// this function ever succeeded.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level));

    let install = |format: LogFormat| {
        let builder = fmt::fmt()
            .with_env_filter(env_filter.clone())
            .with_target(false)
            .with_thread_ids(false);

        match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        }
    };

    if INSTALLED.get().is_some() {
        return Ok(());
    }

    install(config.format)
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;
    let _ = INSTALLED.set(config.format);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config).expect("first install");
        init_logging(&config).expect("second install is a no-op");
        init_logging(&LoggingConfig {
            level: "debug",
            format: LogFormat::Json,
        })
        .expect("later configs are ignored once installed");
    }
}
