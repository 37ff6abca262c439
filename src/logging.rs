//! Logging setup
//!
//! Everything goes to stderr: `exec`, `run` and `stream` print child output on
//! stdout and it must reach the caller untouched.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Our own events at `info`, dependencies only when they warn
const DEFAULT_DIRECTIVES: &str = "warn,procbridge=info";
const VERBOSE_DIRECTIVES: &str = "info,procbridge=debug";

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines, thread names shown so endpoint events stand out
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Pick the filter directives.
///
/// `--verbose` wins, then `RUST_LOG`, then the `log_filter` setting.
pub fn directives(verbose: bool, from_env: Option<String>, from_settings: Option<&str>) -> String {
    if verbose {
        return VERBOSE_DIRECTIVES.to_string();
    }
    from_env
        .filter(|d| !d.trim().is_empty())
        .or_else(|| from_settings.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string())
}

/// Install the global subscriber
pub fn init(format: LogFormat, directives: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log filter '{}'", directives))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_thread_names(true).with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    tracing::debug!("Logging initialized with '{}'", directives);
    Ok(())
}
