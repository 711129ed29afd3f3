//! Logging configuration using tracing
//!
//! Output always goes to stderr; the payload owns stdout once it takes over.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Selects JSON output when set to `json`
pub const LOG_FORMAT_ENV: &str = "BOOTSTRAP_LOG_FORMAT";

/// Forces debug output when set to a truthy value
pub const VERBOSE_ENV: &str = "BOOTSTRAP_VERBOSE";

/// Logging switches read from the environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub verbose: bool,
    pub json: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let json = lookup(LOG_FORMAT_ENV)
            .map(|v| v.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let verbose = lookup(VERBOSE_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { verbose, json }
    }
}

/// Initialize the logging system
pub fn init(settings: LogSettings) -> anyhow::Result<()> {
    let filter = if settings.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
