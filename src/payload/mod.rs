//! Worker payload resolution
//!
//! Tries the remote source once, then the bundled copy. Callers branch on the
//! returned [`ResolveOutcome`]; no error escapes this module.

pub mod fetch;
pub mod slot;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub use fetch::FetchError;
pub use slot::Installed;

/// Why the bundled payload could not be used
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("Fallback payload {} is missing or unreadable: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fallback payload {} is empty", path.display())]
    Empty { path: PathBuf },

    #[error("Failed to install fallback payload into {}: {source}", slot.display())]
    Install {
        slot: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of resolving the payload slot
#[derive(Debug)]
pub enum ResolveOutcome {
    /// Slot holds the remote content
    Fetched(Installed),
    /// Remote failed; slot holds the bundled content
    FallbackUsed {
        reason: FetchError,
        installed: Installed,
    },
    /// Neither source produced a runnable payload
    Fatal {
        fetch: FetchError,
        fallback: FallbackError,
    },
}

impl ResolveOutcome {
    /// Whether the slot is ready to launch
    #[allow(dead_code)]
    pub fn is_runnable(&self) -> bool {
        !matches!(self, ResolveOutcome::Fatal { .. })
    }

    pub fn installed(&self) -> Option<&Installed> {
        match self {
            ResolveOutcome::Fetched(installed) => Some(installed),
            ResolveOutcome::FallbackUsed { installed, .. } => Some(installed),
            ResolveOutcome::Fatal { .. } => None,
        }
    }
}

impl fmt::Display for ResolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveOutcome::Fetched(_) => write!(f, "fetched"),
            ResolveOutcome::FallbackUsed { .. } => write!(f, "fallback-used"),
            ResolveOutcome::Fatal { .. } => write!(f, "fatal"),
        }
    }
}

/// Populate `local_slot` from `source_uri`, or from `fallback_path` if the
/// remote attempt fails for any reason.
pub async fn resolve_payload(
    source_uri: &str,
    local_slot: &Path,
    fallback_path: &Path,
    timeout: Duration,
) -> ResolveOutcome {
    let reason = match fetch::fetch_into_slot(source_uri, local_slot, timeout).await {
        Ok(installed) => {
            tracing::info!(
                "Fetched latest payload from {} ({} bytes, sha256 {})",
                source_uri,
                installed.bytes,
                installed.sha256
            );
            return ResolveOutcome::Fetched(installed);
        }
        Err(e) => e,
    };

    tracing::warn!("Remote payload unavailable ({}); using bundled copy", reason);

    match install_fallback(local_slot, fallback_path) {
        Ok(installed) => {
            tracing::info!(
                "Installed fallback payload from {} ({} bytes, sha256 {})",
                fallback_path.display(),
                installed.bytes,
                installed.sha256
            );
            ResolveOutcome::FallbackUsed { reason, installed }
        }
        Err(fallback) => ResolveOutcome::Fatal {
            fetch: reason,
            fallback,
        },
    }
}

fn install_fallback(local_slot: &Path, fallback_path: &Path) -> Result<Installed, FallbackError> {
    let contents = std::fs::read(fallback_path).map_err(|source| FallbackError::Unreadable {
        path: fallback_path.to_path_buf(),
        source,
    })?;

    if contents.is_empty() {
        return Err(FallbackError::Empty {
            path: fallback_path.to_path_buf(),
        });
    }

    slot::install_bytes(local_slot, &contents).map_err(|source| FallbackError::Install {
        slot: local_slot.to_path_buf(),
        source,
    })
}
