//! Bootstrap configuration
//!
//! Every path and timing the bootstrap depends on is fixed at image build time.
//! The payload source is the only value the environment may override.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the payload source URI
pub const PAYLOAD_URL_ENV: &str = "WORKER_PAYLOAD_URL";

/// Canonical location of the latest worker payload
pub const DEFAULT_PAYLOAD_URL: &str =
    "https://raw.githubusercontent.com/serverless-workers/whisperx-worker/main/handler.py";

/// Where the resolved payload must end up before launch
pub const DEFAULT_LOCAL_SLOT: &str = "/app/handler.py";

/// Copy of the payload bundled into the image
pub const DEFAULT_FALLBACK_PATH: &str = "/app/handler_fallback.py";

/// Scratch space the payload writes transient media into
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp";

/// Remote retrieval is abandoned after this long
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Scratch files older than this are removed at startup
pub const DEFAULT_SCRATCH_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Interpreter the payload is handed to
pub const DEFAULT_LAUNCH_PROGRAM: &str = "python3";

/// Arguments placed before the slot path (unbuffered output)
pub const DEFAULT_LAUNCH_ARGS: &[&str] = &["-u"];

/// Resolved bootstrap settings
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Remote payload URI
    pub source_uri: String,
    /// Local payload slot
    pub local_slot: PathBuf,
    /// Bundled fallback payload
    pub fallback_path: PathBuf,
    /// Scratch directory swept at startup
    pub scratch_dir: PathBuf,
    /// Bound on the remote retrieval
    pub fetch_timeout: Duration,
    /// Age beyond which scratch files are evicted
    pub scratch_max_age: Duration,
    /// Interpreter program
    pub launch_program: String,
    /// Interpreter arguments preceding the slot path
    pub launch_args: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            source_uri: DEFAULT_PAYLOAD_URL.to_string(),
            local_slot: PathBuf::from(DEFAULT_LOCAL_SLOT),
            fallback_path: PathBuf::from(DEFAULT_FALLBACK_PATH),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            scratch_max_age: DEFAULT_SCRATCH_MAX_AGE,
            launch_program: DEFAULT_LAUNCH_PROGRAM.to_string(),
            launch_args: DEFAULT_LAUNCH_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BootstrapConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Blank values behave like unset ones
        if let Some(uri) = lookup(PAYLOAD_URL_ENV) {
            let uri = uri.trim();
            if !uri.is_empty() {
                config.source_uri = uri.to_string();
            }
        }

        config
    }

    /// Whether the source came from the environment rather than the default
    pub fn source_overridden(&self) -> bool {
        self.source_uri != DEFAULT_PAYLOAD_URL
    }
}
