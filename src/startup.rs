//! Startup sequence
//!
//! `Sweeping -> Resolving -> {Fatal | Launching}`. Strictly sequential; the
//! async runtime only lives for the fetch and is gone before the handoff.

use std::fmt;

use crate::config::BootstrapConfig;
use crate::launcher::{LaunchPlan, Launcher};
use crate::payload::{self, ResolveOutcome};
use crate::scratch;

/// Exit codes produced by the bootstrap itself
pub mod exit_codes {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    /// No runnable payload could be produced
    pub const NO_PAYLOAD: i32 = 2;
}

/// Startup phase, used to tag diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sweeping,
    Resolving,
    Launching,
    Fatal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Sweeping => "sweeping",
            Phase::Resolving => "resolving",
            Phase::Launching => "launching",
            Phase::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Sweep the scratch directory and resolve the payload slot
pub async fn prepare(config: &BootstrapConfig) -> ResolveOutcome {
    tracing::debug!(phase = %Phase::Sweeping, "Sweeping {}", config.scratch_dir.display());
    let report = scratch::sweep_scratch(&config.scratch_dir, config.scratch_max_age);
    if report.dir_present {
        tracing::info!(
            phase = %Phase::Sweeping,
            "Scratch sweep of {}: removed {}, kept {}, skipped {}",
            config.scratch_dir.display(),
            report.removed,
            report.retained,
            report.failed
        );
    } else {
        tracing::info!(
            phase = %Phase::Sweeping,
            "Scratch directory {} absent, nothing to sweep",
            config.scratch_dir.display()
        );
    }

    tracing::debug!(
        phase = %Phase::Resolving,
        overridden = config.source_overridden(),
        "Resolving payload from {}",
        config.source_uri
    );
    payload::resolve_payload(
        &config.source_uri,
        &config.local_slot,
        &config.fallback_path,
        config.fetch_timeout,
    )
    .await
}

/// Run the whole startup sequence and return the container exit code.
///
/// With a real launcher on Unix this only returns if the handoff failed.
pub fn run<L: Launcher>(config: &BootstrapConfig, launcher: &L) -> i32 {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let outcome = runtime.block_on(prepare(config));
    drop(runtime);

    if let ResolveOutcome::Fatal { fetch, fallback } = &outcome {
        tracing::error!(
            phase = %Phase::Fatal,
            "No runnable payload: remote failed ({}) and {}",
            fetch,
            fallback
        );
        return exit_codes::NO_PAYLOAD;
    }

    let plan = LaunchPlan::new(
        config.launch_program.as_str(),
        &config.launch_args,
        &config.local_slot,
    );
    tracing::info!(
        phase = %Phase::Launching,
        payload = %outcome,
        sha256 = outcome.installed().map(|i| i.sha256.as_str()).unwrap_or("-"),
        "Launching {} {} {}",
        plan.program,
        plan.args.join(" "),
        plan.slot.display()
    );

    match launcher.launch(&plan) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(phase = %Phase::Fatal, "{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::LaunchError;
    use crate::test_support::StubServer;
    use std::cell::RefCell;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::{tempdir, TempDir};

    /// Records launches instead of performing them
    struct RecordingLauncher {
        launched: RefCell<Vec<(LaunchPlan, Vec<u8>)>>,
        exit_code: Option<i32>,
    }

    impl RecordingLauncher {
        fn exiting_with(code: i32) -> Self {
            Self {
                launched: RefCell::new(Vec::new()),
                exit_code: Some(code),
            }
        }

        fn failing() -> Self {
            Self {
                launched: RefCell::new(Vec::new()),
                exit_code: None,
            }
        }

        fn calls(&self) -> usize {
            self.launched.borrow().len()
        }
    }

    impl Launcher for RecordingLauncher {
        fn launch(&self, plan: &LaunchPlan) -> Result<i32, LaunchError> {
            let contents = fs::read(&plan.slot).unwrap_or_default();
            self.launched.borrow_mut().push((plan.clone(), contents));
            self.exit_code
                .ok_or_else(|| LaunchError::BinaryNotFound(plan.program.clone()))
        }
    }

    fn config_in(dir: &TempDir, source_uri: String) -> BootstrapConfig {
        BootstrapConfig {
            source_uri,
            local_slot: dir.path().join("app").join("handler.py"),
            fallback_path: dir.path().join("app").join("handler_fallback.py"),
            scratch_dir: dir.path().join("tmp"),
            fetch_timeout: Duration::from_millis(300),
            ..BootstrapConfig::default()
        }
    }

    fn write_aged(path: &Path, age: Duration) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"media").unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_fetched_payload_is_launched() {
        let server = StubServer::respond(200, b"X");
        let dir = tempdir().unwrap();
        let config = config_in(&dir, server.url());
        fs::create_dir_all(dir.path().join("tmp")).unwrap();
        let launcher = RecordingLauncher::exiting_with(0);

        let code = run(&config, &launcher);

        assert_eq!(code, exit_codes::SUCCESS);
        assert_eq!(launcher.calls(), 1);
        let (plan, contents) = launcher.launched.borrow()[0].clone();
        assert_eq!(contents, b"X");
        assert_eq!(plan.slot, config.local_slot);
        assert_eq!(plan.program, "python3");
        assert_eq!(plan.args, vec!["-u"]);
    }

    #[test]
    fn test_timeout_launches_fallback() {
        let server = StubServer::hang();
        let dir = tempdir().unwrap();
        let config = config_in(&dir, server.url());
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(&config.fallback_path, b"Y").unwrap();
        let launcher = RecordingLauncher::exiting_with(0);

        let code = run(&config, &launcher);

        assert_eq!(code, exit_codes::SUCCESS);
        assert_eq!(launcher.launched.borrow()[0].1, b"Y");
    }

    #[test]
    fn test_server_error_without_fallback_never_launches() {
        let server = StubServer::respond(500, b"oops");
        let dir = tempdir().unwrap();
        let config = config_in(&dir, server.url());
        let launcher = RecordingLauncher::exiting_with(0);

        let code = run(&config, &launcher);

        assert_eq!(code, exit_codes::NO_PAYLOAD);
        assert_ne!(code, 0);
        assert_eq!(launcher.calls(), 0);
    }

    #[test]
    fn test_payload_exit_code_passes_through() {
        let server = StubServer::respond(200, b"X");
        let dir = tempdir().unwrap();
        let config = config_in(&dir, server.url());
        let launcher = RecordingLauncher::exiting_with(3);

        assert_eq!(run(&config, &launcher), 3);
    }

    #[test]
    fn test_launch_failure_exit_code() {
        let server = StubServer::respond(200, b"X");
        let dir = tempdir().unwrap();
        let config = config_in(&dir, server.url());
        let launcher = RecordingLauncher::failing();

        assert_eq!(run(&config, &launcher), crate::launcher::EXIT_NOT_FOUND);
    }

    #[test]
    fn test_sweep_runs_before_resolve() {
        let server = StubServer::respond(200, b"X");
        let dir = tempdir().unwrap();
        let config = config_in(&dir, server.url());
        let young = dir.path().join("tmp").join("young.mp3");
        let old = dir.path().join("tmp").join("job").join("old.mp3");
        write_aged(&young, Duration::from_secs(30 * 60));
        write_aged(&old, Duration::from_secs(90 * 60));
        let launcher = RecordingLauncher::exiting_with(0);

        run(&config, &launcher);

        assert!(young.exists());
        assert!(!old.exists());
        assert_eq!(launcher.calls(), 1);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Sweeping.to_string(), "sweeping");
        assert_eq!(Phase::Fatal.to_string(), "fatal");
    }
}
