//! Payload launcher
//!
//! Hands the container's foreground process over to the payload interpreter.
//! On Unix the bootstrap's process image is replaced; elsewhere the payload is
//! run as a child and its exit code passed through untouched.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Exit code when the interpreter cannot be found
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code when the interpreter exists but could not be started
pub const EXIT_CANNOT_EXECUTE: i32 = 126;

/// What to run: `program args... slot`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub slot: PathBuf,
}

impl LaunchPlan {
    pub fn new(program: impl Into<String>, args: &[String], slot: &Path) -> Self {
        Self {
            program: program.into(),
            args: args.to_vec(),
            slot: slot.to_path_buf(),
        }
    }
}

/// Launch errors
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Binary '{0}' not found. Install it or add to PATH.")]
    BinaryNotFound(String),

    #[error("Failed to launch payload: {0}")]
    LaunchFailed(#[from] std::io::Error),
}

impl LaunchError {
    /// Container exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::BinaryNotFound(_) => EXIT_NOT_FOUND,
            LaunchError::LaunchFailed(e) if e.kind() == std::io::ErrorKind::NotFound => {
                EXIT_NOT_FOUND
            }
            LaunchError::LaunchFailed(_) => EXIT_CANNOT_EXECUTE,
        }
    }
}

/// Transfers control to the payload.
///
/// A successful launch on Unix never returns. `Ok` carries the payload's exit
/// code where the platform requires waiting on a child.
pub trait Launcher {
    fn launch(&self, plan: &LaunchPlan) -> Result<i32, LaunchError>;
}

/// Runs the payload as the container's foreground process
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Find the program, as a literal path or in PATH
    pub fn resolve_program(program: &str) -> Result<PathBuf, LaunchError> {
        if Path::new(program).exists() {
            return Ok(PathBuf::from(program));
        }
        which::which(program).map_err(|_| LaunchError::BinaryNotFound(program.to_string()))
    }

    fn command(plan: &LaunchPlan) -> Result<Command, LaunchError> {
        let program = Self::resolve_program(&plan.program)?;

        let mut cmd = Command::new(program);
        cmd.args(&plan.args)
            .arg(&plan.slot)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        Ok(cmd)
    }
}

impl Launcher for ProcessLauncher {
    #[cfg(unix)]
    fn launch(&self, plan: &LaunchPlan) -> Result<i32, LaunchError> {
        use std::os::unix::process::CommandExt;

        let mut cmd = Self::command(plan)?;
        // Only returns if the exec itself failed
        Err(LaunchError::LaunchFailed(cmd.exec()))
    }

    #[cfg(not(unix))]
    fn launch(&self, plan: &LaunchPlan) -> Result<i32, LaunchError> {
        let status = Self::command(plan)?.status()?;
        Ok(status.code().unwrap_or(1))
    }
}
