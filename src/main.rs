//! worker-bootstrap - container entrypoint for a serverless GPU worker
//!
//! On every container start:
//! - prunes stale files from the scratch directory
//! - fetches the latest worker payload, falling back to the bundled copy
//! - replaces itself with the payload interpreter

mod config;
mod launcher;
mod logging;
mod payload;
mod scratch;
mod startup;

#[cfg(test)]
mod test_support;

use config::BootstrapConfig;
use launcher::ProcessLauncher;
use startup::exit_codes;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    if let Err(e) = logging::init(logging::LogSettings::from_env()) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    let config = BootstrapConfig::from_env();
    tracing::info!(
        "worker-bootstrap {} starting (payload source: {})",
        env!("CARGO_PKG_VERSION"),
        config.source_uri
    );

    startup::run(&config, &ProcessLauncher::new())
}
