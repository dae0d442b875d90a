//! Catalog version stamping.

use crate::config::CompilerConfig;
use crate::error::{EvalError, EvalResult};
use std::process::Command;
use tracing::debug;
use trellis_catalog::CatalogVersion;
use trellis_core::Clock;

/// Version for a freshly compiled catalog
///
/// With a version command configured, runs it through `sh -c` and uses
/// its trimmed stdout. Otherwise uses the clock's Unix seconds.
///
/// # Errors
///
/// Returns error if the command cannot be started or exits non-zero
pub fn catalog_version(config: &CompilerConfig, clock: &dyn Clock) -> EvalResult<CatalogVersion> {
    match config.version_command() {
        Some(command) => run_version_command(command).map(CatalogVersion::Command),
        None => Ok(CatalogVersion::Timestamp(clock.now().seconds)),
    }
}

/// Keep timestamp versions moving forward
///
/// A timestamp no newer than the `previous` catalog's becomes one past it,
/// so a recompile within the same clock second still gets a new version.
/// Command versions are returned unchanged.
#[must_use]
pub fn advance_version(version: CatalogVersion, previous: Option<&CatalogVersion>) -> CatalogVersion {
    match (version, previous) {
        (CatalogVersion::Timestamp(now), Some(CatalogVersion::Timestamp(last))) if now <= *last => {
            CatalogVersion::Timestamp(last + 1)
        }
        (version, _) => version,
    }
}

fn run_version_command(command: &str) -> EvalResult<String> {
    let failed = |reason: String| EvalError::VersionCommand {
        command: command.to_string(),
        reason,
    };

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|err| failed(err.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{}: {}", output.status, stderr.trim())));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(command, %version, "Ran version command");
    Ok(version)
}
