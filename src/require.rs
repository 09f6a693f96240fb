use std::path::PathBuf;

use anyhow::{anyhow, Result};

/// Resolves every `Require`d program on `PATH`, failing on the first one that
/// is missing. Runs before any terminal or encoder is started.
pub fn check_requirements(programs: &[String]) -> Result<Vec<PathBuf>> {
    programs
        .iter()
        .map(|program| {
            which::which(program).map_err(|error| {
                anyhow!("required program '{program}' was not found on PATH: {error}")
            })
        })
        .collect()
}
