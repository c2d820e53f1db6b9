//! Environment for the external program
//!
//! The child sees the base environment plus one variable naming the staging
//! directory (`<PREFIX>_DIR`) and one per staged file
//! (`<PREFIX>_FILE_<name>`), each holding an absolute path.

use crate::error::{Error, Result};
use crate::staging::StagingArea;
use std::ffi::OsString;

/// Name of the variable pointing at the staging directory
pub fn dir_var(prefix: &str) -> String {
    format!("{prefix}_DIR")
}

/// Name of the variable pointing at a staged file
pub fn file_var(prefix: &str, name: &str) -> String {
    format!("{prefix}_FILE_{name}")
}

/// Build the full child environment for an open staging area
pub fn build(
    base: &[(OsString, OsString)],
    prefix: &str,
    area: &StagingArea,
) -> Result<Vec<(OsString, OsString)>> {
    let dir = area.path().ok_or(Error::NotStaged)?;

    let mut env = Vec::with_capacity(base.len() + area.files().len() + 1);
    env.extend_from_slice(base);
    env.push((dir_var(prefix).into(), dir.as_os_str().to_owned()));
    for file in area.files() {
        let path = dir.join(file.name);
        log::trace!("{} -> {}", file_var(prefix, file.name), path.display());
        env.push((file_var(prefix, file.name).into(), path.into_os_string()));
    }
    Ok(env)
}
