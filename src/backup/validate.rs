//! Validation functions for configuration values.
//!
//! Custom `validator` functions for the restic binary, the exclusion file
//! and the folders handed over on the command line.

use validator::ValidationError;

use std::path::Path;

pub fn validate_file_exist<P: AsRef<Path>>(path: P) -> Result<(), ValidationError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Ok(());
    }

    if !path.exists() {
        return Err(ValidationError::new("FileNotFound")
            .with_message(format!("{:?} not found", path).into()));
    }
    if !path.is_file() {
        return Err(ValidationError::new("InvalidFile")
            .with_message(format!("{:?} is not a file", path).into()));
    }

    Ok(())
}

/// Empty paths are left to the required-field check.
pub fn validate_executable_file<P: AsRef<Path>>(path: P) -> Result<(), ValidationError> {
    let path = path.as_ref();
    validate_file_exist(path)?;
    if path.as_os_str().is_empty() || is_executable(path) {
        Ok(())
    } else {
        Err(ValidationError::new("NotExecutable")
            .with_message(format!("{:?} is not executable", path).into()))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|md| md.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub fn validate_paths_exist<P: AsRef<Path>>(paths: &[P]) -> Result<(), ValidationError> {
    let missing: Vec<_> = paths
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.exists())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("PathNotFound")
            .with_message(format!("paths not found: {:?}", missing).into()))
    }
}
