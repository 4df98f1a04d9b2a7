//! Save-file naming helpers
use std::path::Path;

use crate::{
    error::{ErrorCode, RuntimeError},
    recoverable_error,
};

/// Find the first `{base}-{nn}.{suffix}` filename that doesn't exist yet.
///
/// # Arguments
/// * `base` - Base filename
/// * `suffix` - Filename extension
///
/// # Returns
/// [Result] with the filename or a [RuntimeError]
pub fn first_available(base: &str, suffix: &str) -> Result<String, RuntimeError> {
    let mut n = 1;
    loop {
        let filename = format!("{}-{:02}.{}", base, n, suffix);
        match Path::new(&filename).try_exists() {
            Ok(b) => {
                if !b {
                    return Ok(filename);
                }
            }
            Err(e) => return recoverable_error!(ErrorCode::FileError, "{}", e),
        }

        n += 1;
    }
}

/// Find the most recent existing `{base}-{nn}.{suffix}` filename.
///
/// If no numbered file exists, `{base}.{suffix}` is returned.
///
/// # Arguments
/// * `base` - Base filename
/// * `suffix` - Filename extension
///
/// # Returns
/// [Result] with the filename or a [RuntimeError]
pub fn last_existing(base: &str, suffix: &str) -> Result<String, RuntimeError> {
    let mut n = 1;
    loop {
        let filename = format!("{}-{:02}.{}", base, n, suffix);
        match Path::new(&filename).try_exists() {
            Ok(b) => {
                if !b {
                    if n > 1 {
                        return Ok(format!("{}-{:02}.{}", base, n - 1, suffix));
                    } else {
                        return Ok(format!("{}.{}", base, suffix));
                    }
                }
            }
            Err(e) => return recoverable_error!(ErrorCode::FileError, "{}", e),
        }

        n += 1;
    }
}

fn check_config(name: &str) -> bool {
    match Path::new(name).try_exists() {
        Ok(b) => b,
        Err(e) => {
            info!(target: "app::state", "Error checking existence of {}: {}", name, e);
            false
        }
    }
}

/// Locate a configuration file.
///
/// Checks `~/.frobnitz/{name}` first, then the current working directory.
///
/// # Arguments
/// * `name` - Configuration file name
///
/// # Returns
/// [Option] with the path to the file, [None] if not found
pub fn config_file(name: &str) -> Option<String> {
    if let Some(home) = dirs::home_dir() {
        let filename = format!("{}/.frobnitz/{}", home.to_str().unwrap_or("."), name);
        if check_config(&filename) {
            return Some(filename);
        }
    }

    if check_config(name) {
        Some(name.to_string())
    } else {
        None
    }
}
