//! Stand-in for the schema validator the encoding engine shells out to.
//!
//! Blu-ray descriptors carry fields the engine's bundled schema rejects.
//! The engine resolves `xmllint` through `PATH`, so a scratch directory
//! holding a no-op `xmllint` is prepended to the child's search path. The
//! directory lives exactly as long as the [`ValidatorShim`] value.

use crate::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the validator executable the engine looks up.
#[cfg(not(windows))]
const SHIM_FILE: &str = "xmllint";
#[cfg(windows)]
const SHIM_FILE: &str = "xmllint.bat";

#[cfg(not(windows))]
const SHIM_BODY: &str = "#!/bin/sh\nexit 0\n";
#[cfg(windows)]
const SHIM_BODY: &str = "@echo off\r\nexit /b 0\r\n";

/// Prefix of the scratch directory name.
pub const SHIM_DIR_PREFIX: &str = "ddpforge-validator-";

/// A scratch directory holding a no-op validator. Removed on drop.
#[derive(Debug)]
pub struct ValidatorShim {
    dir: TempDir,
}

impl ValidatorShim {
    /// Create the scratch directory and the stand-in executable.
    pub fn install() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SHIM_DIR_PREFIX)
            .tempdir()
            .map_err(|e| Error::Workspace(format!("failed to create validator shim dir: {e}")))?;

        let shim = dir.path().join(SHIM_FILE);
        std::fs::write(&shim, SHIM_BODY)?;
        make_executable(&shim)?;

        tracing::debug!("Installed validator shim at {}", shim.display());
        Ok(Self { dir })
    }

    /// Directory containing the stand-in.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Full path of the stand-in executable.
    pub fn executable(&self) -> PathBuf {
        self.dir.path().join(SHIM_FILE)
    }

    /// Build a search path with the shim directory in front of `current`.
    pub fn search_path(&self, current: Option<OsString>) -> Result<OsString> {
        let mut entries = vec![self.dir.path().to_path_buf()];
        if let Some(current) = current {
            entries.extend(std::env::split_paths(&current));
        }
        std::env::join_paths(entries)
            .map_err(|e| Error::InvalidInput(format!("cannot build search path: {e}")))
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
