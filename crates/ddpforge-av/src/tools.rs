//! External tool detection and management.
//!
//! The pipeline drives two opaque executables: the TrueHD decoder
//! (`truehdd`) and the Dolby Encoding Engine (`dee`). A tool is looked up
//! in an explicitly configured directory first; without one, the search
//! directory and then `PATH` are consulted.

use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// External tools the pipeline knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// TrueHD decoder, used for stream inspection and decoding.
    Decoder,
    /// Encoding engine consuming the XML job descriptors.
    Encoder,
}

impl Tool {
    /// Base executable name, without platform suffix.
    pub fn base_name(&self) -> &'static str {
        match self {
            Tool::Decoder => "truehdd",
            Tool::Encoder => "dee",
        }
    }

    /// Executable file name on this platform.
    pub fn executable_name(&self) -> String {
        format!("{}{}", self.base_name(), std::env::consts::EXE_SUFFIX)
    }

    /// Human-readable name used in log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            Tool::Decoder => "TrueHD Decoder",
            Tool::Encoder => "Dolby Encoding Engine",
        }
    }
}

/// A resolved tool: the executable and the directory it runs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLocation {
    pub tool: Tool,
    /// Absolute path to the executable.
    pub path: PathBuf,
    /// Working directory for invocations (the tool's installation dir).
    pub dir: PathBuf,
}

/// Availability information for a tool, returned by [`check_tool`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `--version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
    /// Why resolution failed, when it did.
    pub error: Option<String>,
}

/// Resolve a tool.
///
/// - With `configured_dir`, the executable must exist inside it; there is no
///   fallback, a missing file is [`Error::ToolNotInDir`].
/// - Otherwise `search_dir` is checked, then `PATH` via [`which::which`].
///
/// # Errors
///
/// Returns an error if the tool cannot be found.
pub fn resolve_tool(
    tool: Tool,
    configured_dir: Option<&Path>,
    search_dir: &Path,
) -> Result<ToolLocation> {
    let exe = tool.executable_name();

    if let Some(dir) = configured_dir {
        let dir = absolutize(dir);
        let path = dir.join(&exe);
        if !path.is_file() {
            return Err(Error::ToolNotInDir {
                tool: exe,
                dir,
            });
        }
        tracing::debug!("Using {} directory: {}", tool.display_name(), dir.display());
        return Ok(ToolLocation { tool, path, dir });
    }

    let local = absolutize(search_dir).join(&exe);
    let path = if local.is_file() {
        local
    } else {
        which::which(tool.base_name()).map_err(|_| Error::tool_not_found(&exe))?
    };

    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(ToolLocation { tool, path, dir })
}

/// Resolve a tool and report its availability instead of failing.
pub fn check_tool(tool: Tool, configured_dir: Option<&Path>, search_dir: &Path) -> ToolInfo {
    match resolve_tool(tool, configured_dir, search_dir) {
        Ok(location) => ToolInfo {
            name: tool.base_name().to_string(),
            available: true,
            version: detect_version(&location.path),
            path: Some(location.path),
            error: None,
        },
        Err(e) => ToolInfo {
            name: tool.base_name().to_string(),
            available: false,
            version: None,
            path: None,
            error: Some(e.to_string()),
        },
    }
}

/// Run `<tool> --version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn executable_names() {
        assert!(Tool::Decoder.executable_name().starts_with("truehdd"));
        assert!(Tool::Encoder.executable_name().starts_with("dee"));
    }

    #[test]
    fn configured_dir_without_executable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_tool(Tool::Encoder, Some(dir.path()), dir.path()).unwrap_err();
        assert!(matches!(err, Error::ToolNotInDir { .. }));
    }

    #[test]
    fn configured_dir_with_executable_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(Tool::Encoder.executable_name());
        fs::write(&exe, b"").unwrap();

        let location = resolve_tool(Tool::Encoder, Some(dir.path()), Path::new("/")).unwrap();
        assert_eq!(location.path, exe);
        assert_eq!(location.dir, dir.path());
    }

    #[test]
    fn search_dir_is_checked_before_path() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(Tool::Decoder.executable_name());
        fs::write(&exe, b"").unwrap();

        let location = resolve_tool(Tool::Decoder, None, dir.path()).unwrap();
        assert_eq!(location.path, exe);
        assert_eq!(location.dir, dir.path());
    }

    #[test]
    fn check_tool_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let info = check_tool(Tool::Encoder, Some(dir.path()), dir.path());
        assert!(!info.available);
        assert!(info.path.is_none());
        assert!(info.error.is_some());
    }
}
