//! Working-directory lifecycle for one encode profile.
//!
//! A [`JobWorkspace`] owns a single directory under the run's working root.
//! Every file operation it performs stays inside that directory, except
//! [`JobWorkspace::finalize`] which moves the encoder's temporary output to
//! the final destination.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Object-audio mezzanine suffixes produced by the decoder.
pub const MEZZANINE_SUFFIXES: &[&str] = &[".atmos", ".atmos.audio", ".atmos.metadata"];

/// PCM suffixes produced by the decoder in `w64` mode.
pub const PCM_SUFFIXES: &[&str] = &[".w64", ".wav"];

/// Outcome of a best-effort cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files that were removed.
    pub removed: Vec<PathBuf>,
    /// Files that could not be removed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    /// Whether every matching file was removed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A per-profile working directory.
///
/// # Example
///
/// ```no_run
/// use ddpforge_av::JobWorkspace;
///
/// let ws = JobWorkspace::create("/work/ddp_encode_pcm")?;
/// let decoded = ws.adopt_pcm("ddp_encode")?;
/// // ... build the descriptor, run the encoder ...
/// ws.finalize("ddp_encode_5_1.ec3", "/out/movie_5_1.ec3".as_ref())?;
/// ws.cleanup(&[".xml", ".w64", ".wav"]);
/// # Ok::<(), ddpforge_av::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    dir: PathBuf,
}

impl JobWorkspace {
    /// Create the directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::Workspace(format!("failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// The working directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory name, used as the base for canonical mezzanine names.
    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "ddp_encode".to_string())
    }

    /// Path of a file inside the working directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Rename a freshly decoded mezzanine set to `<base>.atmos`,
    /// `<base>.atmos.audio` and `<base>.atmos.metadata`.
    ///
    /// Returns the name of the `.atmos` entry point.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be listed, a rename fails, or no
    /// `.atmos` file was produced.
    pub fn adopt_mezzanine(&self, base: &str) -> Result<String> {
        let entry_point = format!("{base}.atmos");

        for name in self.list()? {
            let lower = name.to_lowercase();
            if let Some(suffix) = MEZZANINE_SUFFIXES.iter().find(|s| lower.ends_with(**s)) {
                self.rename_within(&name, &format!("{base}{suffix}"))?;
            }
        }

        if !self.file(&entry_point).is_file() {
            return Err(self.missing_artifact("object-audio mezzanine (.atmos)"));
        }

        Ok(entry_point)
    }

    /// Rename the first decoded `.w64`/`.wav` file to `<base>.<ext>`,
    /// keeping its extension. Returns the new file name.
    ///
    /// Files already carrying a canonical `<base>.<ext>` name are left over
    /// from an earlier run and only count when nothing else was decoded.
    ///
    /// # Errors
    ///
    /// Fails with a listing of the directory when no PCM file exists.
    pub fn adopt_pcm(&self, base: &str) -> Result<String> {
        let mut names = self.list()?;
        names.sort();

        let canonical: Vec<String> = PCM_SUFFIXES.iter().map(|s| format!("{base}{s}")).collect();
        let candidates: Vec<(String, &str)> = names
            .into_iter()
            .filter_map(|name| {
                let lower = name.to_lowercase();
                PCM_SUFFIXES
                    .iter()
                    .find(|s| lower.ends_with(**s))
                    .map(|suffix| (name, *suffix))
            })
            .collect();

        let found = candidates
            .iter()
            .find(|(name, _)| !canonical.contains(name))
            .or_else(|| candidates.first());

        let Some((name, suffix)) = found else {
            return Err(self.missing_artifact("decoded PCM (.w64 or .wav)"));
        };

        let dest = format!("{base}{suffix}");
        self.rename_within(name, &dest)?;
        for stale in canonical.iter().filter(|c| **c != dest) {
            let path = self.file(stale);
            if path.is_file() {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed stale {}", stale);
            }
        }
        Ok(dest)
    }

    /// Replace `destination` with the encoder's temporary output.
    ///
    /// Rename is attempted first. Across filesystems the file is copied to a
    /// sibling of `destination`, renamed over it, and the temporary removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary output does not exist or cannot be
    /// moved.
    pub fn finalize(&self, temp_name: &str, destination: &Path) -> Result<PathBuf> {
        let output = self.file(temp_name);

        if !output.is_file() {
            return Err(Error::Workspace(format!(
                "output file does not exist: {}",
                output.display()
            )));
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Workspace(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        if let Err(rename_err) = std::fs::rename(&output, destination) {
            tracing::debug!(
                "rename {} -> {} failed ({rename_err}); copying",
                output.display(),
                destination.display()
            );
            copy_replace(&output, destination)?;
            if let Err(e) = std::fs::remove_file(&output) {
                tracing::warn!("Could not remove {}: {}", output.display(), e);
            }
        }

        Ok(destination.to_path_buf())
    }

    /// Remove intermediate files whose names end with any of `suffixes`.
    ///
    /// Never fails; problems are logged and collected in the report. A
    /// matching entry that is not a file (a directory, say) is reported as
    /// failed and left alone.
    /// Running it again on the same directory is a no-op.
    pub fn cleanup(&self, suffixes: &[&str]) -> CleanupReport {
        let mut report = CleanupReport::default();

        let names = match self.entry_names() {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Cleanup skipped for {}: {}", self.dir.display(), e);
                report.failed.push((self.dir.clone(), e.to_string()));
                return report;
            }
        };

        for name in names {
            let lower = name.to_lowercase();
            if !suffixes.iter().any(|s| lower.ends_with(&s.to_lowercase())) {
                continue;
            }
            let path = self.file(&name);
            match std::fs::remove_file(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) => {
                    tracing::warn!("Could not remove {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        report
    }

    /// Regular file names directly inside the working directory.
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(names)
    }

    /// Every entry name, including ones that are not regular files.
    fn entry_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            names.push(entry?.file_name().to_string_lossy().to_string());
        }
        Ok(names)
    }

    /// Rename inside the working directory, replacing any existing target.
    fn rename_within(&self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let src = self.file(from);
        let dest = self.file(to);
        if dest.exists() {
            std::fs::remove_file(&dest)?;
        }
        std::fs::rename(&src, &dest).map_err(|e| {
            Error::Workspace(format!(
                "failed to rename {} to {}: {e}",
                src.display(),
                dest.display()
            ))
        })?;
        tracing::debug!("Renamed {} -> {}", from, to);
        Ok(())
    }

    fn missing_artifact(&self, what: &str) -> Error {
        let mut listing = self.list().unwrap_or_default();
        listing.sort();
        let listing = if listing.is_empty() {
            "(empty)".to_string()
        } else {
            listing.join(", ")
        };
        Error::Workspace(format!(
            "no {what} found in {}; directory contains: {listing}",
            self.dir.display()
        ))
    }
}

/// Copy `src` next to `destination`, then rename the copy over it. A reader
/// of `destination` sees either the old file or the complete new one.
fn copy_replace(src: &Path, destination: &Path) -> Result<()> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let copy_err = |e: std::io::Error| {
        Error::Workspace(format!("failed to copy output to destination: {e}"))
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".ddpforge-")
        .tempfile_in(parent)
        .map_err(copy_err)?;
    let mut reader = std::fs::File::open(src).map_err(copy_err)?;
    std::io::copy(&mut reader, staged.as_file_mut()).map_err(copy_err)?;
    staged.as_file().sync_all().map_err(copy_err)?;
    staged
        .persist(destination)
        .map_err(|e| copy_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace() -> (tempfile::TempDir, JobWorkspace) {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path().join("ddp_encode_5_1")).unwrap();
        (root, ws)
    }

    #[test]
    fn create_makes_directory() {
        let (_root, ws) = workspace();
        assert!(ws.dir().is_dir());
        assert_eq!(ws.name(), "ddp_encode_5_1");
    }

    #[test]
    fn adopt_mezzanine_renames_all_parts() {
        let (_root, ws) = workspace();
        fs::write(ws.file("Movie.atmos"), b"meta").unwrap();
        fs::write(ws.file("Movie.atmos.audio"), b"audio").unwrap();
        fs::write(ws.file("Movie.atmos.metadata"), b"md").unwrap();

        let entry = ws.adopt_mezzanine("ddp_encode_5_1").unwrap();
        assert_eq!(entry, "ddp_encode_5_1.atmos");
        assert_eq!(fs::read(ws.file("ddp_encode_5_1.atmos")).unwrap(), b"meta");
        assert_eq!(fs::read(ws.file("ddp_encode_5_1.atmos.audio")).unwrap(), b"audio");
        assert_eq!(fs::read(ws.file("ddp_encode_5_1.atmos.metadata")).unwrap(), b"md");
        assert!(!ws.file("Movie.atmos").exists());
    }

    #[test]
    fn adopt_mezzanine_overwrites_stale_target() {
        let (_root, ws) = workspace();
        fs::write(ws.file("ddp_encode_5_1.atmos"), b"stale").unwrap();
        fs::write(ws.file("New.atmos"), b"fresh").unwrap();

        ws.adopt_mezzanine("ddp_encode_5_1").unwrap();
        assert_eq!(fs::read(ws.file("ddp_encode_5_1.atmos")).unwrap(), b"fresh");
    }

    #[test]
    fn adopt_mezzanine_without_output_fails() {
        let (_root, ws) = workspace();
        let err = ws.adopt_mezzanine("ddp_encode_5_1").unwrap_err();
        assert!(err.to_string().contains("(empty)"));
    }

    #[test]
    fn adopt_pcm_keeps_extension() {
        let (_root, ws) = workspace();
        fs::write(ws.file("Movie.W64"), b"pcm").unwrap();

        let name = ws.adopt_pcm("ddp_encode").unwrap();
        assert_eq!(name, "ddp_encode.w64");
        assert!(ws.file("ddp_encode.w64").is_file());
    }

    #[test]
    fn adopt_pcm_prefers_fresh_decode_over_stale_canonical() {
        let (_root, ws) = workspace();
        fs::write(ws.file("ddp_encode.w64"), b"stale").unwrap();
        fs::write(ws.file("ddp_encode.wav"), b"older").unwrap();
        fs::write(ws.file("movie.w64"), b"fresh").unwrap();

        let name = ws.adopt_pcm("ddp_encode").unwrap();
        assert_eq!(name, "ddp_encode.w64");
        assert_eq!(fs::read(ws.file("ddp_encode.w64")).unwrap(), b"fresh");
        assert_eq!(ws.list().unwrap(), vec!["ddp_encode.w64".to_string()]);
    }

    #[test]
    fn adopt_pcm_accepts_decoder_writing_canonical_name() {
        let (_root, ws) = workspace();
        fs::write(ws.file("ddp_encode.wav"), b"pcm").unwrap();

        assert_eq!(ws.adopt_pcm("ddp_encode").unwrap(), "ddp_encode.wav");
        assert_eq!(fs::read(ws.file("ddp_encode.wav")).unwrap(), b"pcm");
    }

    #[test]
    fn adopt_pcm_lists_directory_when_missing() {
        let (_root, ws) = workspace();
        fs::write(ws.file("Movie.log"), b"").unwrap();
        let err = ws.adopt_pcm("ddp_encode").unwrap_err();
        assert!(err.to_string().contains("Movie.log"));
    }

    #[test]
    fn finalize_replaces_destination() {
        let (root, ws) = workspace();
        fs::write(ws.file("ddp_encode_5_1.ec3"), b"new").unwrap();
        let dest = root.path().join("out").join("movie_5_1.ec3");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"old").unwrap();

        let final_path = ws.finalize("ddp_encode_5_1.ec3", &dest).unwrap();
        assert_eq!(final_path, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!ws.file("ddp_encode_5_1.ec3").exists());
    }

    #[test]
    fn copy_replace_swaps_in_complete_file() {
        let (root, ws) = workspace();
        fs::write(ws.file("ddp_encode_5_1.ec3"), b"new contents").unwrap();
        let out = root.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let dest = out.join("movie_5_1.ec3");
        fs::write(&dest, b"old").unwrap();

        copy_replace(&ws.file("ddp_encode_5_1.ec3"), &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new contents");
        // Source untouched, no staging file left beside the destination
        assert!(ws.file("ddp_encode_5_1.ec3").is_file());
        let names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["movie_5_1.ec3".to_string()]);
    }

    #[test]
    fn copy_replace_missing_source_leaves_destination() {
        let (root, ws) = workspace();
        let dest = root.path().join("movie_5_1.ec3");
        fs::write(&dest, b"old").unwrap();

        let result = copy_replace(&ws.file("absent.ec3"), &dest);
        assert!(matches!(result, Err(Error::Workspace(_))));
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn finalize_fails_when_output_missing() {
        let (root, ws) = workspace();
        let result = ws.finalize("ddp_encode_5_1.ec3", &root.path().join("x.ec3"));
        assert!(matches!(result, Err(Error::Workspace(_))));
    }

    #[test]
    fn cleanup_removes_only_matching_and_is_idempotent() {
        let (_root, ws) = workspace();
        for name in ["job.xml", "a.atmos", "a.atmos.audio", "a.atmos.metadata", "keep.mp4"] {
            fs::write(ws.file(name), b"").unwrap();
        }
        let suffixes = [".xml", ".atmos", ".metadata", ".audio"];

        let first = ws.cleanup(&suffixes);
        assert!(first.is_clean());
        assert_eq!(first.removed.len(), 4);

        let after_first: Vec<String> = ws.list().unwrap();
        let second = ws.cleanup(&suffixes);
        assert!(second.is_clean());
        assert!(second.removed.is_empty());
        assert_eq!(ws.list().unwrap(), after_first);
        assert_eq!(after_first, vec!["keep.mp4".to_string()]);
    }

    #[test]
    fn cleanup_reports_entries_it_cannot_remove() {
        let (_root, ws) = workspace();
        fs::write(ws.file("job.xml"), b"").unwrap();
        fs::create_dir(ws.file("notes.xml")).unwrap();

        let report = ws.cleanup(&[".xml"]);
        assert!(!report.is_clean());
        assert_eq!(report.removed, vec![ws.file("job.xml")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ws.file("notes.xml"));
        assert!(ws.file("notes.xml").is_dir());
    }
}
