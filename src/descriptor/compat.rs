//! Compatibility fix-ups for the engine's online (MP4) jobs.
//!
//! The engine rejects online Atmos jobs with a data rate above
//! [`ONLINE_RATE_CEILING`] or carrying Blu-ray backend overrides. The fix-up
//! is applied to the in-memory tree by the builder; [`sanitize_descriptor_file`]
//! applies the same transformation to a descriptor already on disk.

use std::path::Path;

use crate::profile::ONLINE_RATE_CEILING;

use super::{xml, Element};

/// Elements that must not appear in an online job.
const STRIPPED: &[&str] = &["encoding_backend", "encoder_mode"];

/// Result of sanitizing a descriptor file. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeOutcome {
    /// The file was rewritten.
    Rewritten,
    /// The file already satisfied the constraints.
    Unchanged,
    /// The file was left untouched because of an anomaly.
    Skipped(String),
}

/// Clamp every `data_rate` above the ceiling and strip backend overrides.
///
/// Returns whether anything changed. Non-numeric rates are left alone.
pub fn apply_online_compat(root: &mut Element) -> bool {
    let mut changed = false;
    root.walk_mut(&mut |node| {
        let before = node.children.len();
        node.children.retain(|c| !STRIPPED.contains(&c.name.as_str()));
        changed |= node.children.len() != before;

        if node.name == "data_rate" {
            if let Some(rate) = node.text.as_deref().and_then(|t| t.trim().parse::<u32>().ok()) {
                if rate > ONLINE_RATE_CEILING {
                    node.text = Some(ONLINE_RATE_CEILING.to_string());
                    changed = true;
                }
            }
        }
    });
    changed
}

/// Apply [`apply_online_compat`] to the descriptor at `path`, best effort.
///
/// Read, parse and write failures, and a `data_rate` that is not an integer,
/// are logged as warnings and leave the file as it was.
pub fn sanitize_descriptor_file(path: &Path) -> SanitizeOutcome {
    let outcome = sanitize(path);
    if let SanitizeOutcome::Skipped(ref reason) = outcome {
        tracing::warn!("Descriptor sanitize skipped for {}: {}", path.display(), reason);
    }
    outcome
}

fn sanitize(path: &Path) -> SanitizeOutcome {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => return SanitizeOutcome::Skipped(e.to_string()),
    };
    let mut root = match xml::parse(&text) {
        Ok(root) => root,
        Err(e) => return SanitizeOutcome::Skipped(e.to_string()),
    };

    let mut malformed = None;
    root.walk_mut(&mut |node| {
        if node.name == "data_rate" && malformed.is_none() {
            let text = node.text.as_deref().unwrap_or_default().trim();
            if text.parse::<u32>().is_err() {
                malformed = Some(format!("data_rate is not an integer: {text:?}"));
            }
        }
    });
    if let Some(reason) = malformed {
        return SanitizeOutcome::Skipped(reason);
    }

    if !apply_online_compat(&mut root) {
        return SanitizeOutcome::Unchanged;
    }

    let rendered = match xml::to_string(&root) {
        Ok(rendered) => rendered,
        Err(e) => return SanitizeOutcome::Skipped(e.to_string()),
    };
    match std::fs::write(path, rendered) {
        Ok(()) => {
            tracing::debug!("Descriptor sanitized: {}", path.display());
            SanitizeOutcome::Rewritten
        }
        Err(e) => SanitizeOutcome::Skipped(e.to_string()),
    }
}
