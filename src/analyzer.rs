//! Input stream classification via the decoder's `info` mode.

use std::fmt;
use std::path::Path;

use ddpforge_av::{ToolCommand, ToolLocation};
use serde::Serialize;

/// Text identifying the object-audio line in `info` output.
pub const ATMOS_MARKER: &str = "Dolby Atmos";

/// Whether the input carries an object-audio bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamClassification {
    Present,
    Absent,
    Unknown,
}

impl StreamClassification {
    pub fn is_present(&self) -> bool {
        matches!(self, StreamClassification::Present)
    }
}

impl fmt::Display for StreamClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamClassification::Present => write!(f, "Dolby Atmos detected"),
            StreamClassification::Absent => write!(f, "Dolby Atmos not present"),
            StreamClassification::Unknown => write!(f, "Atmos information unavailable"),
        }
    }
}

/// Classify `info` output.
///
/// The first line containing [`ATMOS_MARKER`] decides: its last
/// whitespace-delimited token, lower-cased, `true` or `false`. No such line,
/// or any other token, is [`StreamClassification::Unknown`].
pub fn classify(output: &str) -> StreamClassification {
    let token = output
        .lines()
        .find(|line| line.contains(ATMOS_MARKER))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_lowercase);

    match token.as_deref() {
        Some("true") => StreamClassification::Present,
        Some("false") => StreamClassification::Absent,
        _ => StreamClassification::Unknown,
    }
}

/// Run `<decoder> info <input>` and classify its standard output.
///
/// # Errors
///
/// Returns [`ddpforge_av::Error::ToolFailed`] carrying the captured output
/// when the decoder exits non-zero.
pub async fn analyze(
    decoder: &ToolLocation,
    input: &Path,
) -> ddpforge_av::Result<StreamClassification> {
    tracing::info!("Analyzing stream: {}", input.display());

    let output = ToolCommand::new(&decoder.path)
        .arg("info")
        .arg(input)
        .current_dir(&decoder.dir)
        .execute()
        .await?;

    for line in output.stdout.lines() {
        tracing::debug!("{}", line);
    }

    let classification = classify(&output.stdout);
    tracing::info!("{}", classification);
    Ok(classification)
}
