//! Sub-run planning from the stream classification.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::EncodeSettings;
use crate::analyzer::StreamClassification;
use crate::bitrate::BitrateRequest;
use crate::config::WarpMode;
use crate::profile::EncodeProfile;

/// One profile's decode-and-encode pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubRun {
    pub profile: EncodeProfile,
    /// Requested data rate, as given.
    #[serde(skip)]
    pub requested: BitrateRequest,
    /// Normalized data rate written into the descriptor.
    pub bitrate: u32,
    pub work_dir: PathBuf,
    /// Warp mode for object-audio decodes; `None` for PCM.
    #[serde(skip)]
    pub warp_mode: Option<WarpMode>,
    pub bed_conform: bool,
    pub final_path: PathBuf,
    /// Canonical name of the decoded input, once adopted.
    pub decoded: Option<String>,
    pub descriptor: Option<PathBuf>,
}

impl SubRun {
    fn new(
        profile: EncodeProfile,
        requested: &BitrateRequest,
        settings: &EncodeSettings,
        input_base: &str,
        bed_conform: bool,
    ) -> Self {
        let warp_mode = match profile {
            EncodeProfile::Ddp51 => None,
            _ => Some(settings.warp_mode),
        };
        Self {
            profile,
            requested: requested.clone(),
            bitrate: requested.normalize(profile.allowed_rates()),
            work_dir: settings.work_root.join(profile.work_dir_name()),
            warp_mode,
            bed_conform,
            final_path: settings.output_dir.join(profile.final_name(input_base)),
            decoded: None,
            descriptor: None,
        }
    }

    /// Descriptor path inside the working directory.
    pub fn descriptor_path(&self) -> PathBuf {
        self.work_dir.join(self.profile.descriptor_name())
    }
}

/// Plan the sub-runs for a classified input.
///
/// Absent or unknown Atmos gives a single DDP 5.1 run. Present Atmos gives
/// the 5.1 and/or 7.1 runs selected by `atmos_mode`, 5.1 first. The 7.1 run
/// never conforms the bed.
pub fn plan(
    classification: StreamClassification,
    settings: &EncodeSettings,
    input_base: &str,
) -> Vec<SubRun> {
    if !classification.is_present() {
        return vec![SubRun::new(
            EncodeProfile::Ddp51,
            &settings.ddp_bitrate,
            settings,
            input_base,
            false,
        )];
    }

    let mut runs = Vec::new();
    if settings.atmos_mode.includes_51() {
        runs.push(SubRun::new(
            EncodeProfile::Atmos51Online,
            &settings.atmos_51_bitrate,
            settings,
            input_base,
            settings.bed_conform,
        ));
    }
    if settings.atmos_mode.includes_71() {
        if settings.bed_conform {
            tracing::info!("7.1 selected: bed conform disabled to preserve the 7.1 bed");
        }
        runs.push(SubRun::new(
            EncodeProfile::Atmos71BluRay,
            &settings.atmos_71_bitrate,
            settings,
            input_base,
            false,
        ));
    }
    runs
}

/// File stem used for final artifact names.
pub fn input_base(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}
