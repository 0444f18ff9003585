//! Encode profile catalog.
//!
//! Every per-profile constant lives here so the pipeline and the descriptor
//! builder can stay generic over [`EncodeProfile`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed data rates for non-Atmos DD+ 5.1 (kbps).
pub const DDP_51_RATES: &[u32] = &[192, 256, 320, 448, 576, 640, 768, 1024];
/// Allowed data rates for Atmos 5.1 in MP4 (kbps).
pub const ATMOS_51_RATES: &[u32] = &[384, 448, 576, 640, 768, 1024];
/// Allowed data rates for Atmos 7.1 Blu-ray (kbps).
pub const ATMOS_71_RATES: &[u32] = &[1152, 1280, 1408, 1512, 1536, 1664];

/// Ceiling the engine accepts for online MP4 jobs.
pub const ONLINE_RATE_CEILING: u32 = 1024;

/// Cleanup suffixes for a PCM working directory.
pub const PCM_CLEANUP: &[&str] = &[".xml", ".w64", ".wav"];
/// Cleanup suffixes for an object-audio working directory.
pub const MEZZANINE_CLEANUP: &[&str] = &[".xml", ".atmos", ".metadata", ".audio"];

/// Final artifacts are collected here, under the work root.
pub const FINAL_OUTPUT_DIR: &str = "ddp_encode";

/// Base name the PCM decode is adopted under.
pub const PCM_BASE_NAME: &str = "ddp_encode";

/// Target encode profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeProfile {
    /// Channel-based DD+ 5.1 from a PCM decode.
    Ddp51,
    /// Atmos 5.1 in an MP4 container for streaming delivery.
    Atmos51Online,
    /// Atmos 7.1 elementary stream for Blu-ray authoring.
    Atmos71BluRay,
}

/// How the decoder is asked to render the input for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTarget {
    /// Wave64 PCM.
    Pcm,
    /// Object-audio mezzanine set.
    Mezzanine,
}

/// Timing fields written into the descriptor's encode block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub frame_rate: &'static str,
    pub start: &'static str,
    pub time_base: &'static str,
    pub silence: &'static str,
}

impl EncodeProfile {
    pub const ALL: [EncodeProfile; 3] = [
        EncodeProfile::Ddp51,
        EncodeProfile::Atmos51Online,
        EncodeProfile::Atmos71BluRay,
    ];

    /// Allowed data rates, ascending.
    pub fn allowed_rates(&self) -> &'static [u32] {
        match self {
            EncodeProfile::Ddp51 => DDP_51_RATES,
            EncodeProfile::Atmos51Online => ATMOS_51_RATES,
            EncodeProfile::Atmos71BluRay => ATMOS_71_RATES,
        }
    }

    pub fn default_rate(&self) -> u32 {
        match self {
            EncodeProfile::Ddp51 => 640,
            EncodeProfile::Atmos51Online => 768,
            EncodeProfile::Atmos71BluRay => 1536,
        }
    }

    /// File extension of the encoded output.
    pub fn extension(&self) -> &'static str {
        match self {
            EncodeProfile::Ddp51 => "ec3",
            EncodeProfile::Atmos51Online => "mp4",
            EncodeProfile::Atmos71BluRay => "eb3",
        }
    }

    /// Output block element in the descriptor.
    pub fn container(&self) -> &'static str {
        match self {
            EncodeProfile::Ddp51 | EncodeProfile::Atmos71BluRay => "ec3",
            EncodeProfile::Atmos51Online => "mp4",
        }
    }

    /// Suffix appended to the input base name for the final artifact.
    pub fn suffix(&self) -> &'static str {
        match self {
            EncodeProfile::Ddp51 => "5_1",
            EncodeProfile::Atmos51Online => "atmos_5_1",
            EncodeProfile::Atmos71BluRay => "atmos_7_1",
        }
    }

    /// Working directory name under the work root.
    pub fn work_dir_name(&self) -> &'static str {
        match self {
            EncodeProfile::Ddp51 => "ddp_encode_pcm",
            EncodeProfile::Atmos51Online => "ddp_encode_5_1",
            EncodeProfile::Atmos71BluRay => "ddp_encode_7_1",
        }
    }

    pub fn descriptor_name(&self) -> String {
        format!("ddp_encode_{}.xml", self.suffix())
    }

    /// Name the engine writes its output under, inside the working directory.
    pub fn temp_output_name(&self) -> String {
        format!("ddp_encode_{}.{}", self.suffix(), self.extension())
    }

    /// `<base>_<suffix>.<ext>`
    pub fn final_name(&self, input_base: &str) -> String {
        format!("{}_{}.{}", input_base, self.suffix(), self.extension())
    }

    pub fn decode_target(&self) -> DecodeTarget {
        match self {
            EncodeProfile::Ddp51 => DecodeTarget::Pcm,
            _ => DecodeTarget::Mezzanine,
        }
    }

    pub fn cleanup_suffixes(&self) -> &'static [&'static str] {
        match self.decode_target() {
            DecodeTarget::Pcm => PCM_CLEANUP,
            DecodeTarget::Mezzanine => MEZZANINE_CLEANUP,
        }
    }

    pub fn timing(&self) -> Timing {
        match self {
            EncodeProfile::Ddp51 => Timing {
                frame_rate: "not_indicated",
                start: "0:00:00.005333",
                time_base: "file_position",
                silence: "0.0",
            },
            EncodeProfile::Atmos51Online => Timing {
                frame_rate: "23.976",
                start: "first_frame_of_action",
                time_base: "file_position",
                silence: "0.0",
            },
            EncodeProfile::Atmos71BluRay => Timing {
                frame_rate: "23.976",
                start: "00:00:00:00",
                time_base: "embedded_timecode",
                silence: "0f",
            },
        }
    }

    /// Whether the descriptor carries `custom_trims`.
    pub fn custom_trims(&self) -> bool {
        matches!(self, EncodeProfile::Atmos71BluRay)
    }

    /// Whether the descriptor carries `encoding_backend`/`encoder_mode`.
    pub fn backend_override(&self) -> bool {
        matches!(self, EncodeProfile::Atmos71BluRay)
    }

    /// Whether the online compatibility fix-up applies.
    pub fn requires_compat(&self) -> bool {
        matches!(self, EncodeProfile::Atmos51Online)
    }

    /// Whether the engine's schema validator must be neutralized.
    pub fn bypass_validation(&self) -> bool {
        matches!(self, EncodeProfile::Atmos71BluRay)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EncodeProfile::Ddp51 => "DDP 5.1",
            EncodeProfile::Atmos51Online => "Atmos 5.1",
            EncodeProfile::Atmos71BluRay => "Atmos 7.1 (Blu-ray)",
        }
    }
}

impl fmt::Display for EncodeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_sets_are_sorted_and_contain_default() {
        for profile in EncodeProfile::ALL {
            let rates = profile.allowed_rates();
            assert!(rates.windows(2).all(|w| w[0] < w[1]), "{profile}");
            assert!(rates.contains(&profile.default_rate()), "{profile}");
        }
    }

    #[test]
    fn artifact_names() {
        assert_eq!(EncodeProfile::Ddp51.final_name("movie"), "movie_5_1.ec3");
        assert_eq!(
            EncodeProfile::Atmos51Online.final_name("movie"),
            "movie_atmos_5_1.mp4"
        );
        assert_eq!(
            EncodeProfile::Atmos71BluRay.final_name("movie"),
            "movie_atmos_7_1.eb3"
        );
        assert_eq!(EncodeProfile::Ddp51.descriptor_name(), "ddp_encode_5_1.xml");
        assert_eq!(
            EncodeProfile::Atmos71BluRay.temp_output_name(),
            "ddp_encode_atmos_7_1.eb3"
        );
        assert_eq!(
            EncodeProfile::Atmos51Online.temp_output_name(),
            "ddp_encode_atmos_5_1.mp4"
        );
    }

    #[test]
    fn quirks_are_profile_specific() {
        assert!(EncodeProfile::Atmos51Online.requires_compat());
        assert!(!EncodeProfile::Atmos71BluRay.requires_compat());
        assert!(EncodeProfile::Atmos71BluRay.bypass_validation());
        assert!(!EncodeProfile::Ddp51.bypass_validation());
        assert_eq!(EncodeProfile::Atmos71BluRay.container(), "ec3");
        assert_eq!(EncodeProfile::Ddp51.decode_target(), DecodeTarget::Pcm);
        assert_eq!(EncodeProfile::Ddp51.cleanup_suffixes(), PCM_CLEANUP);
    }
}
