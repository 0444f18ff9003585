use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::bitrate::BitrateRequest;
use crate::profile::EncodeProfile;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub encode: EncodeConfig,

    /// Keys present in the file but not understood, as dotted paths.
    #[serde(skip)]
    pub unknown_keys: Vec<String>,
}

/// Where the external tools live.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Directory containing the TrueHD decoder (`truehdd`).
    #[serde(default)]
    pub decoder_dir: Option<PathBuf>,

    /// Directory containing the Dolby Encoding Engine (`dee`).
    #[serde(default)]
    pub encoder_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Root for the per-profile working directories (default: current dir).
    #[serde(default)]
    pub work_root: Option<PathBuf>,

    /// Final artifact directory (default: `<work_root>/ddp_encode`).
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodeConfig {
    #[serde(default = "default_ddp_bitrate")]
    pub ddp_bitrate: BitrateRequest,

    #[serde(default = "default_atmos_51_bitrate")]
    pub atmos_51_bitrate: BitrateRequest,

    #[serde(default = "default_atmos_71_bitrate")]
    pub atmos_71_bitrate: BitrateRequest,

    #[serde(default)]
    pub atmos_mode: AtmosMode,

    #[serde(default)]
    pub warp_mode: WarpMode,

    /// Conform the bed to 5.1 during object-audio decodes. Never applied to
    /// the 7.1 sub-run.
    #[serde(default = "default_true")]
    pub bed_conform: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            ddp_bitrate: default_ddp_bitrate(),
            atmos_51_bitrate: default_atmos_51_bitrate(),
            atmos_71_bitrate: default_atmos_71_bitrate(),
            atmos_mode: AtmosMode::default(),
            warp_mode: WarpMode::default(),
            bed_conform: true,
        }
    }
}

fn default_ddp_bitrate() -> BitrateRequest {
    EncodeProfile::Ddp51.default_rate().into()
}

fn default_atmos_51_bitrate() -> BitrateRequest {
    EncodeProfile::Atmos51Online.default_rate().into()
}

fn default_atmos_71_bitrate() -> BitrateRequest {
    EncodeProfile::Atmos71BluRay.default_rate().into()
}

fn default_true() -> bool {
    true
}

/// Which Atmos outputs to produce when the input carries Atmos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub enum AtmosMode {
    #[serde(rename = "5.1")]
    #[value(name = "5.1")]
    FiveOne,
    #[serde(rename = "7.1")]
    #[value(name = "7.1")]
    SevenOne,
    #[default]
    #[serde(rename = "both")]
    #[value(name = "both")]
    Both,
}

impl AtmosMode {
    pub fn includes_51(&self) -> bool {
        matches!(self, AtmosMode::FiveOne | AtmosMode::Both)
    }

    pub fn includes_71(&self) -> bool {
        matches!(self, AtmosMode::SevenOne | AtmosMode::Both)
    }
}

impl fmt::Display for AtmosMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtmosMode::FiveOne => write!(f, "5.1"),
            AtmosMode::SevenOne => write!(f, "7.1"),
            AtmosMode::Both => write!(f, "both"),
        }
    }
}

/// Decoder spatial rendering mode for object-audio decodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum WarpMode {
    #[default]
    Normal,
    Warping,
    Prologiciix,
    Loro,
}

impl WarpMode {
    /// Value passed to `--warp-mode`.
    pub fn as_arg(&self) -> &'static str {
        match self {
            WarpMode::Normal => "normal",
            WarpMode::Warping => "warping",
            WarpMode::Prologiciix => "prologiciix",
            WarpMode::Loro => "loro",
        }
    }
}

impl fmt::Display for WarpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Top-level sections and their keys.
pub(crate) const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("tools", &["decoder_dir", "encoder_dir"]),
    ("paths", &["work_root", "output_dir"]),
    (
        "encode",
        &[
            "ddp_bitrate",
            "atmos_51_bitrate",
            "atmos_71_bitrate",
            "atmos_mode",
            "warp_mode",
            "bed_conform",
        ],
    ),
];
