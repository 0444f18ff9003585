//! The encode pipeline.
//!
//! A run analyzes the input once, plans one or two sub-runs from the
//! classification, then takes each sub-run through decode, descriptor
//! build, encode, finalize and cleanup, strictly one after another.

mod error;
pub mod executor;
pub mod plan;

pub use error::PipelineError;
pub use executor::{Pipeline, PipelineRun, ProgressCallback};
pub use plan::{plan, SubRun};

use std::fmt;
use std::path::PathBuf;

use crate::bitrate::BitrateRequest;
use crate::config::{AtmosMode, WarpMode};

/// Pipeline state. `Failed` is reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Analyze,
    Decode,
    BuildConfig,
    Encode,
    Finalize,
    Cleanup,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Analyze => "analyze",
            PipelineState::Decode => "decode",
            PipelineState::BuildConfig => "build-config",
            PipelineState::Encode => "encode",
            PipelineState::Finalize => "finalize",
            PipelineState::Cleanup => "cleanup",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Resolved encode settings for one run.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub ddp_bitrate: BitrateRequest,
    pub atmos_51_bitrate: BitrateRequest,
    pub atmos_71_bitrate: BitrateRequest,
    pub atmos_mode: AtmosMode,
    pub warp_mode: WarpMode,
    pub bed_conform: bool,
    /// Parent of the per-profile working directories.
    pub work_root: PathBuf,
    /// Where final artifacts are placed.
    pub output_dir: PathBuf,
}
