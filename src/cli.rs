use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ddpforge::bitrate::BitrateRequest;
use ddpforge::config::{AtmosMode, WarpMode};

#[derive(Parser)]
#[command(name = "ddpforge")]
#[command(
    author,
    version,
    about = "TrueHD to Dolby Digital Plus / Atmos encoder driving truehdd and the Dolby Encoding Engine"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode and encode a TrueHD file
    Encode(EncodeArgs),

    /// Report whether a TrueHD file carries Dolby Atmos
    Info {
        /// TrueHD file to inspect
        #[arg(required = true)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Directory containing the truehdd executable
        #[arg(long)]
        truehdd_dir: Option<PathBuf>,
    },

    /// Check that the decoder and encoding engine can be found
    CheckTools {
        /// Directory containing the Dolby Encoding Engine
        #[arg(long)]
        dee_dir: Option<PathBuf>,

        /// Directory containing the truehdd executable
        #[arg(long)]
        truehdd_dir: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(clap::Args)]
pub struct EncodeArgs {
    /// Input TrueHD (.thd) file
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Bitrate for non-Atmos DD+ 5.1 (kbps, default 640)
    #[arg(long = "bitrate-ddp", visible_alias = "bd")]
    pub bitrate_ddp: Option<BitrateRequest>,

    /// Bitrate for Atmos 5.1 (kbps, default 768)
    #[arg(long = "bitrate-atmos-5-1", visible_alias = "ba")]
    pub bitrate_atmos_5_1: Option<BitrateRequest>,

    /// Bitrate for Atmos 7.1 Blu-ray (kbps, default 1536)
    #[arg(long = "bitrate-atmos-7-1", visible_alias = "b7")]
    pub bitrate_atmos_7_1: Option<BitrateRequest>,

    /// Atmos outputs to produce
    #[arg(long, value_enum)]
    pub atmos_mode: Option<AtmosMode>,

    /// Decoder warp mode for Atmos decodes
    #[arg(short, long, value_enum)]
    pub warp_mode: Option<WarpMode>,

    /// Conform the Atmos bed to 5.1 (never applied to 7.1 output)
    #[arg(long, overrides_with = "no_bed_conform")]
    pub bed_conform: bool,

    /// Preserve the original Atmos bed
    #[arg(long, overrides_with = "bed_conform")]
    pub no_bed_conform: bool,

    /// Directory containing the Dolby Encoding Engine
    #[arg(long)]
    pub dee_dir: Option<PathBuf>,

    /// Directory containing the truehdd executable
    #[arg(long)]
    pub truehdd_dir: Option<PathBuf>,

    /// Root for working directories (default: current directory)
    #[arg(long)]
    pub work_root: Option<PathBuf>,

    /// Directory for final outputs (default: <work-root>/ddp_encode)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Analyze and print the plan without decoding or encoding
    #[arg(long)]
    pub dry_run: bool,
}

impl EncodeArgs {
    /// `Some` only when one of the bed-conform flags was given.
    pub fn bed_conform(&self) -> Option<bool> {
        if self.bed_conform {
            Some(true)
        } else if self.no_bed_conform {
            Some(false)
        } else {
            None
        }
    }
}
