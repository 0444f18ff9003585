//! Shared test harness for integration tests.
//!
//! Provides [`FakeTools`], a temporary directory holding shell-script
//! stand-ins for `truehdd` and `dee`, an input file and a working root.
//! Both scripts append their arguments to a log next to themselves, and the
//! fake engine copies every descriptor it is given into the tools directory
//! so tests can inspect it after cleanup.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use ddpforge::bitrate::BitrateRequest;
use ddpforge::config::{AtmosMode, ToolsConfig, WarpMode};
use ddpforge::pipeline::{EncodeSettings, Pipeline};
use ddpforge::profile::EncodeProfile;
use ddpforge_av::ProgressEvent;

/// What `truehdd info` reports on its `Dolby Atmos` line.
pub const ATMOS_TRUE: &str = "true";
pub const ATMOS_FALSE: &str = "false";

const DECODER: &str = r#"#!/bin/sh
here=$(dirname "$0")
echo "$*" >> "$here/decoder.log"
case "$1" in
  --version)
    echo "truehdd 0.0.0-test"
    exit 0
    ;;
  info)
    if [ -n "@INFO_EXIT@" ] && [ "@INFO_EXIT@" != "0" ]; then
      echo "error: cannot open $2" >&2
      exit @INFO_EXIT@
    fi
    echo "Input: $2"
    echo "  Format: Dolby TrueHD"
    echo "  Dolby Atmos : @ATMOS@"
    exit 0
    ;;
  decode)
    out=""
    format=""
    while [ $# -gt 0 ]; do
      case "$1" in
        --output-path) out="$2"; shift ;;
        --format) format="$2"; shift ;;
      esac
      shift
    done
    if [ "@DECODE_EXIT@" != "0" ]; then
      echo "partial" > "$out/partial.atmos"
      echo "decode error" >&2
      exit @DECODE_EXIT@
    fi
    if [ "$format" = "w64" ]; then
      echo "pcm" > "$out/decoded.w64"
    else
      echo "mezz" > "$out/decoded.atmos"
      echo "audio" > "$out/decoded.atmos.audio"
      echo "meta" > "$out/decoded.atmos.metadata"
    fi
    echo "decoded"
    exit 0
    ;;
esac
exit 1
"#;

const ENCODER_OK: &str = r#"#!/bin/sh
here=$(dirname "$0")
xml="$2"
case "$(command -v xmllint)" in
  *ddpforge-validator-*) validator=shim ;;
  *) validator=system ;;
esac
echo "$* validator=$validator" >> "$here/encoder.log"
if [ "$1" = "--version" ]; then
  echo "Dolby Encoding Engine 0.0-test"
  exit 0
fi
cp "$xml" "$here/$(basename "$xml")"
input=$(grep -o '<file_name>[^<]*</file_name>' "$xml" | head -n 1 | sed 's/<[^>]*>//g')
cp "$(dirname "$xml")/$input" "$here/encoded_input" 2>/dev/null
echo "Parsing job"
echo "Overall progress: 0.0"
echo "Overall progress: 50.0"
echo "Overall progress: 100.0"
name=$(grep -o '<file_name>[^<]*</file_name>' "$xml" | tail -n 1 | sed 's/<[^>]*>//g')
echo "encoded" > "$(dirname "$xml")/$name"
exit 0
"#;

const ENCODER_FAIL: &str = r#"#!/bin/sh
here=$(dirname "$0")
echo "$*" >> "$here/encoder.log"
echo "Overall progress: 10.0"
i=1
while [ $i -le 50 ]; do
  echo "diagnostic line $i"
  i=$((i + 1))
done
echo "ERROR: bad job"
exit 2
"#;

const ENCODER_NO_OUTPUT: &str = r#"#!/bin/sh
here=$(dirname "$0")
echo "$*" >> "$here/encoder.log"
echo "Overall progress: 100.0"
exit 0
"#;

const ENCODER_HANGS: &str = r#"#!/bin/sh
here=$(dirname "$0")
echo "$*" >> "$here/encoder.log"
echo "Overall progress: 10.0"
exec sleep 30
"#;

/// How the fake encoding engine behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeEncoder {
    /// Reports progress and writes the output named in the descriptor.
    Succeeds,
    /// Prints 50 diagnostic lines and exits 2.
    Fails,
    /// Exits 0 without writing any output.
    NoOutput,
    /// Never finishes on its own.
    Hangs,
}

/// Options for the fake tools.
#[derive(Debug, Clone)]
pub struct FakeOptions {
    pub atmos: &'static str,
    pub info_exit: i32,
    pub decode_exit: i32,
    pub encoder: FakeEncoder,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            atmos: ATMOS_FALSE,
            info_exit: 0,
            decode_exit: 0,
            encoder: FakeEncoder::Succeeds,
        }
    }
}

pub struct FakeTools {
    pub root: TempDir,
    pub tools_dir: PathBuf,
    pub work_root: PathBuf,
    pub input: PathBuf,
}

impl FakeTools {
    pub fn new(options: FakeOptions) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let tools_dir = root.path().join("tools");
        let work_root = root.path().join("work");
        std::fs::create_dir_all(&tools_dir).unwrap();
        std::fs::create_dir_all(&work_root).unwrap();

        let decoder = DECODER
            .replace("@ATMOS@", options.atmos)
            .replace("@INFO_EXIT@", &options.info_exit.to_string())
            .replace("@DECODE_EXIT@", &options.decode_exit.to_string());
        write_script(&tools_dir.join("truehdd"), &decoder);

        let encoder = match options.encoder {
            FakeEncoder::Succeeds => ENCODER_OK,
            FakeEncoder::Fails => ENCODER_FAIL,
            FakeEncoder::NoOutput => ENCODER_NO_OUTPUT,
            FakeEncoder::Hangs => ENCODER_HANGS,
        };
        write_script(&tools_dir.join("dee"), encoder);

        let input = root.path().join("movie.thd");
        std::fs::write(&input, b"not really truehd").unwrap();

        Self {
            root,
            tools_dir,
            work_root,
            input,
        }
    }

    pub fn atmos() -> Self {
        Self::new(FakeOptions {
            atmos: ATMOS_TRUE,
            ..Default::default()
        })
    }

    pub fn plain() -> Self {
        Self::new(FakeOptions::default())
    }

    pub fn tools_config(&self) -> ToolsConfig {
        ToolsConfig {
            decoder_dir: Some(self.tools_dir.clone()),
            encoder_dir: Some(self.tools_dir.clone()),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.work_root.join("ddp_encode")
    }

    pub fn settings(&self) -> EncodeSettings {
        EncodeSettings {
            ddp_bitrate: BitrateRequest::from(640),
            atmos_51_bitrate: BitrateRequest::from(768),
            atmos_71_bitrate: BitrateRequest::from(1536),
            atmos_mode: AtmosMode::Both,
            warp_mode: WarpMode::Normal,
            bed_conform: true,
            work_root: self.work_root.clone(),
            output_dir: self.output_dir(),
        }
    }

    pub fn pipeline(&self, settings: EncodeSettings) -> Pipeline {
        Pipeline::resolve(&self.tools_config(), self.root.path(), settings)
            .expect("fake tools resolve")
    }

    /// Pipeline that records every progress percentage it reports.
    pub fn recording_pipeline(&self, settings: EncodeSettings) -> (Pipeline, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let pipeline = self
            .pipeline(settings)
            .with_progress_callback(Box::new(move |_: EncodeProfile, event: &ProgressEvent| {
                sink.lock().unwrap().push(event.percent);
            }));
        (pipeline, seen)
    }

    pub fn decoder_log(&self) -> Vec<String> {
        read_lines(&self.tools_dir.join("decoder.log"))
    }

    pub fn encoder_log(&self) -> Vec<String> {
        read_lines(&self.tools_dir.join("encoder.log"))
    }

    /// A descriptor as the fake engine received it.
    pub fn captured_descriptor(&self, name: &str) -> String {
        std::fs::read_to_string(self.tools_dir.join(name)).unwrap_or_default()
    }

    /// Contents of the audio file the fake engine last encoded.
    pub fn encoded_input(&self) -> String {
        std::fs::read_to_string(self.tools_dir.join("encoded_input")).unwrap_or_default()
    }

    pub fn work_dir(&self, name: &str) -> PathBuf {
        self.work_root.join(name)
    }
}

pub fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Sorted file names in `dir`; empty if it does not exist.
pub fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
