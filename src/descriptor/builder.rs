//! Per-profile descriptor schemas.

use std::path::{Path, PathBuf};

use crate::bitrate::BitrateRequest;
use crate::profile::EncodeProfile;

use super::{compat, xml, DescriptorError, Element};

/// An in-memory job descriptor, ready to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub profile: EncodeProfile,
    /// Normalized data rate, always a member of the profile's allowed set.
    pub data_rate: u32,
    pub root: Element,
}

impl JobDescriptor {
    /// Serialize to pretty-printed XML.
    pub fn to_xml(&self) -> Result<String, DescriptorError> {
        xml::to_string(&self.root)
    }

    /// Write to `<work_dir>/<descriptor name>` and return that path.
    pub fn write(&self, work_dir: &Path) -> Result<PathBuf, DescriptorError> {
        let path = work_dir.join(self.profile.descriptor_name());
        let xml = self.to_xml()?;
        std::fs::write(&path, xml).map_err(|source| DescriptorError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Descriptor written: {}", path.display());
        Ok(path)
    }
}

/// Build the descriptor for `profile`.
///
/// `input_file` and `output_file` are reduced to their base names; the
/// working directory is carried separately in every `storage/local/path`.
/// The online compatibility fix-up is applied here, before serialization.
pub fn build(
    profile: EncodeProfile,
    work_dir: &Path,
    input_file: &str,
    output_file: &str,
    bitrate: &BitrateRequest,
) -> JobDescriptor {
    let data_rate = bitrate.normalize(profile.allowed_rates());
    let work = work_dir.to_string_lossy().to_string();
    let input_name = base_name(input_file);
    let output_name = base_name(output_file);

    let encode = match profile {
        EncodeProfile::Ddp51 => pcm_to_ddp(profile, data_rate),
        EncodeProfile::Atmos51Online | EncodeProfile::Atmos71BluRay => {
            encode_to_atmos_ddp(profile, data_rate)
        }
    };

    let mut root = Element::new("job_config")
        .child(input_block(profile, &input_name, &work))
        .child(Element::new("filter").child(Element::new("audio").child(encode)))
        .child(output_block(profile, &output_name, &work))
        .child(
            Element::new("misc").child(
                Element::new("temp_dir")
                    .with("clean_temp", "true")
                    .with("path", work.as_str()),
            ),
        );

    if profile.requires_compat() {
        compat::apply_online_compat(&mut root);
    }

    JobDescriptor {
        profile,
        data_rate,
        root,
    }
}

/// Build and write a descriptor in one step, returning its path.
pub fn write_descriptor(
    profile: EncodeProfile,
    work_dir: &Path,
    input_file: &str,
    output_file: &str,
    bitrate: &BitrateRequest,
) -> Result<PathBuf, DescriptorError> {
    build(profile, work_dir, input_file, output_file, bitrate).write(work_dir)
}

fn base_name(file: &str) -> String {
    Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.to_string())
}

fn storage(work: &str) -> Element {
    Element::new("storage").child(Element::new("local").with("path", work))
}

fn input_block(profile: EncodeProfile, input_name: &str, work: &str) -> Element {
    let source = match profile {
        EncodeProfile::Ddp51 => Element::new("wav")
            .attr("version", "1")
            .with("file_name", input_name)
            .with("timecode_frame_rate", "not_indicated")
            .with("offset", "auto")
            .with("ffoa", "auto"),
        EncodeProfile::Atmos51Online | EncodeProfile::Atmos71BluRay => {
            Element::new("atmos_mezz")
                .attr("version", "1")
                .with("file_name", input_name)
                .with("timecode_frame_rate", profile.timing().frame_rate)
                .with("offset", "00:00:00:00")
                .with("ffoa", "auto")
        }
    };

    Element::new("input").child(Element::new("audio").child(source.child(storage(work))))
}

fn loudness(metering_mode: &str, speech_threshold: &str) -> Element {
    Element::new("loudness").child(
        Element::new("measure_only")
            .with("metering_mode", metering_mode)
            .with("dialogue_intelligence", "true")
            .with("speech_threshold", speech_threshold),
    )
}

fn drc(curve: &str) -> Element {
    Element::new("drc")
        .with("line_mode_drc_profile", curve)
        .with("rf_mode_drc_profile", curve)
}

fn timed(encode: Element, profile: EncodeProfile, data_rate: u32) -> Element {
    let timing = profile.timing();
    encode
        .with("data_rate", data_rate.to_string())
        .with("timecode_frame_rate", timing.frame_rate)
        .with("start", timing.start)
        .with("end", "end_of_file")
        .with("time_base", timing.time_base)
        .with("prepend_silence_duration", timing.silence)
        .with("append_silence_duration", timing.silence)
}

fn pcm_to_ddp(profile: EncodeProfile, data_rate: u32) -> Element {
    let encode = Element::new("pcm_to_ddp")
        .attr("version", "3")
        .child(loudness("1770-3", "20"))
        .with("encoder_mode", "ddp")
        .with("bitstream_mode", "complete_main")
        .with("downmix_config", "off");

    timed(encode, profile, data_rate)
        .with("lfe_on", "true")
        .with("dolby_surround_mode", "not_indicated")
        .with("dolby_surround_ex_mode", "no")
        .with("user_data", "-1")
        .child(drc("music_light"))
        .child(
            Element::new("embedded_timecodes")
                .with("starting_timecode", "off")
                .with("frame_rate", "auto"),
        )
}

fn encode_to_atmos_ddp(profile: EncodeProfile, data_rate: u32) -> Element {
    let (center, surround) = match profile {
        EncodeProfile::Atmos71BluRay => ("-3", "-3"),
        _ => ("0", "-1.5"),
    };

    let encode = Element::new("encode_to_atmos_ddp")
        .attr("version", "1")
        .child(loudness("1770-4", "15"));

    let mut encode = timed(encode, profile, data_rate)
        .child(drc("film_light"))
        .child(
            Element::new("downmix")
                .with("loro_center_mix_level", center)
                .with("loro_surround_mix_level", surround)
                .with("ltrt_center_mix_level", center)
                .with("ltrt_surround_mix_level", surround)
                .with("preferred_downmix_mode", "loro"),
        );

    if profile.custom_trims() {
        encode = encode.child(
            Element::new("custom_trims")
                .with("surround_trim_5_1", "auto")
                .with("height_trim_5_1", "auto"),
        );
    }

    encode = encode.with("custom_dialnorm", "0");

    if profile.backend_override() {
        encode = encode
            .with("encoding_backend", "atmosprocessor")
            .with("encoder_mode", "bluray");
    }

    encode
}

fn output_block(profile: EncodeProfile, output_name: &str, work: &str) -> Element {
    let mut sink = Element::new(profile.container()).attr("version", "1");

    if profile == EncodeProfile::Atmos51Online {
        sink = sink
            .with("output_format", "mp4")
            .with("override_frame_rate", "no");
    }

    sink = sink.with("file_name", output_name).child(storage(work));

    if profile == EncodeProfile::Atmos51Online {
        sink = sink.child(Element::new("plugin").child(Element::new("base")));
    }

    Element::new("output").child(sink)
}
