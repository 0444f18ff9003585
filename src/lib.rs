//! ddpforge - TrueHD to Dolby Digital Plus / Atmos encoding pipeline
//!
//! This library crate exposes the pipeline for the binary and for
//! integration testing.

pub mod analyzer;
pub mod bitrate;
pub mod config;
pub mod descriptor;
pub mod pipeline;
pub mod profile;
