mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::pipeline::EncodeSettings;
use crate::profile::FINAL_OUTPUT_DIR;

/// Default config file locations, first match wins.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./ddpforge.toml",
    "~/.config/ddpforge/config.toml",
    "/etc/ddpforge/config.toml",
];

/// Environment variable naming the decoder directory.
pub const DECODER_DIR_ENV: &str = "TRUEHDD_DIR";
/// Environment variables naming the encoder directory, in priority order.
pub const ENCODER_DIR_ENVS: &[&str] = &["DEE_DIR", "DEE_HOME"];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    parse_config(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}

/// Parse configuration from TOML text, recording unknown keys.
pub fn parse_config(content: &str) -> Result<Config> {
    let table: toml::Table = toml::from_str(content)?;
    let mut config: Config = toml::Value::Table(table.clone()).try_into()?;
    config.unknown_keys = unknown_keys(&table);
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file: {}", path.display());
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn unknown_keys(table: &toml::Table) -> Vec<String> {
    let mut unknown = Vec::new();
    for (section, value) in table {
        let Some((_, keys)) = KNOWN_KEYS.iter().find(|(name, _)| *name == section.as_str()) else {
            unknown.push(section.clone());
            continue;
        };
        if let Some(inner) = value.as_table() {
            for key in inner.keys() {
                if !keys.contains(&key.as_str()) {
                    unknown.push(format!("{section}.{key}"));
                }
            }
        }
    }
    unknown
}

impl Config {
    /// Overlay tool directories from the environment.
    ///
    /// The lookup is injected so callers and tests control the source; the
    /// binary passes `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(DECODER_DIR_ENV) {
            self.tools.decoder_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = ENCODER_DIR_ENVS.iter().find_map(|key| non_empty(key)) {
            self.tools.encoder_dir = Some(PathBuf::from(dir));
        }
    }

    /// Non-fatal problems worth reporting.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let dirs = [
            ("tools.decoder_dir", &self.tools.decoder_dir),
            ("tools.encoder_dir", &self.tools.encoder_dir),
            ("paths.work_root", &self.paths.work_root),
        ];
        for (key, dir) in dirs {
            if let Some(dir) = dir {
                if !dir.is_dir() {
                    warnings.push(format!("{key} does not exist: {}", dir.display()));
                }
            }
        }

        for key in &self.unknown_keys {
            warnings.push(format!("Unknown key ignored: {key}"));
        }

        warnings
    }

    /// Resolve the settings handed to the pipeline.
    ///
    /// Relative paths are taken from `cwd`.
    pub fn settings(&self, cwd: &Path) -> EncodeSettings {
        let work_root = match &self.paths.work_root {
            Some(root) => cwd.join(root),
            None => cwd.to_path_buf(),
        };
        let output_dir = match &self.paths.output_dir {
            Some(dir) => cwd.join(dir),
            None => work_root.join(FINAL_OUTPUT_DIR),
        };

        EncodeSettings {
            ddp_bitrate: self.encode.ddp_bitrate.clone(),
            atmos_51_bitrate: self.encode.atmos_51_bitrate.clone(),
            atmos_71_bitrate: self.encode.atmos_71_bitrate.clone(),
            atmos_mode: self.encode.atmos_mode,
            warp_mode: self.encode.warp_mode,
            bed_conform: self.encode.bed_conform,
            work_root,
            output_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitrate::BitrateRequest;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.encode.ddp_bitrate, BitrateRequest::Kbps(640));
        assert_eq!(config.encode.atmos_51_bitrate, BitrateRequest::Kbps(768));
        assert_eq!(config.encode.atmos_71_bitrate, BitrateRequest::Kbps(1536));
        assert_eq!(config.encode.atmos_mode, AtmosMode::Both);
        assert_eq!(config.encode.warp_mode, WarpMode::Normal);
        assert!(config.encode.bed_conform);
        assert!(config.unknown_keys.is_empty());
    }

    #[test]
    fn parses_all_sections() {
        let config = parse_config(
            r#"
[tools]
decoder_dir = "/opt/truehdd"
encoder_dir = "/opt/dee"

[paths]
work_root = "/scratch"

[encode]
ddp_bitrate = "448"
atmos_71_bitrate = 1664
atmos_mode = "7.1"
warp_mode = "prologiciix"
bed_conform = false
"#,
        )
        .unwrap();

        assert_eq!(config.tools.decoder_dir, Some(PathBuf::from("/opt/truehdd")));
        assert_eq!(config.encode.ddp_bitrate, BitrateRequest::Text("448".into()));
        assert_eq!(config.encode.atmos_71_bitrate, BitrateRequest::Kbps(1664));
        assert_eq!(config.encode.atmos_mode, AtmosMode::SevenOne);
        assert_eq!(config.encode.warp_mode, WarpMode::Prologiciix);
        assert!(!config.encode.bed_conform);

        let settings = config.settings(Path::new("/home/user"));
        assert_eq!(settings.work_root, PathBuf::from("/scratch"));
        assert_eq!(settings.output_dir, PathBuf::from("/scratch/ddp_encode"));
    }

    #[test]
    fn unknown_keys_become_warnings() {
        let config = parse_config("[encode]\nspeed = 3\n[server]\nport = 1\n").unwrap();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("encode.speed")));
        assert!(warnings.iter().any(|w| w.contains("server")));
    }

    #[test]
    fn invalid_values_fail() {
        assert!(parse_config("[encode]\natmos_mode = \"6.1\"\n").is_err());
        assert!(parse_config("[encode\n").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = parse_config("[tools]\nencoder_dir = \"/from/file\"\n").unwrap();
        let env: HashMap<&str, &str> = [("DEE_HOME", "/from/home"), ("TRUEHDD_DIR", "/t")]
            .into_iter()
            .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.tools.encoder_dir, Some(PathBuf::from("/from/home")));
        assert_eq!(config.tools.decoder_dir, Some(PathBuf::from("/t")));

        let env: HashMap<&str, &str> = [("DEE_DIR", "/from/dir"), ("DEE_HOME", "/from/home")]
            .into_iter()
            .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.tools.encoder_dir, Some(PathBuf::from("/from/dir")));
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let mut config = Config::default();
        config.paths.output_dir = Some(PathBuf::from("out"));
        let settings = config.settings(Path::new("/cwd"));
        assert_eq!(settings.work_root, PathBuf::from("/cwd"));
        assert_eq!(settings.output_dir, PathBuf::from("/cwd/out"));
    }

    #[test]
    fn missing_directories_warn() {
        let mut config = Config::default();
        config.tools.encoder_dir = Some(PathBuf::from("/definitely/not/here"));
        assert_eq!(config.validate().len(), 1);
    }
}
