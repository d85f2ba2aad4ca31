//! The on-disk configuration document: an unresolved schema deserialized
//! directly with `serde_yaml`, resolved into a ready-to-use transcoder
//! registry plus policy list.
//!
//! Grounded in the teacher's `structure/mod.rs` (`UnresolvedConfiguration`
//! resolving into `Configuration`), with `toml` swapped for `serde_yaml` per
//! the playlist-synchronizer's YAML configuration contract.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use playsync_core::transcoder::registry::{builtin_factories, TranscoderRegistry};
use playsync_core::transcoder::{TranscoderPolicies, TranscoderSettings};
use serde::Deserialize;

use crate::error::ConfigError;

const CONFIG_SUBDIRECTORY: &str = "musictoolbox";
const CONFIG_FILE_NAME: &str = "transcoding.yaml";

/// The raw shape of `transcoding.yaml`: a list of policies, in the order
/// they should be tried, and a mapping of transcoder name to options-map.
/// Unknown top-level keys are a hard error.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct UnresolvedConfig {
    #[serde(default)]
    policies: TranscoderPolicies,
    #[serde(default)]
    settings: TranscoderSettings,
}

/// The resolved configuration: a transcoder registry (built-in factories plus
/// their configured options) and the ordered policy list, ready to hand to
/// [`playsync_core::transcoding_mapper::TranscodingMapper`].
#[derive(Debug)]
pub struct Config {
    pub registry: Arc<TranscoderRegistry>,
    pub policies: TranscoderPolicies,
}

impl Config {
    /// Parses and resolves a configuration document already read from disk.
    /// Exposed separately from [`Config::load_from_path`] so in-memory YAML
    /// (e.g. from tests) can be resolved without touching the filesystem.
    pub fn from_yaml_str(contents: &str) -> Result<Config, ConfigError> {
        let unresolved: UnresolvedConfig =
            serde_yaml::from_str(contents).map_err(|error| ConfigError::FileFormatError {
                file_path: PathBuf::new(),
                error: Box::new(error),
            })?;

        let registry = TranscoderRegistry::build(&builtin_factories(), &unresolved.settings)
            .map_err(|err| match err {
                playsync_core::transcoder::registry::RegistryError::UnknownTranscoder(name) => {
                    ConfigError::UnknownTranscoder { name }
                }
                playsync_core::transcoder::registry::RegistryError::MissingSetting { name, field } => {
                    ConfigError::InvalidSettings { name, field }
                }
            })?;

        Ok(Config {
            registry: Arc::new(registry),
            policies: unresolved.policies,
        })
    }

    /// Loads and resolves the configuration file at `path`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|error| ConfigError::FileLoadError {
            file_path: path.to_path_buf(),
            error,
        })?;
        let path = &dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        Config::from_yaml_str(&contents).map_err(|err| match err {
            ConfigError::FileFormatError { error, .. } => ConfigError::FileFormatError {
                file_path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Loads the configuration file at the default XDG location
    /// (`$XDG_CONFIG_HOME/musictoolbox/transcoding.yaml`, falling back to
    /// `$HOME/.config/musictoolbox/transcoding.yaml`), or an empty default
    /// configuration if no such file exists.
    pub fn load_default_path() -> Result<Config, ConfigError> {
        let path = default_config_file_path()?;
        if !path.exists() {
            return Config::from_yaml_str("");
        }
        Config::load_from_path(path)
    }
}

fn default_config_file_path() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join(CONFIG_SUBDIRECTORY).join(CONFIG_FILE_NAME));
        }
    }

    let home = env::var("HOME").map_err(|_| ConfigError::NoConfigHome)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join(CONFIG_SUBDIRECTORY)
        .join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_resolves_to_copy_only_registry() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(config.registry.get("copy").is_some());
        assert!(config.policies.0.is_empty());
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let err = Config::from_yaml_str("bogus: true\n").unwrap_err();
        assert!(matches!(err, ConfigError::FileFormatError { .. }));
    }

    #[test]
    fn policies_and_settings_are_parsed() {
        let yaml = "
policies:
  - source: flac
    target: mp3
settings:
  flac_to_mp3:
    cost: 9
";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.policies.0.len(), 1);
        assert!(config.registry.get("flac_to_mp3").is_some());
    }

    #[test]
    fn settings_for_unknown_transcoder_is_rejected() {
        let yaml = "
settings:
  nonexistent:
    cost: 1
";
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTranscoder { name } if name == "nonexistent"));
    }
}
