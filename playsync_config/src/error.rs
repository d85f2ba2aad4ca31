//! Configuration loading errors, surfaced to the CLI via `miette::Diagnostic`
//! the same way the teacher's `euphony_configuration` reports load/parse
//! failures.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("could not read configuration file at {file_path:?}")]
    #[diagnostic(code(playsync::config::file_load_error))]
    FileLoadError {
        file_path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("could not parse configuration file at {file_path:?} as YAML")]
    #[diagnostic(code(playsync::config::file_format_error))]
    FileFormatError {
        file_path: PathBuf,
        #[source]
        error: Box<serde_yaml::Error>,
    },

    #[error("settings reference unknown transcoder {name:?}")]
    #[diagnostic(code(playsync::config::unknown_transcoder))]
    UnknownTranscoder { name: String },

    #[error("transcoder {name:?} rejected its settings: missing required field {field:?}")]
    #[diagnostic(code(playsync::config::invalid_settings))]
    InvalidSettings { name: String, field: &'static str },

    #[error("could not determine a default configuration directory (XDG_CONFIG_HOME unset and no home directory)")]
    #[diagnostic(code(playsync::config::no_config_home))]
    NoConfigHome,
}
