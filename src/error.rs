//! Top-level error aggregation, grounded in the teacher's
//! `euphony_configuration::ConfigurationError` (`thiserror::Error` +
//! `miette::Diagnostic`), collapsed here into a single binary-facing enum.

use miette::Diagnostic;
use playsync_config::ConfigError;
use playsync_core::orchestrator::OrchestratorError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    #[error("invalid command-line arguments: {0}")]
    #[diagnostic(code(playsync::invalid_arguments))]
    InvalidArguments(String),

    #[error("configuration error: {0}")]
    #[diagnostic(code(playsync::config_error))]
    Config(#[from] ConfigError),

    #[error("{0}")]
    #[diagnostic(code(playsync::run_failure))]
    Orchestrator(#[from] OrchestratorError),

    #[error("failed to write profile report to {path:?}: {source}")]
    #[diagnostic(code(playsync::profile_write_failure))]
    ProfileWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
