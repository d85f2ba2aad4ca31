mod cli;
mod error;
mod logging;
mod postprocess;
mod profiling;

use std::process::ExitCode;

use clap::Parser;
use log::info;

use cli::CliArgs;
use error::AppError;
use playsync_config::Config;
use playsync_core::globals::VERBOSE;
use playsync_core::orchestrator::{exit_bits, Orchestrator, OrchestratorOptions};
use playsync_core::types::AbsolutePath;
use profiling::PhaseTimer;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logging::init(args.verbose, args.debug);
    VERBOSE.set(args.verbose);

    match run(args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            let code = match err {
                AppError::Orchestrator(_) => exit_bits::SCAN_FAULT,
                _ => 1,
            };
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code as u8)
        }
    }
}

fn run(args: CliArgs) -> Result<u32, AppError> {
    let mut timer = PhaseTimer::new();

    let config = timer.time("load_config", || load_config(args.config_file.as_deref()))?;

    let playlists = args
        .playlists
        .iter()
        .cloned()
        .map(AbsolutePath::absolutize)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| AppError::InvalidArguments(err.to_string()))?;
    let destination = AbsolutePath::absolutize(args.destination.clone())
        .map_err(|err| AppError::InvalidArguments(err.to_string()))?;
    let excludes = args
        .exclude
        .iter()
        .cloned()
        .map(AbsolutePath::absolutize)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| AppError::InvalidArguments(err.to_string()))?;

    let options = OrchestratorOptions {
        playlists,
        destination,
        excludes,
        dry_run: args.dry_run,
        delete: args.delete,
        force_vfat: args.force_vfat,
        concurrency: args.concurrency,
        registry: config.registry,
        policies: config.policies,
        postprocessor: postprocess::noop_postprocessor(),
    };

    let orchestrator = Orchestrator::new(options);
    let report = timer.time("synchronize", || orchestrator.run())?;

    info!(
        "transferred {}, already up to date {}, transfer failures {}, deleted {}, deletion failures {}, playlist failures {}",
        report.transferred,
        report.already_up_to_date,
        report.transfer_failures,
        report.deleted,
        report.deletion_failures,
        report.playlist_failures,
    );

    if let Some(profile_path) = &args.profile_file {
        timer
            .write_report(profile_path)
            .map_err(|source| AppError::ProfileWrite {
                path: profile_path.clone(),
                source,
            })?;
    }

    Ok(report.exit_code)
}

/// Loads the transcoder registry and policies from `config_file`. An empty
/// string disables configuration loading entirely, per the CLI contract,
/// yielding an empty policy list and the built-in `copy` transcoder only.
fn load_config(config_file: Option<&str>) -> Result<Config, AppError> {
    let config = match config_file {
        Some("") => Config::from_yaml_str("")?,
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_default_path()?,
    };
    Ok(config)
}

