//! Command-line argument definitions.
//!
//! Grounded in the teacher's `clap::Parser` derive (`src/main.rs`), with
//! the flag set realized from the synchronizer's CLI contract.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "playsync", about = "Synchronizes a playlist-driven music collection, transcoding as needed.")]
pub struct CliArgs {
    /// One or more playlist files to synchronize.
    #[arg(required = true, num_args = 1..)]
    pub playlists: Vec<PathBuf>,

    /// The destination directory to synchronize into.
    pub destination: PathBuf,

    /// Compute and report what would happen without touching the filesystem.
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Delete target files that no longer correspond to any source.
    #[arg(short = 'd', long = "delete")]
    pub delete: bool,

    /// Force module path and line numbers into log output.
    #[arg(short = 'D', long = "debug")]
    pub debug: bool,

    /// A path to exclude from synchronization and deletion. Repeatable.
    #[arg(short = 'e', long = "exclude")]
    pub exclude: Vec<PathBuf>,

    /// Increase log verbosity. May be repeated (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Apply FAT32/VFAT filename restrictions regardless of the detected target filesystem.
    #[arg(short = 'V', long = "force-vfat")]
    pub force_vfat: bool,

    /// Number of worker threads to use for transcoding and copying. Defaults to the number of CPUs.
    #[arg(long = "concurrency")]
    pub concurrency: Option<usize>,

    /// Configuration file to load. An empty string disables configuration loading entirely.
    #[arg(short = 'c', long = "config-file")]
    pub config_file: Option<String>,

    /// If given, a performance report for this run is written to this path.
    #[arg(short = 'p', long = "profile-file")]
    pub profile_file: Option<PathBuf>,
}
