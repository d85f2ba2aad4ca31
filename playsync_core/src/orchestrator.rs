//! Orchestrator (C12): wires playlist parsing, target scanning, planning,
//! execution, playlist rewriting, and deletion into one run.
//!
//! Grounded in `sync/core.py`'s `Synchronizer` (`compute_synchronization`,
//! `synchronize`, `synchronize_playlists`, `synchronize_deletions`).

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::channel::Receiver;
use log::{debug, error, info, warn};

use crate::comparator::ModtimeComparator;
use crate::mapper::fstype::MountTable;
use crate::mapper::vfat::{FilesystemPathMapper, ForceVfatPathMapper};
use crate::mapper::PathMapper;
use crate::pipeline::pool::{CancellableThreadPool, PoolMessage};
use crate::pipeline::syncer::{Postprocessor, SingleItemSyncer};
use crate::playlist::parse_playlists;
use crate::policy::PolicyBasedPipelineSelector;
use crate::rewrite::{delete_stale_targets, rewrite_playlist, target_playlist_dir, RewriteOutcome};
use crate::sync_algorithm::{compute_synchronization, SyncAlgorithmError};
use crate::transcoder::registry::TranscoderRegistry;
use crate::transcoder::TranscoderPolicies;
use crate::transcoding_mapper::TranscodingMapper;
use crate::types::{AbsolutePath, PathError};

/// Exit-code bits, combined with bitwise-OR per the original tool's
/// contract: scripts wrapping this tool can test individual bits.
pub mod exit_bits {
    pub const SCAN_FAULT: u32 = 2;
    pub const TRANSFER_FAILURE: u32 = 4;
    pub const PLAYLIST_FAILURE: u32 = 8;
    pub const DELETION_FAILURE: u32 = 16;
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("failed to parse {count} playlist(s)")]
    PlaylistParseFailure { count: usize },

    #[error("failed to scan target directory {path}: {source}")]
    TargetScanFailure {
        path: AbsolutePath,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Algorithm(#[from] SyncAlgorithmError),

    #[error("no playlists reference any source files")]
    NoSources,

    #[error(transparent)]
    Path(#[from] PathError),
}

pub struct OrchestratorOptions {
    pub playlists: Vec<AbsolutePath>,
    pub destination: AbsolutePath,
    pub excludes: Vec<AbsolutePath>,
    pub dry_run: bool,
    pub delete: bool,
    pub force_vfat: bool,
    pub concurrency: Option<usize>,
    pub registry: Arc<TranscoderRegistry>,
    pub policies: TranscoderPolicies,
    pub postprocessor: Postprocessor,
}

/// A summary of one run, used to compute the process exit code.
pub struct RunReport {
    pub transferred: usize,
    pub transfer_failures: usize,
    pub already_up_to_date: usize,
    pub deleted: usize,
    pub deletion_failures: usize,
    pub playlist_failures: usize,
    pub exit_code: u32,
}

pub struct Orchestrator {
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(options: OrchestratorOptions) -> Self {
        Orchestrator { options }
    }

    pub fn run(&self) -> Result<RunReport, OrchestratorError> {
        let opts = &self.options;

        let parsed = parse_playlists(&opts.playlists);
        if !parsed.errors.is_empty() {
            for (playlist, err) in &parsed.errors {
                error!("failed to parse playlist {playlist}: {err}");
            }
            return Err(OrchestratorError::PlaylistParseFailure {
                count: parsed.errors.len(),
            });
        }

        let source_files: Vec<AbsolutePath> = parsed.entries.keys().cloned().collect();
        if source_files.is_empty() {
            warn!("no playlist entries found; nothing to synchronize");
        }

        let source_basedir = common_parent(&source_files).unwrap_or_else(|| opts.destination.clone());

        let target_files = scan_target_directory(&opts.destination)?;

        let mount_table = Arc::new(MountTable::new());
        let target_mappers: Vec<Box<dyn PathMapper>> = if opts.force_vfat {
            vec![Box::new(ForceVfatPathMapper::new())]
        } else {
            vec![Box::new(FilesystemPathMapper::new(mount_table.clone()))]
        };
        let source_mappers: Vec<Box<dyn PathMapper>> = Vec::new();

        let playlist_dir = target_playlist_dir(&opts.destination);
        let mut exclude_beneath = opts.excludes.clone();
        for playlist in &opts.playlists {
            if let Some(name) = playlist.file_name() {
                exclude_beneath.push(playlist_dir.join(name));
            }
        }

        let selector = PolicyBasedPipelineSelector::new(TranscoderPolicies::new(opts.policies.0.clone()), true);
        let transcoding_mapper = TranscodingMapper::new(opts.registry.clone(), selector);
        let comparator = ModtimeComparator::new(mount_table);

        let plan = compute_synchronization(
            &source_files,
            &source_basedir,
            &target_files,
            &opts.destination,
            &source_mappers,
            &target_mappers,
            &transcoding_mapper,
            &comparator,
            &exclude_beneath,
        )?;

        for (src, failure) in &plan.cannot_transfer {
            warn!("cannot transfer {src}: {failure}");
        }

        let concurrency = opts.concurrency.filter(|n| *n > 0).unwrap_or_else(num_cpus::get);
        let syncer = Arc::new(SingleItemSyncer::new(opts.postprocessor.clone()));

        let mut transfer_failures: HashMap<AbsolutePath, String> = plan
            .cannot_transfer
            .iter()
            .map(|(src, err)| (src.clone(), err.to_string()))
            .collect();
        let mut transferred_count = 0;

        if !opts.dry_run && !plan.will_transfer.is_empty() {
            let items = plan.will_transfer.clone();
            let (pool, receiver) = CancellableThreadPool::spawn(concurrency, items, syncer);
            install_ctrlc_handler(pool.cancellation_flag());
            drain_pool_results(receiver, &mut transferred_count, &mut transfer_failures);
            pool.join();
        } else if opts.dry_run {
            info!("dry run: would transfer {} item(s)", plan.will_transfer.len());
        }

        let mut transferred: HashMap<AbsolutePath, AbsolutePath> = plan
            .will_transfer
            .iter()
            .filter(|(src, ..)| !transfer_failures.contains_key(src))
            .map(|(src, dst, _)| (src.clone(), dst.clone()))
            .collect();
        transferred.extend(plan.already_transferred.iter().cloned());

        let mut playlist_failures = 0;
        for playlist in &opts.playlists {
            match rewrite_playlist(playlist, &transferred, &transfer_failures, &playlist_dir, opts.dry_run) {
                Ok(RewriteOutcome::Written) => debug!("rewrote playlist {playlist}"),
                Ok(RewriteOutcome::Unchanged) => debug!("playlist {playlist} already up to date"),
                Ok(RewriteOutcome::WouldWrite) => info!("dry run: would rewrite playlist {playlist}"),
                Err(err) => {
                    error!("failed to rewrite playlist {playlist}: {err}");
                    playlist_failures += 1;
                }
            }
        }

        let mut deleted = 0;
        let mut deletion_failures = 0;
        if opts.delete {
            let failures = delete_stale_targets(&plan.will_delete, opts.dry_run);
            deletion_failures = failures.len();
            deleted = plan.will_delete.len() - deletion_failures;
            for (path, err) in failures {
                error!("failed to delete {path}: {err}");
            }
        }

        let mut exit_code = 0;
        if !transfer_failures.is_empty() {
            exit_code |= exit_bits::TRANSFER_FAILURE;
        }
        if playlist_failures > 0 {
            exit_code |= exit_bits::PLAYLIST_FAILURE;
        }
        if deletion_failures > 0 {
            exit_code |= exit_bits::DELETION_FAILURE;
        }

        Ok(RunReport {
            transferred: transferred_count,
            transfer_failures: transfer_failures.len(),
            already_up_to_date: plan.already_transferred.len(),
            deleted,
            deletion_failures,
            playlist_failures,
            exit_code,
        })
    }
}

fn drain_pool_results(
    receiver: Receiver<PoolMessage>,
    transferred_count: &mut usize,
    transfer_failures: &mut HashMap<AbsolutePath, String>,
) {
    for message in receiver.iter() {
        match message {
            PoolMessage::Starting { task_id, src } => debug!("[{task_id}] starting transfer of {src}"),
            PoolMessage::Finished { task_id, result } => match result.error {
                None => {
                    *transferred_count += 1;
                    info!("[{task_id}] transferred {} -> {}", result.src, result.dst);
                }
                Some(err) => {
                    error!("[{task_id}] failed to transfer {}: {}", result.src, err);
                    transfer_failures.insert(result.src, err.to_string());
                }
            },
        }
    }
}

fn install_ctrlc_handler(flag: Arc<std::sync::atomic::AtomicBool>) {
    let _ = ctrlc::set_handler(move || {
        warn!("received interrupt, cancelling in-flight transfers");
        flag.store(true, Ordering::SeqCst);
    });
}

fn scan_target_directory(root: &AbsolutePath) -> Result<Vec<AbsolutePath>, OrchestratorError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root.as_path()) {
        let entry = entry.map_err(|source| OrchestratorError::TargetScanFailure {
            path: root.clone(),
            source,
        })?;
        if entry.file_type().is_file() {
            if let Ok(abs) = AbsolutePath::new(entry.path().to_path_buf()) {
                files.push(abs);
            }
        }
    }
    Ok(files)
}

/// The common ancestor of every source file's parent directory.
fn common_parent(paths: &[AbsolutePath]) -> Option<AbsolutePath> {
    let mut iter = paths.iter();
    let first = iter.next()?.parent()?;
    let mut common = first.as_path().components().collect::<Vec<_>>();

    for path in iter {
        let parent = path.parent()?;
        let components: Vec<_> = parent.as_path().components().collect();
        let shared = common.iter().zip(components.iter()).take_while(|(a, b)| a == b).count();
        common.truncate(shared);
    }

    let joined: std::path::PathBuf = common.into_iter().collect();
    AbsolutePath::new(joined).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_parent_of_single_path_is_its_parent() {
        let paths = vec![AbsolutePath::new("/music/artist/track.mp3").unwrap()];
        assert_eq!(common_parent(&paths), Some(AbsolutePath::new("/music/artist").unwrap()));
    }

    #[test]
    fn common_parent_finds_shared_ancestor() {
        let paths = vec![
            AbsolutePath::new("/music/a/track1.mp3").unwrap(),
            AbsolutePath::new("/music/b/track2.mp3").unwrap(),
        ];
        assert_eq!(common_parent(&paths), Some(AbsolutePath::new("/music").unwrap()));
    }

    #[test]
    fn common_parent_of_empty_list_is_none() {
        assert_eq!(common_parent(&[]), None);
    }
}
