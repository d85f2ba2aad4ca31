//! Synchronization algorithm (C7): computes what to transfer, skip, leave
//! unsupported, or delete, by comparing mapped source paths against a
//! recursive scan of the target directory.
//!
//! Grounded in `sync/algo.py`'s `compute_synchronization`.

use std::collections::HashMap;

use crate::comparator::{ComparatorError, PathComparator};
use crate::mapper::PathMapper;
use crate::transcoder::TranscodingPath;
use crate::types::AbsolutePath;

#[derive(Debug, thiserror::Error)]
pub enum SyncAlgorithmError {
    #[error("source path {path} is not within the source base directory {base}")]
    SourcePathOutOfBase { path: AbsolutePath, base: AbsolutePath },
}

/// Why a source could not be placed in `will_transfer`.
#[derive(Debug, thiserror::Error)]
pub enum TransferFailure {
    #[error("no policy-accepted transcoding pipeline exists for this source")]
    NoPipeline,

    #[error("would overwrite the same destination as {predecessor}")]
    Conflict { predecessor: AbsolutePath },

    #[error(transparent)]
    Comparator(#[from] ComparatorError),
}

/// An object capable of finding the ranked, policy-filtered transcoding
/// pipelines for a source path. Implemented by the transcoding mapper (which
/// wraps C3's planner and C4's policy selector behind a cache).
pub trait TranscodingPathLookup {
    fn lookup(&self, src: &AbsolutePath) -> Result<Vec<TranscodingPath>, TransferFailure>;
}

/// `(source_abs, target_abs, chosen pipeline)`.
pub type TransferItem = (AbsolutePath, AbsolutePath, TranscodingPath);

/// The computed synchronization plan. Pure data: consumed, never mutated, by
/// the execution, rewrite, and deletion phases.
#[derive(Debug)]
pub struct Plan {
    pub will_transfer: Vec<TransferItem>,
    pub cannot_transfer: Vec<(AbsolutePath, TransferFailure)>,
    pub already_transferred: Vec<(AbsolutePath, AbsolutePath)>,
    pub will_delete: Vec<AbsolutePath>,
}

/// Computes a [`Plan`] from source files, a target scan, path mappers, a
/// pipeline lookup, a modtime comparator, and exclusion prefixes.
///
/// `source_files` is deduplicated by exact equality but otherwise processed in
/// order; all ordering guarantees documented on [`Plan`]'s fields are upheld.
#[allow(clippy::too_many_arguments)]
pub fn compute_synchronization(
    source_files: &[AbsolutePath],
    source_basedir: &AbsolutePath,
    target_files: &[AbsolutePath],
    target_basedir: &AbsolutePath,
    source_mappers: &[Box<dyn PathMapper>],
    target_mappers: &[Box<dyn PathMapper>],
    transcode_pather: &dyn TranscodingPathLookup,
    comparator: &dyn PathComparator,
    exclude_beneath: &[AbsolutePath],
) -> Result<Plan, SyncAlgorithmError> {
    let is_excluded = |path: &AbsolutePath| exclude_beneath.iter().any(|prefix| path.is_within(prefix));

    let mut pending_deletion: Vec<AbsolutePath> = Vec::new();
    for target in target_files {
        let mapped = apply_mappers(target_mappers, target);
        if !is_excluded(&mapped) {
            pending_deletion.push(mapped);
        }
    }

    let mut will_transfer: Vec<TransferItem> = Vec::new();
    let mut cannot_transfer: Vec<(AbsolutePath, TransferFailure)> = Vec::new();
    let mut already_transferred: Vec<(AbsolutePath, AbsolutePath)> = Vec::new();
    let mut reserved_targets: HashMap<AbsolutePath, AbsolutePath> = HashMap::new();
    let mut seen_sources: Vec<&AbsolutePath> = Vec::new();

    'sources: for src in source_files {
        if seen_sources.contains(&src) {
            continue;
        }
        seen_sources.push(src);

        if !src.is_within(source_basedir) {
            return Err(SyncAlgorithmError::SourcePathOutOfBase {
                path: src.clone(),
                base: source_basedir.clone(),
            });
        }

        let s_mapped = apply_mappers(source_mappers, src);

        let chosen = match transcode_pather.lookup(src) {
            Ok(paths) if !paths.is_empty() => paths.into_iter().next().unwrap(),
            Ok(_) => {
                cannot_transfer.push((src.clone(), TransferFailure::NoPipeline));
                continue 'sources;
            }
            Err(err) => {
                cannot_transfer.push((src.clone(), err));
                continue 'sources;
            }
        };

        let rel = match s_mapped.relative_to(source_basedir) {
            Some(rel) => rel,
            None => {
                return Err(SyncAlgorithmError::SourcePathOutOfBase {
                    path: src.clone(),
                    base: source_basedir.clone(),
                })
            }
        };
        let rel = rel.with_extension(chosen.dsttype().as_str());
        let absp = target_basedir.join(&rel);
        let tgt = apply_mappers(target_mappers, &absp);

        if is_excluded(&tgt) {
            continue 'sources;
        }

        if let Some(predecessor) = reserved_targets.get(&tgt) {
            cannot_transfer.push((
                src.clone(),
                TransferFailure::Conflict {
                    predecessor: predecessor.clone(),
                },
            ));
            continue 'sources;
        }

        match comparator.compare(src, &tgt) {
            Ok(verdict) if verdict > 0 => {
                reserved_targets.insert(tgt.clone(), src.clone());
                will_transfer.push((src.clone(), tgt.clone(), chosen));
            }
            Ok(_) => {
                already_transferred.push((src.clone(), tgt.clone()));
            }
            Err(err) => {
                cannot_transfer.push((src.clone(), TransferFailure::Comparator(err)));
                continue 'sources;
            }
        }

        pending_deletion.retain(|p| p != &tgt);
    }

    Ok(Plan {
        will_transfer,
        cannot_transfer,
        already_transferred,
        will_delete: pending_deletion,
    })
}

fn apply_mappers(mappers: &[Box<dyn PathMapper>], path: &AbsolutePath) -> AbsolutePath {
    mappers.iter().fold(path.clone(), |acc, mapper| mapper.map(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::SourceAlwaysNewer;
    use crate::transcoder::copy::CopyTranscoder;
    use crate::transcoder::{Transcoder, TranscodingStep};
    use std::sync::Arc;

    fn identity_path(p: &str) -> AbsolutePath {
        AbsolutePath::new(p).unwrap()
    }

    fn copy_path_for(src: &AbsolutePath) -> TranscodingPath {
        let file_type = crate::types::FileType::from_path(src);
        TranscodingPath::new(
            1,
            vec![TranscodingStep {
                srctype: file_type.clone(),
                dsttype: file_type,
                transcoder_name: Arc::from("copy"),
                transcoder: Arc::new(CopyTranscoder),
            }],
        )
    }

    struct AlwaysCopy;
    impl TranscodingPathLookup for AlwaysCopy {
        fn lookup(&self, src: &AbsolutePath) -> Result<Vec<TranscodingPath>, TransferFailure> {
            Ok(vec![copy_path_for(src)])
        }
    }

    struct NeverFound;
    impl TranscodingPathLookup for NeverFound {
        fn lookup(&self, _src: &AbsolutePath) -> Result<Vec<TranscodingPath>, TransferFailure> {
            Ok(vec![])
        }
    }

    #[test]
    fn empty_inputs_produce_empty_plan() {
        let plan = compute_synchronization(
            &[],
            &identity_path("/src"),
            &[],
            &identity_path("/dst"),
            &[],
            &[],
            &AlwaysCopy,
            &SourceAlwaysNewer,
            &[],
        )
        .unwrap();
        assert!(plan.will_transfer.is_empty());
        assert!(plan.cannot_transfer.is_empty());
        assert!(plan.already_transferred.is_empty());
        assert!(plan.will_delete.is_empty());
    }

    #[test]
    fn absent_in_target_is_transferred() {
        let sources = vec![identity_path("/src/a.mp3")];
        let plan = compute_synchronization(
            &sources,
            &identity_path("/src"),
            &[],
            &identity_path("/dst"),
            &[],
            &[],
            &AlwaysCopy,
            &SourceAlwaysNewer,
            &[],
        )
        .unwrap();
        assert_eq!(plan.will_transfer.len(), 1);
        assert_eq!(plan.will_transfer[0].1, identity_path("/dst/a.mp3"));
    }

    #[test]
    fn stale_target_is_marked_for_deletion() {
        let targets = vec![identity_path("/dst/stale.mp3")];
        let plan = compute_synchronization(
            &[],
            &identity_path("/src"),
            &targets,
            &identity_path("/dst"),
            &[],
            &[],
            &AlwaysCopy,
            &SourceAlwaysNewer,
            &[],
        )
        .unwrap();
        assert_eq!(plan.will_delete, vec![identity_path("/dst/stale.mp3")]);
    }

    #[test]
    fn excluded_target_is_neither_deleted_nor_transferred() {
        let targets = vec![identity_path("/dst/Playlists/foo.m3u")];
        let plan = compute_synchronization(
            &[],
            &identity_path("/src"),
            &targets,
            &identity_path("/dst"),
            &[],
            &[],
            &AlwaysCopy,
            &SourceAlwaysNewer,
            &[identity_path("/dst/Playlists")],
        )
        .unwrap();
        assert!(plan.will_delete.is_empty());
    }

    #[test]
    fn no_pipeline_is_recorded_as_cannot_transfer() {
        let sources = vec![identity_path("/src/a.xyz")];
        let plan = compute_synchronization(
            &sources,
            &identity_path("/src"),
            &[],
            &identity_path("/dst"),
            &[],
            &[],
            &NeverFound,
            &SourceAlwaysNewer,
            &[],
        )
        .unwrap();
        assert_eq!(plan.cannot_transfer.len(), 1);
        assert!(matches!(plan.cannot_transfer[0].1, TransferFailure::NoPipeline));
    }

    #[test]
    fn source_out_of_basedir_is_rejected() {
        let sources = vec![identity_path("/other/a.mp3")];
        let err = compute_synchronization(
            &sources,
            &identity_path("/src"),
            &[],
            &identity_path("/dst"),
            &[],
            &[],
            &AlwaysCopy,
            &SourceAlwaysNewer,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, SyncAlgorithmError::SourcePathOutOfBase { .. }));
    }

    #[test]
    fn duplicate_sources_are_only_processed_once() {
        let sources = vec![identity_path("/src/a.mp3"), identity_path("/src/a.mp3")];
        let plan = compute_synchronization(
            &sources,
            &identity_path("/src"),
            &[],
            &identity_path("/dst"),
            &[],
            &[],
            &AlwaysCopy,
            &SourceAlwaysNewer,
            &[],
        )
        .unwrap();
        assert_eq!(plan.will_transfer.len(), 1);
    }
}
