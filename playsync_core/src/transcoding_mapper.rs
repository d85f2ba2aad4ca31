//! Glues the planner (C3) and policy selector (C4) behind the cached
//! `lookup` contract C7 consults, and derives the renamed destination path
//! for a chosen pipeline's output type.
//!
//! Grounded in `transcoding/transcoder.py`'s `TranscodingMapper`:
//! double-checked-locking pipeline cache, `map`/`lookup`/`lookup_with_graph`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::policy::PolicyBasedPipelineSelector;
use crate::sync_algorithm::{TransferFailure, TranscodingPathLookup};
use crate::transcoder::graph::map_pipelines;
use crate::transcoder::registry::TranscoderRegistry;
use crate::transcoder::TranscodingPath;
use crate::types::{AbsolutePath, FileType};

pub struct TranscodingMapper {
    registry: Arc<TranscoderRegistry>,
    selector: PolicyBasedPipelineSelector,
    cache: RwLock<HashMap<AbsolutePath, Vec<TranscodingPath>>>,
}

impl TranscodingMapper {
    pub fn new(registry: Arc<TranscoderRegistry>, selector: PolicyBasedPipelineSelector) -> Self {
        TranscodingMapper {
            registry,
            selector,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Read-through-then-insert: a cache miss computes and selects pipelines
    /// outside the write lock, then stores the result. A benign race with a
    /// concurrent miss for the same path just recomputes harmlessly.
    fn feed_cache(&self, path: &AbsolutePath) -> Vec<TranscodingPath> {
        if let Some(cached) = self.cache.read().get(path) {
            return cached.clone();
        }

        let srctype = FileType::from_path(path);
        let all_paths = map_pipelines(&self.registry, path);
        let selected = self.selector.select_pipelines(&all_paths, &srctype, None, None);

        self.cache.write().insert(path.clone(), selected.clone());
        selected
    }

    /// An uncached entry point for a caller that wants to narrow which policy
    /// is consulted via `dsttype` and/or require an exact `pipeline`. As in
    /// [`PolicyBasedPipelineSelector::select_pipelines`], `dsttype` only
    /// affects which policy matches; the matched policy's own
    /// `destination_chain()` still governs the destination types returned.
    pub fn lookup_with_graph(
        &self,
        path: &AbsolutePath,
        dsttype: Option<&FileType>,
        pipeline: Option<&[String]>,
    ) -> Vec<TranscodingPath> {
        let srctype = FileType::from_path(path);
        let all_paths = map_pipelines(&self.registry, path);
        self.selector.select_pipelines(&all_paths, &srctype, dsttype, pipeline)
    }

    /// The mapped destination path `map_pipelines`' cheapest surviving
    /// pipeline would produce for `path`: same parent and stem, extension
    /// swapped to the chosen pipeline's destination type.
    pub fn map(&self, path: &AbsolutePath) -> Result<AbsolutePath, TransferFailure> {
        let selected = self.feed_cache(path);
        let chosen = selected.first().ok_or(TransferFailure::NoPipeline)?;
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let parent = path.parent().unwrap_or_else(|| path.clone());
        Ok(parent.join(format!("{stem}.{}", chosen.dsttype())))
    }
}

impl TranscodingPathLookup for TranscodingMapper {
    fn lookup(&self, src: &AbsolutePath) -> Result<Vec<TranscodingPath>, TransferFailure> {
        Ok(self.feed_cache(src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::registry::{ExternalTranscoderFactory, TranscoderFactory};
    use crate::transcoder::{TranscoderPolicies, TranscoderSettings};

    fn mapper_with_flac_to_wav() -> TranscodingMapper {
        let factories: Vec<Box<dyn TranscoderFactory>> = vec![Box::new(ExternalTranscoderFactory {
            name: "flac_to_wav".to_string(),
            srctype: FileType::by_name("flac"),
            dsttype: FileType::by_name("wav"),
            default_cost: 5,
        })];
        let registry = Arc::new(TranscoderRegistry::build(&factories, &TranscoderSettings::default()).unwrap());
        let selector = PolicyBasedPipelineSelector::new(TranscoderPolicies::new(vec![]), true);
        TranscodingMapper::new(registry, selector)
    }

    #[test]
    fn map_prefers_cheapest_pipeline() {
        let mapper = mapper_with_flac_to_wav();
        let path = AbsolutePath::new("/music/track.flac").unwrap();
        let mapped = mapper.map(&path).unwrap();
        // bare copy (cost 1) beats flac_to_wav (cost 5): cheapest surviving
        // path is still a same-type copy unless a policy forces otherwise.
        assert_eq!(mapped, AbsolutePath::new("/music/track.flac").unwrap());
    }

    #[test]
    fn lookup_with_graph_dsttype_selects_matching_policy() {
        let factories: Vec<Box<dyn TranscoderFactory>> = vec![
            Box::new(ExternalTranscoderFactory {
                name: "mp3_to_wav".to_string(),
                srctype: FileType::by_name("mp3"),
                dsttype: FileType::by_name("wav"),
                default_cost: 3,
            }),
            Box::new(ExternalTranscoderFactory {
                name: "mp3_to_ogg".to_string(),
                srctype: FileType::by_name("mp3"),
                dsttype: FileType::by_name("ogg"),
                default_cost: 3,
            }),
        ];
        let registry = Arc::new(TranscoderRegistry::build(&factories, &TranscoderSettings::default()).unwrap());
        let policies = TranscoderPolicies::new(vec![
            crate::transcoder::TranscoderPolicy {
                source: Some(FileType::wildcard()),
                target: Some(FileType::by_name("wav")),
                transcode_to: None,
                pipeline: Vec::new(),
            },
            crate::transcoder::TranscoderPolicy {
                source: Some(FileType::wildcard()),
                target: Some(FileType::by_name("ogg")),
                transcode_to: None,
                pipeline: Vec::new(),
            },
        ]);
        let selector = PolicyBasedPipelineSelector::new(policies, false);
        let mapper = TranscodingMapper::new(registry, selector);
        let path = AbsolutePath::new("/music/track.mp3").unwrap();

        let via_ogg_policy = mapper.lookup_with_graph(&path, Some(&FileType::by_name("ogg")), None);
        assert!(via_ogg_policy.iter().all(|p| *p.dsttype() == FileType::by_name("ogg")));
        assert!(!via_ogg_policy.is_empty());

        let via_wav_policy = mapper.lookup_with_graph(&path, Some(&FileType::by_name("wav")), None);
        assert!(via_wav_policy.iter().all(|p| *p.dsttype() == FileType::by_name("wav")));
        assert!(!via_wav_policy.is_empty());
    }

    #[test]
    fn repeated_lookup_uses_cache() {
        let mapper = mapper_with_flac_to_wav();
        let path = AbsolutePath::new("/music/track.flac").unwrap();
        let first = mapper.lookup(&path).unwrap();
        let second = mapper.lookup(&path).unwrap();
        assert_eq!(first.len(), second.len());
    }
}
