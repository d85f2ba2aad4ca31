//! Policy-based pipeline selection (C4): narrows the full set of discovered
//! [`TranscodingPath`]s down to the ones an operator's configuration allows,
//! in policy order, falling back to an unconstrained "anything goes" policy.
//!
//! Grounded in `transcoding/policies.py`'s module-level `select_pipelines`
//! and `PolicyBasedPipelineSelector`.

use crate::transcoder::{TranscoderPolicies, TranscoderPolicy, TranscodingPath};
use crate::types::FileType;

/// Filters `paths` down to those matching `srctype` and, if given, a required
/// destination-type chain and/or an exact pipeline (ordered list of
/// transcoder names).
fn select_pipelines(
    paths: &[TranscodingPath],
    srctype: &FileType,
    dsttypes: &[FileType],
    pipeline: Option<&[String]>,
) -> Vec<TranscodingPath> {
    paths
        .iter()
        .filter(|p| p.srctype() == srctype)
        .filter(|p| {
            if dsttypes.is_empty() {
                return true;
            }
            let mut chain: Vec<FileType> = p.steps.iter().map(|s| s.srctype.clone()).collect();
            chain.push(p.dsttype().clone());

            let last_matches = dsttypes.last() == chain.last();
            let first_in_chain = if dsttypes.len() > 1 {
                chain[..chain.len() - 1].contains(&dsttypes[0])
            } else {
                true
            };
            last_matches && first_in_chain
        })
        .filter(|p| match pipeline {
            None => true,
            Some(names) => {
                p.steps.len() == names.len()
                    && p.steps
                        .iter()
                        .zip(names)
                        .all(|(step, name)| step.transcoder_name.as_ref() == name.as_str())
            }
        })
        .cloned()
        .collect()
}

/// Selects pipelines by consulting an ordered list of policies, in order,
/// optionally falling back to an unconstrained policy when none match.
pub struct PolicyBasedPipelineSelector {
    policies: TranscoderPolicies,
    allow_fallback: bool,
}

impl PolicyBasedPipelineSelector {
    pub fn new(policies: TranscoderPolicies, allow_fallback: bool) -> Self {
        PolicyBasedPipelineSelector {
            policies,
            allow_fallback,
        }
    }

    /// Returns the first non-empty selection produced by trying each matching
    /// policy in order. `dsttype` only narrows which policies match in the
    /// first place; once a policy is chosen, its own `destination_chain()`
    /// governs the destination types paths must pass through.
    pub fn select_pipelines(
        &self,
        paths: &[TranscodingPath],
        srctype: &FileType,
        dsttype: Option<&FileType>,
        pipeline: Option<&[String]>,
    ) -> Vec<TranscodingPath> {
        let mut candidates: Vec<&TranscoderPolicy> = self.policies.matching(srctype, dsttype);

        let fallback = TranscoderPolicy::fallback();
        if self.allow_fallback {
            candidates.push(&fallback);
        }

        for policy in candidates {
            let dsttypes = policy.destination_chain();

            let limit_to_pipeline: Option<Vec<String>> = pipeline
                .map(|p| p.to_vec())
                .or_else(|| (!policy.pipeline.is_empty()).then(|| policy.pipeline.clone()));

            let selected = select_pipelines(
                paths,
                srctype,
                &dsttypes,
                limit_to_pipeline.as_deref(),
            );
            if !selected.is_empty() {
                return selected;
            }
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::TranscoderSettings;
    use crate::transcoder::registry::{ExternalTranscoderFactory, TranscoderFactory, TranscoderRegistry};
    use crate::transcoder::graph::map_pipelines;
    use crate::types::AbsolutePath;

    fn sample_paths() -> Vec<TranscodingPath> {
        let factories: Vec<Box<dyn TranscoderFactory>> = vec![
            Box::new(ExternalTranscoderFactory {
                name: "mp3_to_wav".to_string(),
                srctype: FileType::by_name("mp3"),
                dsttype: FileType::by_name("wav"),
                default_cost: 3,
            }),
            Box::new(ExternalTranscoderFactory {
                name: "wav_to_ogg".to_string(),
                srctype: FileType::by_name("wav"),
                dsttype: FileType::by_name("ogg"),
                default_cost: 4,
            }),
        ];
        let registry = TranscoderRegistry::build(&factories, &TranscoderSettings::default()).unwrap();
        let src = AbsolutePath::new("/music/track.mp3").unwrap();
        map_pipelines(&registry, &src)
    }

    #[test]
    fn fallback_policy_allows_any_pipeline() {
        let paths = sample_paths();
        let selector = PolicyBasedPipelineSelector::new(TranscoderPolicies::new(vec![]), true);
        let selected = selector.select_pipelines(&paths, &FileType::by_name("mp3"), None, None);
        assert!(!selected.is_empty());
    }

    #[test]
    fn no_fallback_and_no_policies_selects_nothing() {
        let paths = sample_paths();
        let selector = PolicyBasedPipelineSelector::new(TranscoderPolicies::new(vec![]), false);
        let selected = selector.select_pipelines(&paths, &FileType::by_name("mp3"), None, None);
        assert!(selected.is_empty());
    }

    #[test]
    fn policy_restricts_destination_type() {
        let paths = sample_paths();
        let policy = TranscoderPolicy {
            source: Some(FileType::wildcard()),
            target: Some(FileType::by_name("ogg")),
            transcode_to: None,
            pipeline: Vec::new(),
        };
        let selector = PolicyBasedPipelineSelector::new(TranscoderPolicies::new(vec![policy]), false);
        let selected = selector.select_pipelines(&paths, &FileType::by_name("mp3"), None, None);
        assert!(selected.iter().all(|p| *p.dsttype() == FileType::by_name("ogg")));
        assert!(!selected.is_empty());
    }

    #[test]
    fn explicit_pipeline_override_matches_exact_transcoder_chain() {
        let paths = sample_paths();
        let selector = PolicyBasedPipelineSelector::new(TranscoderPolicies::new(vec![]), true);
        let pipeline = vec!["mp3_to_wav".to_string(), "wav_to_ogg".to_string()];
        let selected = selector.select_pipelines(
            &paths,
            &FileType::by_name("mp3"),
            None,
            Some(&pipeline),
        );
        assert_eq!(selected.len(), 1);
        assert!(!selected[0].uses_only("mp3_to_wav"));
    }
}
