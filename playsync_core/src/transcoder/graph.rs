//! Pipeline discovery (C3): build a directed multigraph of reachable file
//! types from a source path and enumerate every simple path to each reachable
//! type, then price and rank those paths.
//!
//! Grounded in `transcoding/registry.py`'s `map_pipelines`: types are
//! explored breadth-first by probing every registered transcoder against a
//! synthetic path with the candidate extension, since transcoders only look
//! at a path's extension and (optionally) its contents to decide what they
//! can produce.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::types::{AbsolutePath, FileType};

use super::copy::COPY_TRANSCODER_NAME;
use super::registry::TranscoderRegistry;
use super::{TranscodingPath, TranscodingStep};

#[derive(Clone)]
struct Edge {
    to: FileType,
    transcoder_name: Arc<str>,
    transcoder: Arc<dyn super::Transcoder>,
}

/// The multigraph of file types reachable from a single source path, with a
/// guaranteed self-loop on the source type via the copy transcoder.
struct TypeGraph {
    edges: HashMap<FileType, Vec<Edge>>,
    explored: HashSet<FileType>,
}

impl TypeGraph {
    fn build(registry: &TranscoderRegistry, src: &AbsolutePath, srctype: &FileType) -> Self {
        let mut edges: HashMap<FileType, Vec<Edge>> = HashMap::new();
        let mut explored = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(srctype.clone());
        let mut queued: HashSet<FileType> = HashSet::from([srctype.clone()]);

        let parent = src.parent().unwrap_or_else(|| src.clone());
        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        while let Some(current) = queue.pop_front() {
            let probe = parent.join(format!("{stem}.{current}"));

            for (name, transcoder) in registry.iter() {
                for dsttype in transcoder.can_transcode(&probe) {
                    edges.entry(current.clone()).or_default().push(Edge {
                        to: dsttype.clone(),
                        transcoder_name: Arc::from(name),
                        transcoder: transcoder.clone(),
                    });
                    if queued.insert(dsttype.clone()) {
                        queue.push_back(dsttype);
                    }
                }
            }

            explored.insert(current);
        }

        // Guarantee a self-loop via copy, even if the copy transcoder's
        // can_transcode probe above didn't fire for this extension.
        if let Some(copy_transcoder) = registry.get(COPY_TRANSCODER_NAME) {
            let has_self_copy = edges.get(srctype).map_or(false, |es| {
                es.iter()
                    .any(|e| e.to == *srctype && e.transcoder_name.as_ref() == COPY_TRANSCODER_NAME)
            });
            if !has_self_copy {
                edges.entry(srctype.clone()).or_default().push(Edge {
                    to: srctype.clone(),
                    transcoder_name: Arc::from(COPY_TRANSCODER_NAME),
                    transcoder: copy_transcoder,
                });
            }
        }
        explored.insert(srctype.clone());

        TypeGraph { edges, explored }
    }

    /// Enumerates every simple (no repeated node) edge path from `from` to `to`.
    fn simple_edge_paths(&self, from: &FileType, to: &FileType) -> Vec<Vec<Edge>> {
        let mut results = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        self.dfs(from, to, &mut visited, &mut stack, &mut results);
        results
    }

    fn dfs(
        &self,
        current: &FileType,
        target: &FileType,
        visited: &mut HashSet<FileType>,
        stack: &mut Vec<Edge>,
        results: &mut Vec<Vec<Edge>>,
    ) {
        if current == target && !stack.is_empty() {
            results.push(stack.clone());
            // Still allow longer paths through self-loops elsewhere, but a
            // path that has just arrived at the target is itself a complete
            // path; don't extend past it on this branch.
            return;
        }

        visited.insert(current.clone());
        if let Some(out_edges) = self.edges.get(current) {
            for edge in out_edges {
                if edge.to == *current {
                    // Self-loop: only useful as the sole edge of a path that
                    // starts and ends at the same type (the bare copy),
                    // never as an interior step.
                    if !(stack.is_empty() && current == target) {
                        continue;
                    }
                } else if visited.contains(&edge.to) && edge.to != *target {
                    continue;
                }
                stack.push(edge.clone());
                self.dfs(&edge.to, target, visited, stack, results);
                stack.pop();
            }
        }
        visited.remove(current);
    }
}

/// Discovers every viable [`TranscodingPath`] from `src`'s file type to each
/// type reachable in the registry's transcoder graph, sorted by ascending
/// cost. A pipeline of length greater than one that contains the copy
/// transcoder is discarded: copying never belongs in the middle of, or
/// alongside, a real conversion.
pub fn map_pipelines(registry: &TranscoderRegistry, src: &AbsolutePath) -> Vec<TranscodingPath> {
    let srctype = FileType::from_path(src);
    let graph = TypeGraph::build(registry, src, &srctype);

    let mut paths = Vec::new();
    for dsttype in &graph.explored {
        for edge_path in graph.simple_edge_paths(&srctype, dsttype) {
            if edge_path.len() > 1
                && edge_path
                    .iter()
                    .any(|e| e.transcoder_name.as_ref() == COPY_TRANSCODER_NAME)
            {
                continue;
            }

            let cost: u32 = edge_path.iter().map(|e| e.transcoder.cost()).sum();
            let mut steps = Vec::with_capacity(edge_path.len());
            let mut from = srctype.clone();
            for edge in &edge_path {
                steps.push(TranscodingStep {
                    srctype: from.clone(),
                    dsttype: edge.to.clone(),
                    transcoder_name: edge.transcoder_name.clone(),
                    transcoder: edge.transcoder.clone(),
                });
                from = edge.to.clone();
            }
            paths.push(TranscodingPath::new(cost, steps));
        }
    }

    paths.sort_by_key(|p| p.cost);
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::registry::{ExternalTranscoderFactory, TranscoderFactory, TranscoderRegistry};
    use crate::transcoder::TranscoderSettings;

    fn registry_with(factories: Vec<Box<dyn TranscoderFactory>>) -> TranscoderRegistry {
        TranscoderRegistry::build(&factories, &TranscoderSettings::default()).unwrap()
    }

    #[test]
    fn bare_copy_path_always_exists() {
        let registry = registry_with(vec![]);
        let src = AbsolutePath::new("/music/track.mp3").unwrap();
        let paths = map_pipelines(&registry, &src);
        assert!(paths.iter().any(|p| p.uses_only(COPY_TRANSCODER_NAME)));
    }

    #[test]
    fn chained_pipeline_is_discovered_and_priced() {
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
        let registry = registry_with(factories);
        let src = AbsolutePath::new("/music/track.mp3").unwrap();
        let paths = map_pipelines(&registry, &src);

        let ogg_path = paths
            .iter()
            .find(|p| *p.dsttype() == FileType::by_name("ogg"))
            .expect("mp3 -> wav -> ogg path should be discovered");
        assert_eq!(ogg_path.cost, 7);
        assert_eq!(ogg_path.steps.len(), 2);
    }

    #[test]
    fn paths_are_sorted_by_ascending_cost() {
        let factories: Vec<Box<dyn TranscoderFactory>> = vec![Box::new(ExternalTranscoderFactory {
            name: "mp3_to_ogg_direct".to_string(),
            srctype: FileType::by_name("mp3"),
            dsttype: FileType::by_name("ogg"),
            default_cost: 2,
        })];
        let registry = registry_with(factories);
        let src = AbsolutePath::new("/music/track.mp3").unwrap();
        let paths = map_pipelines(&registry, &src);
        for window in paths.windows(2) {
            assert!(window[0].cost <= window[1].cost);
        }
    }
}
