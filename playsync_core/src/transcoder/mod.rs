//! Transcoder capability contract (C2 data model) and the chained-path types
//! the planner (C3) and policy selector (C4) operate on.

pub mod copy;
pub mod external;
pub mod graph;
pub mod registry;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::types::{AbsolutePath, FileType};

/// A named unit of work that converts one file type to another.
///
/// Implementors must be safe to share across the worker pool: `transcode` runs
/// on a pool thread while `can_transcode` may run on the planning thread.
pub trait Transcoder: Send + Sync {
    /// The cost contributed to any path that uses this transcoder. Must be positive.
    fn cost(&self) -> u32;

    /// The set of output types this transcoder would produce for `src`.
    ///
    /// `src` may be a synthetic probe path (same parent/stem as the real
    /// input, but a different extension) used purely to let this method
    /// inspect the requested source extension; transcoders that need to open
    /// the actual file should check `src.is_file()` first and return an
    /// empty list when the file does not exist.
    fn can_transcode(&self, src: &AbsolutePath) -> Vec<FileType>;

    /// Performs the conversion. Implementations should treat `dst` as a
    /// freshly created (but possibly zero-length) file to overwrite.
    fn transcode(&self, src: &AbsolutePath, dst: &AbsolutePath) -> Result<(), TranscodeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("failed to spawn transcoder process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("transcoder process exited with status {0}")]
    NonZeroExit(std::process::ExitStatus),

    #[error("transcoder produced an empty output file")]
    EmptyOutput,

    #[error("transcoding was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single step of a [`TranscodingPath`]: convert `srctype` to `dsttype` using
/// the transcoder registered under `transcoder_name`.
#[derive(Clone)]
pub struct TranscodingStep {
    pub srctype: FileType,
    pub dsttype: FileType,
    pub transcoder_name: Arc<str>,
    pub(crate) transcoder: Arc<dyn Transcoder>,
}

impl TranscodingStep {
    pub fn transcode(&self, src: &AbsolutePath, dst: &AbsolutePath) -> Result<(), TranscodeError> {
        self.transcoder.transcode(src, dst)
    }
}

impl fmt::Debug for TranscodingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --({})--> {}",
            self.srctype, self.transcoder_name, self.dsttype
        )
    }
}

/// A chained sequence of [`TranscodingStep`]s whose intermediate types match up.
///
/// Two paths are equal iff their string renderings (`Debug`/`Display`) match,
/// mirroring the original's string-identity equality.
#[derive(Clone)]
pub struct TranscodingPath {
    pub cost: u32,
    pub steps: Vec<TranscodingStep>,
}

impl TranscodingPath {
    /// Builds a path, asserting the invariant that adjacent steps share a type.
    /// Panics on an empty `steps` vector or a broken chain: both indicate a
    /// programmer error in the planner, never user input.
    pub fn new(cost: u32, steps: Vec<TranscodingStep>) -> Self {
        assert!(
            !steps.is_empty(),
            "a TranscodingPath must have at least one step"
        );
        for window in steps.windows(2) {
            assert_eq!(
                window[0].dsttype, window[1].srctype,
                "TranscodingPath steps must chain: {:?} -> {:?}",
                window[0], window[1]
            );
        }
        TranscodingPath { cost, steps }
    }

    pub fn srctype(&self) -> &FileType {
        &self.steps[0].srctype
    }

    pub fn dsttype(&self) -> &FileType {
        &self.steps.last().expect("non-empty steps").dsttype
    }

    pub fn uses_only(&self, transcoder_name: &str) -> bool {
        self.steps.len() == 1 && self.steps[0].transcoder_name.as_ref() == transcoder_name
    }
}

impl fmt::Debug for TranscodingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{step:?}")?;
        }
        write!(f, ">")
    }
}

impl fmt::Display for TranscodingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PartialEq for TranscodingPath {
    fn eq(&self, other: &Self) -> bool {
        format!("{self:?}") == format!("{other:?}")
    }
}

impl Eq for TranscodingPath {}

/// An options-map passed to a transcoder factory. Transcoder-specific, opaque
/// to everything else.
pub type TranscoderOptions = serde_yaml_ish::Mapping;

/// To avoid pulling `serde_yaml` into the core crate (config loading is
/// `playsync_config`'s job), the options map is represented as a generic
/// string-keyed JSON-like value tree that both `serde_yaml` and `serde_json`
/// can deserialize into.
pub mod serde_yaml_ish {
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Deserialize, Default)]
    #[serde(transparent)]
    pub struct Mapping(pub BTreeMap<String, Value>);

    #[derive(Debug, Clone, Deserialize)]
    #[serde(untagged)]
    pub enum Value {
        Null,
        Bool(bool),
        Int(i64),
        Float(f64),
        String(String),
        Sequence(Vec<Value>),
        Mapping(BTreeMap<String, Value>),
    }

    impl Mapping {
        pub fn get_str(&self, key: &str) -> Option<&str> {
            match self.0.get(key) {
                Some(Value::String(s)) => Some(s.as_str()),
                _ => None,
            }
        }

        pub fn get_sequence_of_strings(&self, key: &str) -> Option<Vec<String>> {
            match self.0.get(key) {
                Some(Value::Sequence(items)) => Some(
                    items
                        .iter()
                        .filter_map(|v| match v {
                            Value::String(s) => Some(s.clone()),
                            _ => None,
                        })
                        .collect(),
                ),
                _ => None,
            }
        }

        pub fn get_u32(&self, key: &str) -> Option<u32> {
            match self.0.get(key) {
                Some(Value::Int(i)) => u32::try_from(*i).ok(),
                _ => None,
            }
        }
    }
}

/// A mapping from transcoder-name to options-map, as loaded from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct TranscoderSettings(HashMap<String, TranscoderOptions>);

impl TranscoderSettings {
    pub fn new(settings: HashMap<String, TranscoderOptions>) -> Self {
        // Transcoder names are matched case-insensitively against lowercase
        // registry keys, so normalize eagerly.
        let lowered = settings
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        TranscoderSettings(lowered)
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|s| s.as_str())
    }

    pub fn for_name(&self, name: &str) -> TranscoderOptions {
        self.0.get(name).cloned().unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

/// An optional policy constraint matched against a `(srctype, dsttype)` query
/// during pipeline selection (C4).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscoderPolicy {
    pub source: Option<FileType>,
    pub target: Option<FileType>,
    pub transcode_to: Option<FileType>,
    #[serde(default)]
    pub pipeline: Vec<String>,
}

impl TranscoderPolicy {
    /// A policy that matches every `(srctype, dsttype)` combination and
    /// imposes no pipeline or destination-type constraint.
    pub fn fallback() -> Self {
        TranscoderPolicy {
            source: Some(FileType::wildcard()),
            target: None,
            transcode_to: None,
            pipeline: Vec::new(),
        }
    }

    pub fn matches(&self, srctype: &FileType, dsttype: Option<&FileType>) -> bool {
        let wildcard = FileType::wildcard();

        let match_src = match &self.source {
            None => true,
            Some(s) => s == &wildcard || s == srctype,
        };

        let match_dst = match (&self.target, dsttype) {
            (None, _) => true,
            (Some(t), _) if t == &wildcard => true,
            (Some(_), None) => true,
            (Some(t), Some(d)) => t == d || self.transcode_to.as_ref() == Some(d),
        };

        match_src && match_dst
    }

    /// The ordered chain of destination types a surviving path's steps must
    /// pass through, per §4.4 step 2.
    pub fn destination_chain(&self) -> Vec<FileType> {
        match (&self.transcode_to, &self.target) {
            (Some(via), Some(target)) => vec![target.clone(), via.clone()],
            (Some(via), None) => vec![via.clone()],
            (None, Some(target)) => vec![target.clone()],
            (None, None) => Vec::new(),
        }
    }
}

/// An ordered list of [`TranscoderPolicy`]; first match wins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct TranscoderPolicies(pub Vec<TranscoderPolicy>);

impl TranscoderPolicies {
    pub fn new(policies: Vec<TranscoderPolicy>) -> Self {
        TranscoderPolicies(policies)
    }

    pub fn matching(&self, srctype: &FileType, dsttype: Option<&FileType>) -> Vec<&TranscoderPolicy> {
        self.0.iter().filter(|p| p.matches(srctype, dsttype)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_matches_wildcard_source() {
        let policy = TranscoderPolicy {
            source: Some(FileType::wildcard()),
            target: Some(FileType::by_name("ogg")),
            transcode_to: None,
            pipeline: Vec::new(),
        };
        assert!(policy.matches(&FileType::by_name("flac"), Some(&FileType::by_name("ogg"))));
        assert!(!policy.matches(&FileType::by_name("flac"), Some(&FileType::by_name("mp3"))));
    }

    #[test]
    fn policy_matches_via_transcode_to() {
        let policy = TranscoderPolicy {
            source: None,
            target: None,
            transcode_to: Some(FileType::by_name("wav")),
            pipeline: Vec::new(),
        };
        assert!(policy.matches(&FileType::by_name("flac"), Some(&FileType::by_name("wav"))));
    }

    #[test]
    fn destination_chain_variants() {
        let both = TranscoderPolicy {
            source: None,
            target: Some(FileType::by_name("ogg")),
            transcode_to: Some(FileType::by_name("wav")),
            pipeline: Vec::new(),
        };
        assert_eq!(
            both.destination_chain(),
            vec![FileType::by_name("ogg"), FileType::by_name("wav")]
        );

        let neither = TranscoderPolicy::default();
        assert!(neither.destination_chain().is_empty());
    }
}
