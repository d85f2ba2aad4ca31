//! Single-item syncer (C9): runs every step of a chosen transcoding path
//! through temp files in the destination directory, then atomically renames
//! the last one into place.
//!
//! Grounded in `transcoding/transcoder.py`'s `SingleItemSyncer.sync` and
//! `files.py`'s `ensure_directories_exist`/`remover`/`shorten_to_name_max`.

use std::fs;
use std::sync::Arc;

use tempfile::{Builder, NamedTempFile};

use crate::globals::ensure_directory_exists;
use crate::transcoder::{TranscodeError, TranscodingPath};
use crate::types::{AbsolutePath, FileType};

#[derive(Debug, thiserror::Error)]
pub enum SyncerError {
    #[error("could not create destination directory: {0}")]
    Mkdir(#[source] std::io::Error),

    #[error("could not create a temporary file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("could not copy permission bits: {0}")]
    CopyPermissions(#[source] std::io::Error),

    #[error("post-processing failed: {0}")]
    Postprocess(String),

    #[error("could not rename temporary output into place: {0}")]
    FinalRename(#[source] std::io::Error),
}

/// Most filesystems this tool targets cap individual filenames at 255 bytes;
/// no crate in the retrieval pack exposes `pathconf(_PC_NAME_MAX)`, so this is
/// a fixed conservative bound rather than a per-filesystem query.
const NAME_MAX: usize = 255;

/// Random bytes `tempfile` appends between prefix and suffix by default.
const TEMP_RANDOM_BYTES: usize = 8;

/// Invoked after the last transcoding step, before the final rename, with
/// `(original_source, final_temp_output, srctype, dsttype)`. Typically copies
/// tags from source to the transcoded output; copying tags themselves is out
/// of scope here, only the callback contract is.
pub type Postprocessor = Arc<
    dyn Fn(&AbsolutePath, &AbsolutePath, &FileType, &FileType) -> Result<(), String> + Send + Sync,
>;

pub fn noop_postprocessor() -> Postprocessor {
    Arc::new(|_src, _temp, _srctype, _dsttype| Ok(()))
}

pub struct SingleItemSyncer {
    postprocessor: Postprocessor,
}

impl SingleItemSyncer {
    pub fn new(postprocessor: Postprocessor) -> Self {
        SingleItemSyncer { postprocessor }
    }

    /// Runs every step of `path` for `(src, dst)`, leaving `dst` as the final
    /// output on success. All intermediate temp files are removed regardless
    /// of outcome: each is owned by a [`NamedTempFile`] guard that unlinks on
    /// drop unless explicitly persisted.
    pub fn sync(&self, src: &AbsolutePath, dst: &AbsolutePath, path: &TranscodingPath) -> Result<(), SyncerError> {
        let dst_parent = dst.parent().expect("destination must have a parent directory");
        ensure_directory_exists(dst_parent.as_path()).map_err(SyncerError::Mkdir)?;

        let dst_stem = dst
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut current_input = src.clone();
        let mut held_temp: Option<NamedTempFile> = None;

        for (index, step) in path.steps.iter().enumerate() {
            let is_last = index + 1 == path.steps.len();
            let suffix = format!(".{}", step.dsttype);
            let prefix = shorten_prefix(&format!(".tmp-{}-{}", step.transcoder_name, dst_stem), &suffix);

            let temp = Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .rand_bytes(TEMP_RANDOM_BYTES)
                .tempfile_in(dst_parent.as_path())
                .map_err(SyncerError::TempFile)?;
            let temp_path = AbsolutePath::new(temp.path().to_path_buf())
                .expect("tempfile paths are created under an absolute directory");

            step.transcode(&current_input, &temp_path)?;
            copy_permissions(&current_input, &temp_path)?;

            if is_last {
                (self.postprocessor)(src, &temp_path, path.srctype(), path.dsttype())
                    .map_err(SyncerError::Postprocess)?;
                temp.persist(dst.as_path()).map_err(|e| SyncerError::FinalRename(e.error))?;
                held_temp = None;
            } else {
                current_input = temp_path;
                held_temp = Some(temp);
            }
        }

        drop(held_temp);
        Ok(())
    }
}

fn copy_permissions(from: &AbsolutePath, to: &AbsolutePath) -> Result<(), SyncerError> {
    let metadata = fs::metadata(from.as_path()).map_err(SyncerError::CopyPermissions)?;
    fs::set_permissions(to.as_path(), metadata.permissions()).map_err(SyncerError::CopyPermissions)
}

/// Trims `prefix` so that `prefix.len() + suffix.len() + TEMP_RANDOM_BYTES`
/// fits within `NAME_MAX`.
fn shorten_prefix(prefix: &str, suffix: &str) -> String {
    let budget = NAME_MAX.saturating_sub(suffix.len() + TEMP_RANDOM_BYTES);
    if prefix.len() <= budget {
        prefix.to_string()
    } else {
        prefix.chars().take(budget).collect()
    }
}
