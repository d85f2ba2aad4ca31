//! Modtime comparison (C6): decides whether a source file is newer than its
//! already-mapped destination counterpart, honoring VFAT's 2-second modtime
//! resolution where either side of the comparison lives on a VFAT-family
//! filesystem.
//!
//! Grounded in `sync/algo.py`'s `vfatcompare`, `ModTimestampComparer`, and
//! `SourceAlwaysNewer`.

use std::sync::Arc;
use std::time::SystemTime;

use crate::mapper::fstype::MountTable;
use crate::types::AbsolutePath;

#[derive(Debug, thiserror::Error)]
pub enum ComparatorError {
    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: AbsolutePath,
        #[source]
        source: std::io::Error,
    },
}

/// Compares a source path against a destination path and decides whether the
/// source should be (re)transferred.
pub trait PathComparator: Send + Sync {
    /// Returns `1` if `src` should be transferred over `tgt`, `0` if they are
    /// considered equivalent, `-1` if `tgt` is newer (never acted on, but kept
    /// for parity with a full three-way comparator).
    fn compare(&self, src: &AbsolutePath, tgt: &AbsolutePath) -> Result<i32, ComparatorError>;
}

/// Always reports the source as newer, used for unconditional (`--delete`-style
/// forced) re-transfers.
pub struct SourceAlwaysNewer;

impl PathComparator for SourceAlwaysNewer {
    fn compare(&self, _src: &AbsolutePath, _tgt: &AbsolutePath) -> Result<i32, ComparatorError> {
        Ok(1)
    }
}

/// Compares modification times, applying VFAT's 2-second rounding when either
/// path resides on a VFAT-family filesystem.
pub struct ModtimeComparator {
    mount_table: Arc<MountTable>,
}

impl ModtimeComparator {
    pub fn new(mount_table: Arc<MountTable>) -> Self {
        ModtimeComparator { mount_table }
    }
}

fn mtime_seconds(path: &AbsolutePath) -> Result<i64, ComparatorError> {
    let metadata = std::fs::metadata(path.as_path()).map_err(|source| ComparatorError::Metadata {
        path: path.clone(),
        source,
    })?;
    let modified = metadata.modified().map_err(|source| ComparatorError::Metadata {
        path: path.clone(),
        source,
    })?;
    Ok(modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0))
}

/// Applies VFAT's 2-second modtime granularity: only a difference of two
/// seconds or more counts as "actually different".
fn vfat_compare(src_mtime: i64, tgt_mtime: i64) -> i32 {
    let diff = src_mtime - tgt_mtime;
    if diff >= 2 {
        1
    } else if diff <= -2 {
        -1
    } else {
        0
    }
}

fn exact_compare(src_mtime: i64, tgt_mtime: i64) -> i32 {
    (src_mtime - tgt_mtime).signum() as i32
}

impl PathComparator for ModtimeComparator {
    fn compare(&self, src: &AbsolutePath, tgt: &AbsolutePath) -> Result<i32, ComparatorError> {
        if !tgt.exists() {
            return Ok(1);
        }

        let src_mtime = mtime_seconds(src)?;
        let tgt_mtime = mtime_seconds(tgt)?;

        let either_vfat =
            self.mount_table.is_vfat(src.as_path()) || self.mount_table.is_vfat(tgt.as_path());

        Ok(if either_vfat {
            vfat_compare(src_mtime, tgt_mtime)
        } else {
            exact_compare(src_mtime, tgt_mtime)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vfat_compare_ignores_sub_two_second_differences() {
        assert_eq!(vfat_compare(100, 99), 0);
        assert_eq!(vfat_compare(101, 99), 1);
        assert_eq!(vfat_compare(97, 99), -1);
    }

    #[test]
    fn exact_compare_is_strict() {
        assert_eq!(exact_compare(100, 99), 1);
        assert_eq!(exact_compare(99, 100), -1);
        assert_eq!(exact_compare(100, 100), 0);
    }

    #[test]
    fn missing_destination_always_compares_newer() {
        let mount_table = Arc::new(MountTable::new());
        let comparator = ModtimeComparator::new(mount_table);
        let src = AbsolutePath::new("/tmp/does-not-matter-src").unwrap();
        let tgt = AbsolutePath::new("/tmp/definitely-does-not-exist-target-xyz").unwrap();
        assert_eq!(comparator.compare(&src, &tgt).unwrap(), 1);
    }

    #[test]
    fn source_always_newer_ignores_inputs() {
        let comparator = SourceAlwaysNewer;
        let src = AbsolutePath::new("/a").unwrap();
        let tgt = AbsolutePath::new("/b").unwrap();
        assert_eq!(comparator.compare(&src, &tgt).unwrap(), 1);
    }
}
