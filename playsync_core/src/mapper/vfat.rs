//! VFAT-aware path mapping (C5): escapes characters VFAT can't store and
//! keeps a first-seen casing cache so a case-insensitive destination
//! filesystem never ends up with two differently-cased copies of the same
//! logical directory.
//!
//! Grounded in `sync/algo.py`'s `vfatprotect`, `FilesystemPathMapper`, and
//! `ForceVFATPathMapper`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::AbsolutePath;

use super::fstype::MountTable;
use super::PathMapper;

const FORBIDDEN_CHARS: &[char] = &['?', '<', '>', '\\', ':', '*', '|', '"', '^'];

/// Replaces characters VFAT cannot store with `_` and collapses the
/// degenerate segments that replacement can produce.
pub fn vfat_protect(input: &str) -> String {
    let mut replaced: String = input
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();
    while replaced.contains("./") {
        replaced = replaced.replace("./", "/");
    }
    while replaced.contains(" /") {
        replaced = replaced.replace(" /", "/");
    }
    replaced
}

/// A path-string keyed cache that remembers the first casing seen for a given
/// case-insensitive key, so repeated lookups for "Muse" and "muse" resolve to
/// whichever form was mapped first.
#[derive(Default)]
struct CaseFoldCache {
    seen: Mutex<HashMap<String, AbsolutePath>>,
}

impl CaseFoldCache {
    fn resolve(&self, candidate: AbsolutePath) -> AbsolutePath {
        let key = candidate.as_path().to_string_lossy().to_ascii_lowercase();
        let mut seen = self.seen.lock();
        seen.entry(key).or_insert(candidate).clone()
    }
}

fn protect_path(path: &AbsolutePath) -> AbsolutePath {
    let protected = vfat_protect(&path.as_path().to_string_lossy());
    AbsolutePath::new(protected).unwrap_or_else(|_| path.clone())
}

/// Maps paths according to the actual filesystem type of their destination:
/// VFAT-family mountpoints get character escaping and case folding, anything
/// else passes through unchanged.
pub struct FilesystemPathMapper {
    mount_table: Arc<MountTable>,
    cache: CaseFoldCache,
}

impl FilesystemPathMapper {
    pub fn new(mount_table: Arc<MountTable>) -> Self {
        FilesystemPathMapper {
            mount_table,
            cache: CaseFoldCache::default(),
        }
    }
}

impl PathMapper for FilesystemPathMapper {
    fn map(&self, path: &AbsolutePath) -> AbsolutePath {
        let candidate = if self.mount_table.is_vfat(path.as_path()) {
            protect_path(path)
        } else {
            path.clone()
        };
        self.cache.resolve(candidate)
    }
}

/// Applies VFAT escaping and case folding unconditionally, regardless of the
/// destination's actual filesystem type. Used when the operator passes
/// `--force-vfat` because the real mountpoint can't be detected (e.g. a
/// network share reporting a misleading fstype).
pub struct ForceVfatPathMapper {
    cache: CaseFoldCache,
}

impl ForceVfatPathMapper {
    pub fn new() -> Self {
        ForceVfatPathMapper {
            cache: CaseFoldCache::default(),
        }
    }
}

impl Default for ForceVfatPathMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMapper for ForceVfatPathMapper {
    fn map(&self, path: &AbsolutePath) -> AbsolutePath {
        self.cache.resolve(protect_path(path))
    }
}
