//! Process-wide shared state (§5 Concurrency & Resource Model): the
//! directory-creation lock and the verbosity flag, following the teacher's
//! `state::InitCell` global pattern generalized to `OnceLock`+`Mutex`.

use std::sync::OnceLock;

use parking_lot::Mutex;
use state::InitCell;

/// Guards `mkdir -p`-style directory creation so concurrent workers racing to
/// create the same destination directory never collide.
pub fn mkdir_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Ensures `dir` (and its ancestors) exist, serialized across threads.
pub fn ensure_directory_exists(dir: &std::path::Path) -> std::io::Result<()> {
    let _guard = mkdir_lock().lock();
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
}

pub static VERBOSE: InitCell<u8> = InitCell::new();

pub fn is_verbose_enabled() -> bool {
    VERBOSE.try_get().copied().unwrap_or(0) > 0
}

pub fn verbosity_level() -> u8 {
    VERBOSE.try_get().copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_directory_exists_is_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_directory_exists(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_directory_exists(&nested).unwrap();
    }
}
