//! Value types shared across the rest of the crate: the interned [`FileType`]
//! token (C1) and [`AbsolutePath`], a path that is guaranteed to be absolute.

use std::env;
use std::fmt;
use std::hash::Hash;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Reserved token meaning "any file type" in policies.
pub const WILDCARD: &str = "*";

fn intern_pool() -> &'static Mutex<std::collections::HashSet<Arc<str>>> {
    static POOL: OnceLock<Mutex<std::collections::HashSet<Arc<str>>>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(std::collections::HashSet::new()))
}

/// A canonical lowercase filename-suffix token, e.g. `mp3` or `ogg`.
///
/// Two `FileType`s compare equal iff their lowercased string forms are equal;
/// interning just avoids repeated allocation, it is not relied upon for equality.
#[derive(Clone, Eq, Serialize)]
pub struct FileType(Arc<str>);

impl FileType {
    /// Interns (or looks up) the lowercase form of `name`.
    pub fn by_name<S: AsRef<str>>(name: S) -> Self {
        let lowered = name.as_ref().to_ascii_lowercase();
        let mut pool = intern_pool().lock();
        if let Some(existing) = pool.get(lowered.as_str()) {
            return FileType(existing.clone());
        }
        let interned: Arc<str> = Arc::from(lowered.as_str());
        pool.insert(interned.clone());
        FileType(interned)
    }

    /// The reserved "any type" token.
    pub fn wildcard() -> Self {
        FileType::by_name(WILDCARD)
    }

    /// The token for a file with no extension at all.
    pub fn empty() -> Self {
        FileType::by_name("")
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.as_ref() == WILDCARD
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a `FileType` from a path's extension (lowercased, no leading dot).
    /// A path with no extension yields the empty token, which never matches anything
    /// but the wildcard or itself.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) => FileType::by_name(ext),
            None => FileType::empty(),
        }
    }
}

impl PartialEq for FileType {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl Hash for FileType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl fmt::Debug for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileType({})", self.0)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for FileType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(de::Error::custom(
                "a file type must be a non-empty string (use \"*\" for wildcard)",
            ));
        }
        Ok(FileType::by_name(raw))
    }
}

/// A filesystem path guaranteed to be absolute.
///
/// Construction never touches the filesystem: `absolutize` performs the same
/// lexical normalization as `os.path.abspath` (join against the current
/// directory, then collapse `.` and `..` components without following
/// symlinks). This is deliberate: a destination path need not exist yet.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AbsolutePath(PathBuf);

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("expected an absolute path, got relative path {0:?}")]
    NotAbsolute(PathBuf),
    #[error("could not determine the current directory: {0}")]
    NoCurrentDirectory(#[source] std::io::Error),
}

impl AbsolutePath {
    /// Wraps `path`, rejecting it if it is not already absolute.
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self, PathError> {
        let path = path.into();
        if path.is_absolute() {
            Ok(AbsolutePath(lexically_normalize(&path)))
        } else {
            Err(PathError::NotAbsolute(path))
        }
    }

    /// Joins `path` against the current working directory if it is relative,
    /// then lexically normalizes the result. Mirrors Python's `os.path.abspath`.
    pub fn absolutize<P: Into<PathBuf>>(path: P) -> Result<Self, PathError> {
        let path = path.into();
        let joined = if path.is_absolute() {
            path
        } else {
            let cwd = env::current_dir().map_err(PathError::NoCurrentDirectory)?;
            cwd.join(path)
        };
        Ok(AbsolutePath(lexically_normalize(&joined)))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    pub fn parent(&self) -> Option<AbsolutePath> {
        self.0.parent().map(|p| AbsolutePath(p.to_path_buf()))
    }

    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.0.file_name()
    }

    pub fn join<P: AsRef<Path>>(&self, rel: P) -> AbsolutePath {
        AbsolutePath(lexically_normalize(&self.0.join(rel)))
    }

    pub fn with_extension<S: AsRef<str>>(&self, ext: S) -> AbsolutePath {
        AbsolutePath(self.0.with_extension(ext.as_ref()))
    }

    pub fn file_stem(&self) -> Option<&std::ffi::OsStr> {
        self.0.file_stem()
    }

    /// True when `self` is `other` or a descendant of `other`.
    pub fn is_within(&self, other: &AbsolutePath) -> bool {
        self.0 == other.0 || self.0.starts_with(&other.0)
    }

    pub fn relative_to(&self, base: &AbsolutePath) -> Option<PathBuf> {
        self.0.strip_prefix(&base.0).ok().map(|p| p.to_path_buf())
    }

    pub fn exists(&self) -> bool {
        self.0.exists()
    }

    pub fn is_file(&self) -> bool {
        self.0.is_file()
    }
}

impl fmt::Debug for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Collapses `.` and `..` components without touching the filesystem.
/// A leading `..` past the root is dropped, matching `os.path.abspath` behavior.
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) | None => {
                        // Can't go above root; drop the component.
                    }
                    _ => {
                        out.push("..");
                    }
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(Component::RootDir);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_equality_is_case_insensitive() {
        assert_eq!(FileType::by_name("MP3"), FileType::by_name("mp3"));
    }

    #[test]
    fn file_type_from_path_lowercases_extension() {
        let t = FileType::from_path(Path::new("/music/Track.FLAC"));
        assert_eq!(t, FileType::by_name("flac"));
    }

    #[test]
    fn file_type_from_path_with_no_extension_is_empty() {
        let t = FileType::from_path(Path::new("/music/README"));
        assert!(t.is_empty());
        assert_ne!(t, FileType::wildcard());
    }

    #[test]
    fn wildcard_is_distinct_from_named_types() {
        assert_ne!(FileType::wildcard(), FileType::by_name("mp3"));
        assert!(FileType::wildcard().is_wildcard());
    }

    #[test]
    fn absolute_path_rejects_relative_input() {
        assert!(AbsolutePath::new("relative/path").is_err());
    }

    #[test]
    fn absolute_path_normalizes_dot_segments() {
        let p = AbsolutePath::new("/a/b/../c/./d").unwrap();
        assert_eq!(p.as_path(), Path::new("/a/c/d"));
    }

    #[test]
    fn is_within_includes_self() {
        let base = AbsolutePath::new("/music").unwrap();
        assert!(base.is_within(&base));
        let child = AbsolutePath::new("/music/album/track.mp3").unwrap();
        assert!(child.is_within(&base));
        let unrelated = AbsolutePath::new("/other").unwrap();
        assert!(!unrelated.is_within(&base));
    }

    #[test]
    fn relative_to_strips_base_prefix() {
        let base = AbsolutePath::new("/music").unwrap();
        let child = AbsolutePath::new("/music/album/track.mp3").unwrap();
        assert_eq!(
            child.relative_to(&base),
            Some(PathBuf::from("album/track.mp3"))
        );
    }
}
