//! Filesystem-type detection, used to decide whether the VFAT 2-second
//! modtime tolerance (C6) and character-escaping rules (C5) apply to a given
//! destination path.
//!
//! Grounded in `sync/algo.py`'s `get_mptypes`/`get_fstype`, which walk
//! `psutil.disk_partitions()` to map mountpoints to filesystem types and then
//! pick the most specific (deepest) mountpoint enclosing a path. No crate in
//! the retrieval pack covers this narrow a need, so it's read directly from
//! `/proc/mounts`, the same source `psutil` itself reads on Linux.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

pub const VFAT_FSTYPES: &[&str] = &["vfat", "msdos", "fat", "fat32"];

/// A mountpoint -> filesystem-type table, parsed once and memoized.
#[derive(Default)]
pub struct MountTable {
    mounts: RwLock<Option<HashMap<PathBuf, String>>>,
}

impl MountTable {
    pub fn new() -> Self {
        MountTable {
            mounts: RwLock::new(None),
        }
    }

    fn ensure_loaded(&self) {
        if self.mounts.read().is_some() {
            return;
        }
        let mut guard = self.mounts.write();
        if guard.is_some() {
            return;
        }
        *guard = Some(read_proc_mounts().unwrap_or_default());
    }

    /// Returns the filesystem type of the deepest mountpoint enclosing `path`,
    /// or `None` if no mountpoint in the table is a prefix of `path`.
    pub fn fstype_for(&self, path: &Path) -> Option<String> {
        self.ensure_loaded();
        let guard = self.mounts.read();
        let mounts = guard.as_ref()?;

        let mut best: Option<(&Path, &str)> = None;
        for (mountpoint, fstype) in mounts {
            if path.starts_with(mountpoint) {
                let is_deeper = match best {
                    Some((current, _)) => mountpoint.components().count() > current.components().count(),
                    None => true,
                };
                if is_deeper {
                    best = Some((mountpoint.as_path(), fstype.as_str()));
                }
            }
        }
        best.map(|(_, fstype)| fstype.to_string())
    }

    pub fn is_vfat(&self, path: &Path) -> bool {
        self.fstype_for(path)
            .map(|fstype| VFAT_FSTYPES.contains(&fstype.as_str()))
            .unwrap_or(false)
    }
}

fn read_proc_mounts() -> std::io::Result<HashMap<PathBuf, String>> {
    let contents = fs::read_to_string("/proc/mounts")?;
    Ok(parse_mounts(&contents))
}

fn parse_mounts(contents: &str) -> HashMap<PathBuf, String> {
    let mut table = HashMap::new();
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let _device = fields.next();
        let Some(mountpoint) = fields.next() else { continue };
        let Some(fstype) = fields.next() else { continue };
        table.insert(PathBuf::from(unescape_octal(mountpoint)), fstype.to_string());
    }
    table
}

/// `/proc/mounts` escapes spaces, tabs, backslashes, and newlines in paths as
/// `\OOO` octal sequences.
fn unescape_octal(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Ok(value) = u8::from_str_radix(&raw[i + 1..i + 4], 8) {
                out.push(value as char);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_deepest_enclosing_mountpoint() {
        let mut mounts = HashMap::new();
        mounts.insert(PathBuf::from("/"), "ext4".to_string());
        mounts.insert(PathBuf::from("/media/usb"), "vfat".to_string());

        let table = MountTable {
            mounts: RwLock::new(Some(mounts)),
        };

        assert_eq!(
            table.fstype_for(Path::new("/media/usb/music/track.mp3")),
            Some("vfat".to_string())
        );
        assert_eq!(table.fstype_for(Path::new("/home/user/file")), Some("ext4".to_string()));
    }

    #[test]
    fn unknown_path_with_no_root_mount_returns_none() {
        let table = MountTable {
            mounts: RwLock::new(Some(HashMap::new())),
        };
        assert_eq!(table.fstype_for(Path::new("/anything")), None);
    }

    #[test]
    fn parses_proc_mounts_format_with_escaped_spaces() {
        let sample = "/dev/sda1 /mnt/My\\040Drive vfat rw,relatime 0 0\n/dev/sda2 / ext4 rw 0 0\n";
        let table = parse_mounts(sample);
        assert_eq!(table.get(Path::new("/mnt/My Drive")).map(String::as_str), Some("vfat"));
    }

    #[test]
    fn is_vfat_recognizes_fat_family_fstypes() {
        let mut mounts = HashMap::new();
        mounts.insert(PathBuf::from("/media/usb"), "vfat".to_string());
        let table = MountTable {
            mounts: RwLock::new(Some(mounts)),
        };
        assert!(table.is_vfat(Path::new("/media/usb/a")));
        assert!(!table.is_vfat(Path::new("/home/a")));
    }
}
