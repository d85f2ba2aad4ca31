//! Playlist parsing (C8): resolves each playlist's entries to absolute
//! source paths, following symlinks on the playlist itself so relative
//! entries resolve against its real location.
//!
//! Grounded in `sync/core.py`'s `parse_playlists`.

use std::fs;

use linked_hash_map::LinkedHashMap;

use crate::types::AbsolutePath;

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("failed to read playlist {path}: {source}")]
    Read {
        path: AbsolutePath,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to resolve real path of playlist {path}: {source}")]
    Canonicalize {
        path: AbsolutePath,
        #[source]
        source: std::io::Error,
    },
}

/// The result of parsing a set of playlists: every referenced absolute path,
/// mapped to the ordered list of playlists that referenced it, plus any
/// playlists that failed to read.
pub struct ParsedPlaylists {
    pub entries: LinkedHashMap<AbsolutePath, Vec<AbsolutePath>>,
    pub errors: Vec<(AbsolutePath, PlaylistError)>,
}

/// Parses `playlists` in order, skipping blank lines and `#`-comments,
/// resolving each remaining line against the playlist's real (symlink
/// resolved) parent directory.
pub fn parse_playlists(playlists: &[AbsolutePath]) -> ParsedPlaylists {
    let mut entries: LinkedHashMap<AbsolutePath, Vec<AbsolutePath>> = LinkedHashMap::new();
    let mut errors = Vec::new();

    for playlist in playlists {
        match parse_one(playlist) {
            Ok(resolved_entries) => {
                for entry in resolved_entries {
                    entries.entry(entry).or_insert_with(Vec::new).push(playlist.clone());
                }
            }
            Err(err) => errors.push((playlist.clone(), err)),
        }
    }

    ParsedPlaylists { entries, errors }
}

fn parse_one(playlist: &AbsolutePath) -> Result<Vec<AbsolutePath>, PlaylistError> {
    let real = dunce::canonicalize(playlist.as_path()).map_err(|source| PlaylistError::Canonicalize {
        path: playlist.clone(),
        source,
    })?;
    let real = AbsolutePath::new(real).expect("canonicalize returns an absolute path");
    let real_parent = real.parent().unwrap_or_else(|| real.clone());

    let contents = fs::read_to_string(real.as_path()).map_err(|source| PlaylistError::Read {
        path: playlist.clone(),
        source,
    })?;

    let mut resolved = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let abs = real_parent.join(trimmed);
        resolved.push(abs);
    }
    Ok(resolved)
}
