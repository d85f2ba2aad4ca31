//! Playlist rewriter & deleter (C11): emits target-side playlists that point
//! at the synchronized files, and removes stale target files.
//!
//! Grounded in `sync/core.py`'s `synchronize_playlists`/`synchronize_deletions`.

use std::collections::HashMap;
use std::fs;

use crate::globals::ensure_directory_exists;
use crate::types::AbsolutePath;

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("failed to resolve real path of playlist {path}: {source}")]
    Canonicalize {
        path: AbsolutePath,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read playlist {path}: {source}")]
    Read {
        path: AbsolutePath,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write rewritten playlist {path}: {source}")]
    Write {
        path: AbsolutePath,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("failed to delete {path}: {source}")]
    Unlink {
        path: AbsolutePath,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum RewriteOutcome {
    Written,
    Unchanged,
    WouldWrite,
}

/// `target_basedir / "Playlists"`, where every rewritten playlist lands.
pub fn target_playlist_dir(target_basedir: &AbsolutePath) -> AbsolutePath {
    target_basedir.join("Playlists")
}

/// Rewrites one playlist's entries into `target_playlist_dir`, substituting
/// each resolved entry with the path it was actually synchronized to (or a
/// comment explaining why it wasn't). `transferred` covers both
/// `will_transfer` and `already_transferred`; `failure_reasons` covers
/// `cannot_transfer`, rendered to a short human-readable string.
pub fn rewrite_playlist(
    playlist: &AbsolutePath,
    transferred: &HashMap<AbsolutePath, AbsolutePath>,
    failure_reasons: &HashMap<AbsolutePath, String>,
    target_playlist_dir: &AbsolutePath,
    dry_run: bool,
) -> Result<RewriteOutcome, RewriteError> {
    let real = dunce::canonicalize(playlist.as_path()).map_err(|source| RewriteError::Canonicalize {
        path: playlist.clone(),
        source,
    })?;
    let real = AbsolutePath::new(real).expect("canonicalize returns an absolute path");
    let real_parent = real.parent().unwrap_or_else(|| real.clone());

    let original = fs::read_to_string(real.as_path()).map_err(|source| RewriteError::Read {
        path: playlist.clone(),
        source,
    })?;

    let mut out_lines: Vec<String> = Vec::new();
    for line in original.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            out_lines.push(line.to_string());
            continue;
        }

        let resolved = real_parent.join(trimmed);
        out_lines.push(format!("# was: {trimmed}"));

        if let Some(target) = transferred.get(&resolved) {
            let rel = pathdiff::diff_paths(target.as_path(), target_playlist_dir.as_path())
                .unwrap_or_else(|| target.as_path().to_path_buf());
            out_lines.push(rel.to_string_lossy().into_owned());
        } else if let Some(reason) = failure_reasons.get(&resolved) {
            out_lines.push(format!("# not synced because of {reason}"));
        } else {
            out_lines.push("# not synced: entry was not part of this run's plan".to_string());
        }
    }

    let insert_at = if out_lines.first().map(|l| l.trim()) == Some("#EXTM3U") {
        1
    } else {
        0
    };
    out_lines.insert(insert_at, format!("# from: {}", playlist));

    let mut new_content = out_lines.join("\n");
    new_content.push('\n');

    let playlist_name = playlist.file_name().expect("playlist path must have a file name");
    let destination = target_playlist_dir.join(playlist_name);

    if let Ok(existing) = fs::read_to_string(destination.as_path()) {
        if existing == new_content {
            return Ok(RewriteOutcome::Unchanged);
        }
    }

    if dry_run {
        return Ok(RewriteOutcome::WouldWrite);
    }

    ensure_directory_exists(target_playlist_dir.as_path()).map_err(|source| RewriteError::Write {
        path: destination.clone(),
        source,
    })?;
    fs::write(destination.as_path(), new_content).map_err(|source| RewriteError::Write {
        path: destination,
        source,
    })?;

    Ok(RewriteOutcome::Written)
}

/// Unlinks every path in `targets`, tolerating already-absent files.
pub fn delete_stale_targets(targets: &[AbsolutePath], dry_run: bool) -> Vec<(AbsolutePath, DeletionError)> {
    let mut failures = Vec::new();
    for target in targets {
        if dry_run {
            continue;
        }
        match fs::remove_file(target.as_path()) {
            Ok(()) => {}
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => failures.push((
                target.clone(),
                DeletionError::Unlink {
                    path: target.clone(),
                    source,
                },
            )),
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rewrites_entries_to_mapped_targets_with_provenance_comments() {
        let dir = tempdir().unwrap();
        let playlist_path = dir.path().join("list.m3u");
        fs::write(&playlist_path, "#EXTM3U\ntrack.mp3\n").unwrap();

        let playlist = AbsolutePath::new(playlist_path).unwrap();
        let resolved_entry = dir.path().join("track.mp3");
        let target = AbsolutePath::new(dir.path().join("dst/track.mp3")).unwrap();

        let mut transferred = HashMap::new();
        transferred.insert(AbsolutePath::new(resolved_entry).unwrap(), target);

        let playlist_dir = AbsolutePath::new(dir.path().join("dst/Playlists")).unwrap();
        let outcome = rewrite_playlist(&playlist, &transferred, &HashMap::new(), &playlist_dir, false).unwrap();
        assert_eq!(outcome, RewriteOutcome::Written);

        let written = fs::read_to_string(playlist_dir.as_path().join("list.m3u")).unwrap();
        assert!(written.starts_with("#EXTM3U\n"));
        assert!(written.contains("# from:"));
        assert!(written.contains("# was: track.mp3"));
        assert!(written.contains("../track.mp3") || written.contains("track.mp3"));
    }

    #[test]
    fn unchanged_content_skips_rewrite() {
        let dir = tempdir().unwrap();
        let playlist_path = dir.path().join("list.m3u");
        fs::write(&playlist_path, "track.mp3\n").unwrap();
        let playlist = AbsolutePath::new(playlist_path).unwrap();

        let resolved_entry = dir.path().join("track.mp3");
        let target = AbsolutePath::new(dir.path().join("dst/track.mp3")).unwrap();
        let mut transferred = HashMap::new();
        transferred.insert(AbsolutePath::new(resolved_entry).unwrap(), target);

        let playlist_dir = AbsolutePath::new(dir.path().join("dst/Playlists")).unwrap();
        let first = rewrite_playlist(&playlist, &transferred, &HashMap::new(), &playlist_dir, false).unwrap();
        assert_eq!(first, RewriteOutcome::Written);

        let second = rewrite_playlist(&playlist, &transferred, &HashMap::new(), &playlist_dir, false).unwrap();
        assert_eq!(second, RewriteOutcome::Unchanged);
    }

    #[test]
    fn dry_run_never_writes() {
        let dir = tempdir().unwrap();
        let playlist_path = dir.path().join("list.m3u");
        fs::write(&playlist_path, "track.mp3\n").unwrap();
        let playlist = AbsolutePath::new(playlist_path).unwrap();
        let playlist_dir = AbsolutePath::new(dir.path().join("dst/Playlists")).unwrap();

        let outcome = rewrite_playlist(&playlist, &HashMap::new(), &HashMap::new(), &playlist_dir, true).unwrap();
        assert_eq!(outcome, RewriteOutcome::WouldWrite);
        assert!(!playlist_dir.as_path().join("list.m3u").exists());
    }

    #[test]
    fn delete_stale_targets_tolerates_missing_files() {
        let dir = tempdir().unwrap();
        let missing = AbsolutePath::new(dir.path().join("already-gone.mp3")).unwrap();
        let failures = delete_stale_targets(&[missing], false);
        assert!(failures.is_empty());
    }
}
