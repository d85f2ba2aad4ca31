//! The built-in copy transcoder: converts any type to itself by copying bytes.
//!
//! Always registered under the name `copy`, regardless of configuration. The
//! planner (C3) uses its presence to detect and reject pipelines that
//! "transcode" a file to its own type via a longer chain than a bare copy.

use std::fs;

use crate::types::{AbsolutePath, FileType};

use super::{TranscodeError, Transcoder};

pub const COPY_TRANSCODER_NAME: &str = "copy";

/// Copies `src` to `dst` unchanged. `can_transcode` reports the probe's own
/// extension as the only reachable destination type, since copying never
/// changes the type.
pub struct CopyTranscoder;

impl Transcoder for CopyTranscoder {
    fn cost(&self) -> u32 {
        1
    }

    fn can_transcode(&self, src: &AbsolutePath) -> Vec<FileType> {
        vec![FileType::from_path(src)]
    }

    fn transcode(&self, src: &AbsolutePath, dst: &AbsolutePath) -> Result<(), TranscodeError> {
        fs::copy(src.as_path(), dst.as_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn copy_transcoder_reports_same_type() {
        let t = CopyTranscoder;
        let src = AbsolutePath::new("/music/track.mp3").unwrap();
        assert_eq!(t.can_transcode(&src), vec![FileType::by_name("mp3")]);
    }

    #[test]
    fn copy_transcoder_duplicates_bytes() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("a.mp3");
        let dst_path = dir.path().join("b.mp3");
        let mut f = fs::File::create(&src_path).unwrap();
        f.write_all(b"hello").unwrap();

        let src = AbsolutePath::new(src_path).unwrap();
        let dst = AbsolutePath::new(dst_path.clone()).unwrap();
        CopyTranscoder.transcode(&src, &dst).unwrap();

        assert_eq!(fs::read(dst_path).unwrap(), b"hello");
    }
}
