//! A transcoder that shells out to an external command, e.g. `ffmpeg`.
//!
//! Grounded in the teacher's `TranscodeAudioFileJob` (spawn, poll, wait), but
//! simplified: planning and cancellation happen one level up, in the sync pool
//! (C10), so this transcoder just runs the command to completion.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::debug;

use crate::types::{AbsolutePath, FileType};

use super::{TranscodeError, Transcoder};

const INPUT_PLACEHOLDER: &str = "{INPUT_FILE}";
const OUTPUT_PLACEHOLDER: &str = "{OUTPUT_FILE}";

/// Runs `command` with `{INPUT_FILE}`/`{OUTPUT_FILE}` placeholders substituted
/// for the real paths. Reports `srctype` as its only recognized input and
/// `dsttype` as its only output, so `can_transcode` is a constant function of
/// the probed path's extension.
pub struct ExternalCommandTranscoder {
    name: String,
    srctype: FileType,
    dsttype: FileType,
    cost: u32,
    command: String,
    args: Vec<String>,
}

impl ExternalCommandTranscoder {
    pub fn new(
        name: impl Into<String>,
        srctype: FileType,
        dsttype: FileType,
        cost: u32,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        ExternalCommandTranscoder {
            name: name.into(),
            srctype,
            dsttype,
            cost,
            command: command.into(),
            args,
        }
    }

    fn render_args(&self, src: &AbsolutePath, dst: &AbsolutePath) -> Vec<String> {
        let src_str = src.as_path().to_string_lossy().into_owned();
        let dst_str = dst.as_path().to_string_lossy().into_owned();
        self.args
            .iter()
            .map(|arg| arg.replace(INPUT_PLACEHOLDER, &src_str).replace(OUTPUT_PLACEHOLDER, &dst_str))
            .collect()
    }
}

impl Transcoder for ExternalCommandTranscoder {
    fn cost(&self) -> u32 {
        self.cost
    }

    fn can_transcode(&self, src: &AbsolutePath) -> Vec<FileType> {
        if FileType::from_path(src) == self.srctype {
            vec![self.dsttype.clone()]
        } else {
            Vec::new()
        }
    }

    fn transcode(&self, src: &AbsolutePath, dst: &AbsolutePath) -> Result<(), TranscodeError> {
        let rendered_args = self.render_args(src, dst);
        debug!(
            "running external transcoder {:?}: {} {:?}",
            self.name, self.command, rendered_args
        );

        let status = Command::new(&self.command)
            .args(&rendered_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .status()
            .map_err(TranscodeError::Spawn)?;

        if !status.success() {
            return Err(TranscodeError::NonZeroExit(status));
        }

        let out_meta = std::fs::metadata(dst.as_path())?;
        if out_meta.len() == 0 {
            return Err(TranscodeError::EmptyOutput);
        }

        Ok(())
    }
}

/// Builds the default ffmpeg-based args for a simple `-i in out` invocation,
/// used when a transcoder's settings don't override `args`.
pub fn default_ffmpeg_args() -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        INPUT_PLACEHOLDER.to_string(),
        OUTPUT_PLACEHOLDER.to_string(),
    ]
}

pub fn default_ffmpeg_command() -> PathBuf {
    PathBuf::from("ffmpeg")
}
