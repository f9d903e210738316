//! Fast-start remuxing through `ffmpeg`.
//!
//! Streams are copied verbatim; only the container layout changes so the
//! index sits at the front of the file. The caller owns both the input and
//! the produced file and is responsible for removing them.

use crate::services::media_inspector::MediaError;
use async_trait::async_trait;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;

/// Appended to the input path to name the remuxed output.
pub const OUTPUT_SUFFIX: &str = ".processing";

#[async_trait]
pub trait Repackager: Send + Sync {
    /// Write a fast-start copy of `input` to `output`.
    async fn repackage(&self, input: &Path, output: &Path) -> Result<(), MediaError>;
}

/// Where the remuxed copy of `input` is written.
pub fn output_path(input: &Path) -> PathBuf {
    let mut raw: OsString = input.as_os_str().to_owned();
    raw.push(OUTPUT_SUFFIX);
    PathBuf::from(raw)
}

#[derive(Debug, Clone)]
pub struct FfmpegRepackager {
    binary: PathBuf,
}

impl FfmpegRepackager {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn args(input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-v".into(), "error".into(), "-i".into()];
        args.push(input.into());
        args.extend(
            ["-c", "copy", "-movflags", "faststart", "-f", "mp4"]
                .into_iter()
                .map(OsString::from),
        );
        args.push(output.into());
        args
    }
}

#[async_trait]
impl Repackager for FfmpegRepackager {
    async fn repackage(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        let tool = self.binary.display().to_string();
        let result = Command::new(&self.binary)
            .args(Self::args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(MediaError::Failed {
                tool,
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            "relocated index for fast start"
        );
        Ok(())
    }
}
