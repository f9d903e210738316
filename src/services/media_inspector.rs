//! Aspect-ratio inspection of local video files through `ffprobe`.

use async_trait::async_trait;
use serde::Deserialize;
use std::{
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("could not start `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{tool}` exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("unparseable probe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("probe reported no streams")]
    NoStreams,
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// The three buckets a video is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Other,
}

impl AspectRatio {
    /// Open intervals: 1.7 < w/h < 1.8 is 16:9, 0.55 < w/h < 0.57 is 9:16.
    /// The bands absorb rounding in sizes like 1920x1080 or 1080x1920.
    pub fn classify(dimensions: Dimensions) -> Self {
        let ratio = f64::from(dimensions.width) / f64::from(dimensions.height);
        if ratio > 1.7 && ratio < 1.8 {
            AspectRatio::Landscape
        } else if ratio > 0.55 && ratio < 0.57 {
            AspectRatio::Portrait
        } else {
            AspectRatio::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Other => "other",
        }
    }

    /// First path segment of object keys holding videos of this shape.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "square",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads the dimensions of the first stream in a local media file.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<Dimensions, MediaError>;
}

/// Probe the file and bucket its shape.
pub async fn inspect_aspect_ratio(
    probe: &dyn MediaProbe,
    path: &Path,
) -> Result<AspectRatio, MediaError> {
    let dimensions = probe.probe(path).await?;
    let aspect = AspectRatio::classify(dimensions);
    tracing::debug!(
        path = %path.display(),
        width = dimensions.width,
        height = dimensions.height,
        aspect = %aspect,
        "classified video"
    );
    Ok(aspect)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Parse `ffprobe -print_format json -show_streams` output.
pub fn parse_probe_output(raw: &[u8]) -> Result<Dimensions, MediaError> {
    let output: ProbeOutput = serde_json::from_slice(raw)?;
    let stream = output.streams.first().ok_or(MediaError::NoStreams)?;
    if stream.width == 0 || stream.height == 0 {
        return Err(MediaError::InvalidDimensions {
            width: stream.width,
            height: stream.height,
        });
    }
    Ok(Dimensions {
        width: stream.width,
        height: stream.height,
    })
}

/// `MediaProbe` backed by the ffprobe binary.
#[derive(Debug, Clone)]
pub struct FfprobeInspector {
    binary: PathBuf,
}

impl FfprobeInspector {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeInspector {
    async fn probe(&self, path: &Path) -> Result<Dimensions, MediaError> {
        let tool = self.binary.display().to_string();
        let output = Command::new(&self.binary)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MediaError::Failed {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_output(&output.stdout)
    }
}
