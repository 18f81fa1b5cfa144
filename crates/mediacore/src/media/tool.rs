//! External media tool boundary.
//!
//! Jobs never spawn processes themselves: they build a [`ToolInvocation`] with
//! [`super::commands`] and hand it to a [`MediaTool`]. Production uses
//! [`FfmpegTool`]; tests plug in a scripted implementation.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{ConversionError, ConversionResult};
use crate::core::metrics;
use crate::core::process::{run_with_timeout, FFPROBE_TIMEOUT};

/// One ffmpeg run: arguments after the common flags, the file it must produce
/// and how long it may take.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Short operation label for logs and metrics ("trim", "compress", ...)
    pub operation: &'static str,
    pub args: Vec<OsString>,
    pub output: PathBuf,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(operation: &'static str, output: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            operation,
            args: Vec::new(),
            output: output.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends the output path as the final argument
    #[must_use]
    pub fn finish(mut self) -> Self {
        let output = self.output.clone().into_os_string();
        self.args.push(output);
        self
    }

    /// Arguments rendered lossily, for logs and test assertions
    pub fn args_lossy(&self) -> Vec<String> {
        self.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }
}

/// Stream class used when counting streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
}

impl StreamType {
    fn selector(self) -> &'static str {
        match self {
            StreamType::Video => "v",
            StreamType::Audio => "a",
            StreamType::Subtitle => "s",
        }
    }
}

/// Raw grayscale frame layout used by intro scanning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl FrameGeometry {
    /// Bytes in one 8-bit grayscale frame
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Capability surface of the external media tool
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Runs one invocation. Success means exit code zero and an existing output file.
    async fn run(&self, invocation: &ToolInvocation) -> ConversionResult<()>;

    /// Container duration in seconds
    async fn media_duration(&self, path: &Path) -> ConversionResult<f64>;

    /// Number of streams of the given type in the container
    async fn count_streams(&self, path: &Path, stream_type: StreamType) -> ConversionResult<usize>;

    /// Decodes `input` into grayscale frames sampled at `geometry.fps` and feeds
    /// each frame to `on_frame` in order. Returns the number of frames read.
    async fn scan_gray_frames(
        &self,
        input: &Path,
        geometry: FrameGeometry,
        cancel: &CancellationToken,
        on_frame: &mut (dyn for<'f> FnMut(&'f [u8]) + Send),
    ) -> ConversionResult<usize>;
}

/// ffmpeg/ffprobe found on PATH
#[derive(Debug, Clone, Default)]
pub struct FfmpegTool;

impl FfmpegTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn run(&self, invocation: &ToolInvocation) -> ConversionResult<()> {
        log::debug!("ffmpeg [{}] {:?}", invocation.operation, invocation.args_lossy());

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(&invocation.args)
            .stdout(Stdio::null());

        let output = match run_with_timeout(&mut cmd, invocation.timeout).await {
            Ok(output) => output,
            Err(e) => {
                metrics::record_tool_failure(invocation.operation);
                return Err(e);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("FFmpeg {} error: {}", invocation.operation, stderr);
            metrics::record_tool_failure(invocation.operation);
            return Err(ConversionError::ToolFailed(stderr.to_string()));
        }

        if !invocation.output.exists() {
            metrics::record_tool_failure(invocation.operation);
            return Err(ConversionError::OutputMissing(invocation.output.display().to_string()));
        }

        Ok(())
    }

    async fn media_duration(&self, path: &Path) -> ConversionResult<f64> {
        let mut cmd = Command::new("ffprobe");
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path);

        let output = run_with_timeout(&mut cmd, FFPROBE_TIMEOUT).await?;
        if !output.status.success() {
            return Err(ConversionError::ToolFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let duration_str = String::from_utf8_lossy(&output.stdout);
        duration_str
            .trim()
            .parse::<f64>()
            .map_err(|_| ConversionError::ToolFailed("Failed to parse duration".to_string()))
    }

    async fn count_streams(&self, path: &Path, stream_type: StreamType) -> ConversionResult<usize> {
        let mut cmd = Command::new("ffprobe");
        cmd.args([
            "-v",
            "error",
            "-select_streams",
            stream_type.selector(),
            "-show_entries",
            "stream=index",
            "-of",
            "csv=p=0",
        ])
        .arg(path);

        let output = run_with_timeout(&mut cmd, FFPROBE_TIMEOUT).await?;
        if !output.status.success() {
            return Err(ConversionError::ToolFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count())
    }

    async fn scan_gray_frames(
        &self,
        input: &Path,
        geometry: FrameGeometry,
        cancel: &CancellationToken,
        on_frame: &mut (dyn for<'f> FnMut(&'f [u8]) + Send),
    ) -> ConversionResult<usize> {
        if !input.exists() {
            return Err(ConversionError::InputNotFound(input.display().to_string()));
        }

        let filter = format!(
            "fps={},scale={}:{},format=gray",
            geometry.fps, geometry.width, geometry.height
        );
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-vf", &filter, "-f", "rawvideo", "-pix_fmt", "gray", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConversionError::ToolFailed("ffmpeg stdout unavailable".to_string()))?;

        let mut frame = vec![0u8; geometry.frame_len()];
        let mut frames = 0usize;
        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(ConversionError::InvalidInput("scan cancelled".to_string()));
                }
                read = stdout.read_exact(&mut frame) => read,
            };
            match read {
                Ok(_) => {
                    on_frame(&frame);
                    frames += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(ConversionError::Io(e)),
            }
        }

        let status = child.wait().await?;
        if !status.success() && frames == 0 {
            metrics::record_tool_failure("scan");
            return Err(ConversionError::ToolFailed(format!("frame scan exited with {}", status)));
        }
        Ok(frames)
    }
}
