//! Scripted media tool: writes fake outputs instead of running ffmpeg

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use mediacore::media::tool::{FrameGeometry, MediaTool, StreamType, ToolInvocation};
use mediacore::media::{ConversionError, ConversionResult};
use tokio_util::sync::CancellationToken;

type RunHook = Box<dyn FnOnce() + Send>;

pub struct ScriptedTool {
    runs: Mutex<Vec<ToolInvocation>>,
    /// Fired once, right before the first run of the named operation
    hooks: Mutex<HashMap<&'static str, RunHook>>,
    /// Operation names or argument fragments that make a run fail
    failures: Vec<String>,
    /// Bytes written for a given operation instead of the default placeholder
    outputs: HashMap<&'static str, Vec<u8>>,
    duration: f64,
    audio_streams: usize,
    subtitle_streams: usize,
    frames: Vec<Vec<u8>>,
}

impl Default for ScriptedTool {
    fn default() -> Self {
        Self {
            runs: Mutex::new(Vec::new()),
            hooks: Mutex::new(HashMap::new()),
            failures: Vec::new(),
            outputs: HashMap::new(),
            duration: 120.0,
            audio_streams: 1,
            subtitle_streams: 1,
            frames: Vec::new(),
        }
    }
}

impl ScriptedTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every run whose operation equals `pattern` or whose arguments contain it
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_string());
        self
    }

    pub fn with_output(mut self, operation: &'static str, bytes: Vec<u8>) -> Self {
        self.outputs.insert(operation, bytes);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_subtitle_streams(mut self, count: usize) -> Self {
        self.subtitle_streams = count;
        self
    }

    pub fn with_frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames;
        self
    }

    /// Runs `hook` before the next `operation` run. Settable after the
    /// harness is built, so the hook can capture pipeline state.
    pub fn before_run(&self, operation: &'static str, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().unwrap().insert(operation, Box::new(hook));
    }

    pub fn runs(&self) -> Vec<ToolInvocation> {
        self.runs.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.runs.lock().unwrap().iter().map(|r| r.operation).collect()
    }

    fn should_fail(&self, invocation: &ToolInvocation) -> bool {
        let args = invocation.args_lossy();
        self.failures
            .iter()
            .any(|p| invocation.operation == p || args.iter().any(|a| a.contains(p.as_str())))
    }
}

#[async_trait]
impl MediaTool for ScriptedTool {
    async fn run(&self, invocation: &ToolInvocation) -> ConversionResult<()> {
        self.runs.lock().unwrap().push(invocation.clone());
        let hook = self.hooks.lock().unwrap().remove(invocation.operation);
        if let Some(hook) = hook {
            hook();
        }
        if self.should_fail(invocation) {
            return Err(ConversionError::ToolFailed(format!(
                "scripted failure of {}",
                invocation.operation
            )));
        }
        if let Some(parent) = invocation.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = self
            .outputs
            .get(invocation.operation)
            .cloned()
            .unwrap_or_else(|| format!("output of {}", invocation.operation).into_bytes());
        tokio::fs::write(&invocation.output, bytes).await?;
        Ok(())
    }

    async fn media_duration(&self, path: &Path) -> ConversionResult<f64> {
        if !path.exists() {
            return Err(ConversionError::InputNotFound(path.display().to_string()));
        }
        Ok(self.duration)
    }

    async fn count_streams(&self, _path: &Path, stream_type: StreamType) -> ConversionResult<usize> {
        Ok(match stream_type {
            StreamType::Video => 1,
            StreamType::Audio => self.audio_streams,
            StreamType::Subtitle => self.subtitle_streams,
        })
    }

    async fn scan_gray_frames(
        &self,
        _input: &Path,
        geometry: FrameGeometry,
        cancel: &CancellationToken,
        on_frame: &mut (dyn for<'f> FnMut(&'f [u8]) + Send),
    ) -> ConversionResult<usize> {
        for frame in &self.frames {
            if cancel.is_cancelled() {
                return Err(ConversionError::InvalidInput("scan cancelled".to_string()));
            }
            assert_eq!(frame.len(), geometry.frame_len(), "scripted frame has the wrong size");
            on_frame(frame);
        }
        Ok(self.frames.len())
    }
}
