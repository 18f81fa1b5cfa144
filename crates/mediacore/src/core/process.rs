//! Process execution utilities with timeout support
//!
//! Provides helpers for running external processes (ffmpeg, ffprobe)
//! with configurable timeouts so a hung process cannot block a job forever.

use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::media::ConversionError;

/// Default timeout for ffprobe metadata queries (30 seconds)
pub const FFPROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run an async Command with a timeout.
///
/// The child is killed when the timeout fires. Returns the process Output on
/// success, or a ConversionError on timeout/IO failure.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ConversionError> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(ConversionError::Io(e)),
        Err(_) => Err(ConversionError::Timeout(timeout.as_secs())),
    }
}

/// Check that a binary is on PATH and answers `-version`
pub async fn binary_available(program: &str) -> bool {
    let mut cmd = Command::new(program);
    cmd.arg("-version");
    run_with_timeout(&mut cmd, FFPROBE_TIMEOUT)
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        assert!(!binary_available("definitely-not-a-real-binary-1a2b3c").await);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_io_error() {
        let mut cmd = Command::new("definitely-not-a-real-binary-1a2b3c");
        let err = run_with_timeout(&mut cmd, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ConversionError::Io(_)));
    }
}
