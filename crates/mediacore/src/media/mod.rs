//! Media tool layer.
//!
//! Everything that touches ffmpeg/ffprobe lives here:
//! - [`commands`] builds argument lists for every job (pure, unit tested)
//! - [`tool`] runs them behind the [`tool::MediaTool`] trait
//! - [`quality`] is the static compression catalog
//!
//! Plus small file helpers shared by the jobs (extensions, sizes, time strings).

pub mod commands;
pub mod quality;
pub mod tool;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::core::config;

/// Errors that can occur while running the external media tool
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("FFmpeg error: {0}")]
    ToolFailed(String),

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Output file was not created: {0}")]
    OutputMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File size exceeds limit: {actual} > {limit}")]
    SizeExceeded { actual: u64, limit: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

pub type ConversionResult<T> = Result<T, ConversionError>;

impl ConversionError {
    /// Message for the status line; tool stderr is cut to a short excerpt
    pub fn user_message(&self) -> String {
        match self {
            ConversionError::ToolFailed(stderr) => {
                format!("FFmpeg error: {}", excerpt(stderr, config::tool::STDERR_EXCERPT_CHARS))
            }
            ConversionError::SizeExceeded { actual, limit } => format!(
                "File too large: {} (limit {})",
                human_bytes(*actual),
                human_bytes(*limit)
            ),
            other => other.to_string(),
        }
    }
}

/// First `max_chars` characters of `text`, trimmed
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Kind of an inbound or queued file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Document,
    Subtitle,
}

pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".avi", ".mov", ".flv", ".wmv", ".webm", ".m4v"];
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".m4a", ".aac", ".opus", ".flac", ".wav", ".ogg"];
pub const SUBTITLE_EXTENSIONS: &[&str] = &[".srt", ".ass", ".vtt", ".sub"];

/// Splits `name` into stem and extension (with the dot, possibly empty).
///
/// A leading dot is part of the stem, so `.hidden` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && !name[idx..].contains(['/', '\\', ' ']) => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

fn extension_lower(name: &str) -> String {
    split_extension(name).1.to_lowercase()
}

pub fn is_video_name(name: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&extension_lower(name).as_str())
}

pub fn is_audio_name(name: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&extension_lower(name).as_str())
}

pub fn is_subtitle_name(name: &str) -> bool {
    SUBTITLE_EXTENSIONS.contains(&extension_lower(name).as_str())
}

/// True when `name` ends with any recognized media or subtitle extension
pub fn has_media_extension(name: &str) -> bool {
    is_video_name(name) || is_audio_name(name) || is_subtitle_name(name)
}

/// Human readable size, e.g. `1.50 GB`
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Formats seconds as `H:MM:SS`
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Parses `HH:MM:SS`, `MM:SS` or plain seconds. Seconds may carry a fraction.
///
/// Returns `None` for anything else (no guessing on ambiguous input).
pub fn parse_time(input: &str) -> Option<f64> {
    let input = input.trim();
    // Keeps float syntax like `1e3`, `inf` or `NaN` away from the parser
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ':') {
        return None;
    }
    let parts: Vec<&str> = input.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let (whole, last) = parts.split_at(parts.len() - 1);
    let seconds: f64 = last[0].trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 || (!whole.is_empty() && seconds >= 60.0) {
        return None;
    }

    let mut total = 0u64;
    for (i, part) in whole.iter().enumerate() {
        let value: u64 = part.trim().parse().ok()?;
        // Minutes must be below 60 when hours are present
        if whole.len() == 2 && i == 1 && value >= 60 {
            return None;
        }
        total = total * 60 + value;
    }

    Some(total as f64 * 60.0 + seconds)
}

/// Collision-resistant scratch path under `dir`
pub fn temp_output_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    let name = if extension.is_empty() {
        format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
    } else {
        format!("{}_{}.{}", prefix, uuid::Uuid::new_v4().simple(), extension)
    };
    dir.join(name)
}

/// Get file size in bytes
pub async fn get_file_size<P: AsRef<Path>>(path: P) -> ConversionResult<u64> {
    let metadata = fs_err::tokio::metadata(path.as_ref()).await?;
    Ok(metadata.len())
}

/// Removes a scratch file, logging instead of failing
pub async fn remove_quietly(path: &Path) {
    match fs_err::tokio::remove_file(path).await {
        Ok(()) => log::debug!("🧹 Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Removes a scratch directory tree, logging instead of failing
pub async fn remove_dir_quietly(path: &Path) {
    match fs_err::tokio::remove_dir_all(path).await {
        Ok(()) => log::debug!("🧹 Removed directory {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove directory {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("Show.S01.WEB-DL.mkv"), ("Show.S01.WEB-DL", ".mkv"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("Episode 5. Finale"), ("Episode 5. Finale", ""));
    }

    #[test]
    fn test_extension_classification() {
        assert!(is_video_name("a.MKV"));
        assert!(is_audio_name("a.flac"));
        assert!(is_subtitle_name("a.ass"));
        assert!(!has_media_extension("a.txt"));
        assert!(!has_media_extension("Some caption"));
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("90"), Some(90.0));
        assert_eq!(parse_time("1:30"), Some(90.0));
        assert_eq!(parse_time("01:02:03"), Some(3723.0));
        assert_eq!(parse_time("00:00:01.5"), Some(1.5));
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("abc"), None);
        assert_eq!(parse_time("1:2:3:4"), None);
        assert_eq!(parse_time("1:75"), None);
        assert_eq!(parse_time("1:75:00"), None);
        assert_eq!(parse_time("-5"), None);
    }

    #[test]
    fn test_parse_time_rejects_float_spellings() {
        assert_eq!(parse_time("1e3"), None);
        assert_eq!(parse_time("1:1e1"), None);
        assert_eq!(parse_time("inf"), None);
        assert_eq!(parse_time("NaN"), None);
        assert_eq!(parse_time("+5"), None);
        assert_eq!(parse_time("1: 30"), None);
        assert_eq!(parse_time(" 1:30 "), Some(90.0));
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.50 KB");
        assert_eq!(human_bytes(2 * 1024 * 1024 * 1024), "2.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(3723.4), "1:02:03");
        assert_eq!(format_duration(f64::NAN), "0:00:00");
    }

    #[test]
    fn test_tool_failure_message_is_truncated() {
        let err = ConversionError::ToolFailed("x".repeat(500));
        let msg = err.user_message();
        assert!(msg.chars().count() < 220);
        assert!(msg.ends_with('…'));
    }

    #[test]
    fn test_temp_paths_do_not_collide() {
        let dir = Path::new("/tmp");
        let a = temp_output_path(dir, "dl", "mp4");
        let b = temp_output_path(dir, "dl", ".mp4");
        assert_ne!(a, b);
        assert_eq!(b.extension().and_then(|e| e.to_str()), Some("mp4"));
    }

    #[test]
    fn test_media_kind_round_trips_through_strings() {
        assert_eq!(MediaKind::Subtitle.to_string(), "subtitle");
        assert_eq!("video".parse::<MediaKind>().unwrap(), MediaKind::Video);
    }
}
