//! Messaging transport interface.
//!
//! The pipeline talks to chats only through [`Transport`]. The bot crate
//! implements it on top of teloxide with a primary and an optional elevated
//! identity; tests implement it with a recording mock.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::AppResult;
use crate::media::MediaKind;

/// A chat (private chat with a user, or a channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

/// A message the bot can later edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat: ChatRef,
    pub message_id: i32,
}

/// Upload/download identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Actor {
    /// Always available, smaller size ceiling
    Primary,
    /// Optional, larger size ceiling
    Elevated,
}

/// Container class used when sending a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SendAs {
    Document,
    Video,
    Audio,
    Photo,
}

/// A local file to deliver
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingFile {
    pub path: PathBuf,
    /// Name shown to the recipient
    pub filename: String,
    pub caption: Option<String>,
    pub thumbnail: Option<PathBuf>,
    pub send_as: SendAs,
    pub duration_secs: Option<u32>,
}

impl OutgoingFile {
    pub fn new(path: impl Into<PathBuf>, filename: impl Into<String>, send_as: SendAs) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            caption: None,
            thumbnail: None,
            send_as,
            duration_secs: None,
        }
    }

    #[must_use]
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    #[must_use]
    pub fn thumbnail(mut self, thumbnail: Option<PathBuf>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    #[must_use]
    pub fn duration(mut self, seconds: Option<f64>) -> Self {
        self.duration_secs = seconds.filter(|s| s.is_finite() && *s > 0.0).map(|s| s.round() as u32);
        self
    }
}

/// A file attached to a message in a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub file_id: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub kind: MediaKind,
    pub message_id: i32,
}

/// One inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Outcome of an interactive prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    TimedOut,
}

/// One acquisition attempt. `attempt` lets the transport vary how it asks
/// for the file when a previous attempt came back without a handle.
#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    pub actor: Actor,
    pub file_id: &'a str,
    pub dest: &'a Path,
    pub progress: Option<MessageRef>,
    pub attempt: u32,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat: ChatRef, text: &str) -> AppResult<MessageRef>;

    async fn send_with_buttons(&self, chat: ChatRef, text: &str, rows: Vec<Vec<Button>>) -> AppResult<MessageRef>;

    async fn edit_text(&self, message: MessageRef, text: &str) -> AppResult<()>;

    /// Sends a local file, reporting progress on `progress` when given
    async fn send_file(
        &self,
        actor: Actor,
        chat: ChatRef,
        file: &OutgoingFile,
        progress: Option<MessageRef>,
    ) -> AppResult<()>;

    /// Downloads a file to `request.dest`. `Ok(None)` means the transport
    /// handed back no file handle; callers retry.
    async fn download(&self, request: DownloadRequest<'_>) -> AppResult<Option<PathBuf>>;

    /// Sends `prompt` and waits for the user's next text message
    async fn ask(&self, chat: ChatRef, prompt: &str, timeout: Duration) -> AppResult<Reply>;

    /// File attached to message `message_id` in `chat`, if it still exists
    async fn fetch_file(&self, chat: ChatRef, message_id: i32) -> AppResult<Option<RemoteFile>>;

    /// Channel title when the bot is an administrator there
    async fn channel_title_if_admin(&self, channel: ChatRef) -> AppResult<Option<String>>;

    /// Liveness check for an identity
    async fn is_connected(&self, actor: Actor) -> bool;

    /// True when an elevated identity is configured
    fn has_elevated(&self) -> bool;
}
