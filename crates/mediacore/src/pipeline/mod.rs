//! Media job pipeline.
//!
//! An inbound file goes through the dispatcher to exactly one job:
//!
//! ```text
//! file ─► dispatcher ─► series | rename | trim | compress | extract | merge | autotrim
//!                        │
//!                        └─► acquire ─► ffmpeg ─► deliver ─► cleanup
//! ```
//!
//! Jobs that need a choice first (compress, extract, auto-trim) park the file
//! in the pending-choice cache and resume from [`Pipeline::handle_choice`].
//! Every job reports through one edited status message.

pub mod actor;
pub mod autotrim;
pub mod choices;
pub mod compress;
pub mod dispatcher;
pub mod extract;
pub mod fetch;
pub mod guard;
pub mod merge;
pub mod rename;
pub mod scratch;
pub mod series;
pub mod status;
pub mod transfer;
pub mod trim;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config;
use crate::core::retry::RetryConfig;
use crate::media::tool::MediaTool;
use crate::storage::{SettingsStore, UserId};
use crate::transport::{ChatRef, RemoteFile, Transport};

use self::actor::SizeLimits;
use self::autotrim::session::AutotrimSessions;
use self::choices::PendingChoices;
use self::guard::InFlightGuard;

/// Runtime knobs of the pipeline, defaulted from the environment
#[derive(Debug, Clone, bon::Builder)]
pub struct PipelineSettings {
    #[builder(default = config::TEMP_FILES_DIR.clone(), into)]
    pub scratch_dir: PathBuf,
    #[builder(default = SizeLimits::from_config())]
    pub limits: SizeLimits,
    #[builder(default = config::prompts::rename_timeout())]
    pub rename_timeout: Duration,
    #[builder(default = config::prompts::trim_file_timeout())]
    pub trim_file_timeout: Duration,
    #[builder(default = config::prompts::trim_link_timeout())]
    pub trim_link_timeout: Duration,
    #[builder(default = config::dedup::window())]
    pub dedup_window: Duration,
    #[builder(default = config::series::PREFIX.clone(), into)]
    pub series_prefix: String,
    #[builder(default = *config::series::CHANNEL)]
    pub series_channel: i64,
    #[builder(default = config::series::THUMBNAIL_URL.clone(), into)]
    pub series_thumbnail_url: String,
    #[builder(default = config::series::TITLE.clone(), into)]
    pub series_title: String,
    #[builder(default = config::INTRO_TITLE_VIDEO.clone(), into)]
    pub intro_video_url: String,
    /// Retries for transfers that come back without a file handle
    #[builder(default = RetryConfig::quick())]
    pub acquire_retry: RetryConfig,
    #[builder(default = config::network::timeout())]
    pub http_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One inbound file-bearing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub user_id: UserId,
    pub chat: ChatRef,
    pub file: RemoteFile,
    pub caption: Option<String>,
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Some outputs failed, the rest were delivered
    Partial { succeeded: usize, failed: usize },
    /// Normal "nothing to do" result (no subtitles, no intro hits, empty queue)
    Info(String),
    /// File appended to the merge queue
    Queued { position: usize },
    /// Buttons were offered; the job continues from a callback
    AwaitingChoice,
    /// Waiting for a plain-text reply in a session
    AwaitingReply,
    /// Same file already in flight
    Duplicate,
    /// The user cancelled or a prompt timed out where that aborts
    Cancelled,
    Failed(String),
}

impl JobOutcome {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Partial { .. } => "partial",
            JobOutcome::Info(_) => "info",
            JobOutcome::Queued { .. } => "queued",
            JobOutcome::AwaitingChoice => "awaiting_choice",
            JobOutcome::AwaitingReply => "awaiting_reply",
            JobOutcome::Duplicate => "duplicate",
            JobOutcome::Cancelled => "cancelled",
            JobOutcome::Failed(_) => "failed",
        }
    }
}

/// Process-wide pipeline state. Cheap to clone; every clone shares the same
/// guard, pending choices and auto-trim sessions.
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn SettingsStore>,
    pub(crate) tool: Arc<dyn MediaTool>,
    pub(crate) guard: InFlightGuard,
    pub(crate) pending: PendingChoices,
    pub(crate) sessions: AutotrimSessions,
    pub(crate) http: reqwest::Client,
    pub(crate) settings: Arc<PipelineSettings>,
}

impl Pipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SettingsStore>,
        tool: Arc<dyn MediaTool>,
        settings: PipelineSettings,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build HTTP client with timeout ({}), using defaults", e);
                reqwest::Client::new()
            });

        Self {
            transport,
            store,
            tool,
            guard: InFlightGuard::new(settings.dedup_window),
            pending: PendingChoices::new(),
            sessions: AutotrimSessions::default(),
            http,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn sessions(&self) -> &AutotrimSessions {
        &self.sessions
    }

    /// Scratch directory, created on demand
    pub(crate) async fn scratch_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.settings.scratch_dir.clone();
        fs_err::tokio::create_dir_all(&dir).await?;
        Ok(dir)
    }
}
