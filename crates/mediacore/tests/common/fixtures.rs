//! Temp-dir backed pipeline fixtures

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mediacore::core::retry::RetryConfig;
use mediacore::media::MediaKind;
use mediacore::pipeline::actor::SizeLimits;
use mediacore::storage::{create_pool, SqliteSettingsStore, UserId};
use mediacore::transport::{ChatRef, RemoteFile};
use mediacore::{JobRequest, Pipeline, PipelineSettings};
use tempfile::TempDir;

use super::recorder::RecordingTransport;
use super::tool::ScriptedTool;

pub const USER: UserId = 42;
pub const CHAT: ChatRef = ChatRef(42);
pub const SERIES_CHANNEL: i64 = -100_500;
pub const MB: u64 = 1024 * 1024;

pub fn test_limits() -> SizeLimits {
    SizeLimits {
        primary: 20 * MB,
        elevated: 200 * MB,
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub transport: Arc<RecordingTransport>,
    pub tool: Arc<ScriptedTool>,
    pub store: Arc<SqliteSettingsStore>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(transport: RecordingTransport, tool: ScriptedTool) -> Self {
        Self::with_intro(transport, tool, "http://127.0.0.1:9/intro.mp4")
    }

    /// Same as [`Harness::new`] with the auto-trim intro served from `intro_url`
    pub fn with_intro(transport: RecordingTransport, tool: ScriptedTool, intro_url: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("settings.sqlite");
        let pool = create_pool(db_path.to_str().unwrap()).unwrap();
        let store = Arc::new(SqliteSettingsStore::with_default_metadata(pool, "Encoded by tests"));

        let settings = PipelineSettings::builder()
            .scratch_dir(dir.path().join("scratch"))
            .limits(test_limits())
            .dedup_window(Duration::from_secs(300))
            .series_prefix("Test Series")
            .series_channel(SERIES_CHANNEL)
            .series_title("Test Series")
            .series_thumbnail_url("http://127.0.0.1:9/thumb.jpg")
            .intro_video_url(intro_url)
            .acquire_retry(RetryConfig::quick().initial_delay(Duration::from_millis(5)).no_jitter())
            .http_timeout(Duration::from_secs(5))
            .build();

        let transport = Arc::new(transport);
        let tool = Arc::new(tool);
        let pipeline = Pipeline::new(transport.clone(), store.clone(), tool.clone(), settings);
        Self {
            pipeline,
            transport,
            tool,
            store,
            dir,
        }
    }

    /// Files left behind in the scratch directory
    pub fn scratch_leftovers(&self) -> Vec<String> {
        let scratch = self.dir.path().join("scratch");
        match std::fs::read_dir(scratch) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn remote_file(file_id: &str, file_name: &str, kind: MediaKind) -> RemoteFile {
    RemoteFile {
        file_id: file_id.to_string(),
        file_name: file_name.to_string(),
        size_bytes: 5 * MB,
        kind,
        message_id: 7,
    }
}

pub fn video_request(file_id: &str, file_name: &str) -> JobRequest {
    JobRequest {
        user_id: USER,
        chat: CHAT,
        file: remote_file(file_id, file_name, MediaKind::Video),
        caption: None,
    }
}
