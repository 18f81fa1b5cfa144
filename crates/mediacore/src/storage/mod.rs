//! Per-user settings: data model, store interface and the SQLite implementation.

pub mod db;
pub mod migrations;
pub mod settings;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::core::error::AppResult;
use crate::media::MediaKind;
use crate::naming::NamingRules;

pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use settings::SqliteSettingsStore;

/// User identity as issued by the transport
pub type UserId = i64;

/// What a user's inbound files are used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MediaMode {
    #[default]
    Rename,
    Trim,
    Extract,
    Merge,
    Compress,
    Autotrim,
}

impl MediaMode {
    /// Parses a stored value; anything unknown recovers to `Rename`
    pub fn from_stored(value: &str) -> Self {
        value.trim().parse().unwrap_or_else(|_| {
            log::warn!("Unknown stored media mode {:?}, using rename", value);
            MediaMode::Rename
        })
    }

    /// Every mode name, for usage messages
    pub fn names() -> Vec<String> {
        MediaMode::iter().map(|m| m.to_string()).collect()
    }
}

/// Explicit output container class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MediaPreference {
    Document,
    Video,
    Audio,
}

/// One file waiting in a merge queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedFile {
    pub source_file_id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub kind: MediaKind,
    pub source_message_id: i32,
}

/// Whole preference record of one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPreferences {
    pub user_id: UserId,
    pub media_mode: MediaMode,
    pub format_template: Option<String>,
    pub remove_words: Vec<String>,
    pub replace_words: Vec<(String, String)>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub upload_channel: Option<i64>,
    pub thumbnail: Option<String>,
    pub caption: Option<String>,
    pub metadata_enabled: bool,
    pub metadata_text: String,
    pub media_preference: Option<MediaPreference>,
    pub compression_qualities: Vec<String>,
    pub merge_type: Option<String>,
}

impl UserPreferences {
    /// Defaults for a user that never changed anything
    pub fn defaults(user_id: UserId, metadata_text: &str) -> Self {
        Self {
            user_id,
            media_mode: MediaMode::Rename,
            format_template: None,
            remove_words: Vec::new(),
            replace_words: Vec::new(),
            prefix: None,
            suffix: None,
            upload_channel: None,
            thumbnail: None,
            caption: None,
            metadata_enabled: true,
            metadata_text: metadata_text.to_string(),
            media_preference: None,
            compression_qualities: Vec::new(),
            merge_type: None,
        }
    }

    pub fn naming_rules(&self) -> NamingRules {
        NamingRules {
            template: self.format_template.clone(),
            remove_words: self.remove_words.clone(),
            replace_words: self.replace_words.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

/// Key-value settings keyed by user identity.
///
/// Every setter is a single-field update; nothing serializes two writes from
/// the same user beyond what the backend provides per statement.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_preferences(&self, user: UserId) -> AppResult<UserPreferences>;

    async fn get_format_template(&self, user: UserId) -> AppResult<Option<String>>;
    /// `None` or the literal `none` clears the template
    async fn set_format_template(&self, user: UserId, template: Option<String>) -> AppResult<()>;

    async fn get_media_mode(&self, user: UserId) -> AppResult<MediaMode>;
    async fn set_media_mode(&self, user: UserId, mode: MediaMode) -> AppResult<()>;

    async fn get_remove_words(&self, user: UserId) -> AppResult<Vec<String>>;
    async fn set_remove_words(&self, user: UserId, words: Vec<String>) -> AppResult<()>;

    async fn get_replace_words(&self, user: UserId) -> AppResult<Vec<(String, String)>>;
    async fn set_replace_words(&self, user: UserId, pairs: Vec<(String, String)>) -> AppResult<()>;

    async fn get_prefix(&self, user: UserId) -> AppResult<Option<String>>;
    async fn set_prefix(&self, user: UserId, prefix: Option<String>) -> AppResult<()>;

    async fn get_suffix(&self, user: UserId) -> AppResult<Option<String>>;
    async fn set_suffix(&self, user: UserId, suffix: Option<String>) -> AppResult<()>;

    async fn get_upload_channel(&self, user: UserId) -> AppResult<Option<i64>>;
    async fn set_upload_channel(&self, user: UserId, channel: i64) -> AppResult<()>;
    async fn delete_upload_channel(&self, user: UserId) -> AppResult<()>;

    async fn get_thumbnail(&self, user: UserId) -> AppResult<Option<String>>;
    async fn set_thumbnail(&self, user: UserId, file_id: Option<String>) -> AppResult<()>;

    async fn get_caption(&self, user: UserId) -> AppResult<Option<String>>;
    async fn set_caption(&self, user: UserId, caption: Option<String>) -> AppResult<()>;

    async fn get_metadata_enabled(&self, user: UserId) -> AppResult<bool>;
    async fn set_metadata_enabled(&self, user: UserId, enabled: bool) -> AppResult<()>;

    async fn get_metadata_text(&self, user: UserId) -> AppResult<String>;
    async fn set_metadata_text(&self, user: UserId, text: String) -> AppResult<()>;

    async fn get_media_type_preference(&self, user: UserId) -> AppResult<Option<MediaPreference>>;
    async fn set_media_type_preference(&self, user: UserId, preference: Option<MediaPreference>) -> AppResult<()>;

    async fn get_compression_qualities(&self, user: UserId) -> AppResult<Vec<String>>;
    async fn set_compression_qualities(&self, user: UserId, labels: Vec<String>) -> AppResult<()>;

    async fn get_merge_queue(&self, user: UserId) -> AppResult<Vec<QueuedFile>>;
    async fn append_merge_queue(&self, user: UserId, file: QueuedFile) -> AppResult<()>;
    async fn clear_merge_queue(&self, user: UserId) -> AppResult<()>;

    async fn get_merge_type(&self, user: UserId) -> AppResult<Option<String>>;
    async fn set_merge_type(&self, user: UserId, merge_type: Option<String>) -> AppResult<()>;

    /// Clears remove and replace rules
    async fn clear_word_rules(&self, user: UserId) -> AppResult<()>;

    /// Clears remove/replace rules plus prefix and suffix
    async fn reset_naming_rules(&self, user: UserId) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unknown_mode_recovers_to_rename() {
        assert_eq!(MediaMode::from_stored("compress"), MediaMode::Compress);
        assert_eq!(MediaMode::from_stored("AutoTrim"), MediaMode::Autotrim);
        assert_eq!(MediaMode::from_stored("garbage"), MediaMode::Rename);
        assert_eq!(MediaMode::from_stored(""), MediaMode::Rename);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(
            MediaMode::names(),
            vec!["rename", "trim", "extract", "merge", "compress", "autotrim"]
        );
    }

    #[test]
    fn test_defaults() {
        let prefs = UserPreferences::defaults(7, "tag");
        assert_eq!(prefs.media_mode, MediaMode::Rename);
        assert!(prefs.metadata_enabled);
        assert_eq!(prefs.metadata_text, "tag");
        assert!(!prefs.naming_rules().has_word_rules());
    }
}
