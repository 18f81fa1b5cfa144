//! SQLite-backed [`SettingsStore`].

use async_trait::async_trait;
use rusqlite::types::{FromSql, Value};
use rusqlite::{params, OptionalExtension};

use super::db::{with_connection, DbPool};
use super::{MediaMode, MediaPreference, QueuedFile, SettingsStore, UserId, UserPreferences};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::media::MediaKind;

/// Columns of `user_settings` that are written one at a time
#[derive(Debug, Clone, Copy)]
enum Column {
    MediaMode,
    FormatTemplate,
    RemoveWords,
    ReplaceWords,
    Prefix,
    Suffix,
    UploadChannel,
    Thumbnail,
    Caption,
    MetadataEnabled,
    MetadataText,
    MediaPreference,
    CompressionQualities,
    MergeType,
}

impl Column {
    fn name(self) -> &'static str {
        match self {
            Column::MediaMode => "media_mode",
            Column::FormatTemplate => "format_template",
            Column::RemoveWords => "remove_words",
            Column::ReplaceWords => "replace_words",
            Column::Prefix => "prefix",
            Column::Suffix => "suffix",
            Column::UploadChannel => "upload_channel",
            Column::Thumbnail => "thumbnail",
            Column::Caption => "caption",
            Column::MetadataEnabled => "metadata_enabled",
            Column::MetadataText => "metadata_text",
            Column::MediaPreference => "media_preference",
            Column::CompressionQualities => "compression_qualities",
            Column::MergeType => "merge_type",
        }
    }
}

fn text_or_null(value: Option<String>) -> Value {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => Value::Text(v),
        None => Value::Null,
    }
}

fn json_text<T: serde::Serialize>(value: &T) -> AppResult<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

fn parse_json_list<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Vec<T> {
    raw.and_then(|s| match serde_json::from_str(&s) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Corrupt JSON list in settings ({}), treating as empty", e);
            None
        }
    })
    .unwrap_or_default()
}

fn parse_preference(raw: Option<String>) -> Option<MediaPreference> {
    raw.and_then(|s| s.parse().ok())
}

/// Settings store over an r2d2 SQLite pool
#[derive(Clone)]
pub struct SqliteSettingsStore {
    pool: DbPool,
    default_metadata_text: String,
    default_mode: MediaMode,
}

impl SqliteSettingsStore {
    pub fn new(pool: DbPool) -> Self {
        Self::with_default_metadata(pool, config::DEFAULT_METADATA_TEXT.as_str())
            .with_default_mode(*config::DEFAULT_MEDIA_MODE)
    }

    pub fn with_default_metadata(pool: DbPool, default_metadata_text: &str) -> Self {
        Self {
            pool,
            default_metadata_text: default_metadata_text.to_string(),
            default_mode: MediaMode::default(),
        }
    }

    /// Mode reported for users who never set one
    pub fn with_default_mode(mut self, mode: MediaMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Reads one column; `None` when the user has no row yet
    async fn read<T>(&self, user: UserId, column: Column) -> AppResult<Option<T>>
    where
        T: FromSql + Send + 'static,
    {
        let sql = format!("SELECT {} FROM user_settings WHERE user_id = ?1", column.name());
        with_connection(&self.pool, move |conn| {
            Ok(conn.query_row(&sql, params![user], |row| row.get::<_, T>(0)).optional()?)
        })
        .await
    }

    /// Upserts one column
    async fn write(&self, user: UserId, column: Column, value: Value) -> AppResult<()> {
        let col = column.name();
        let sql = format!(
            "INSERT INTO user_settings (user_id, {col}, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET {col} = excluded.{col}, updated_at = excluded.updated_at"
        );
        let now = chrono::Utc::now().to_rfc3339();
        with_connection(&self.pool, move |conn| {
            conn.execute(&sql, params![user, value, now])?;
            Ok(())
        })
        .await
    }

    async fn read_nullable_text(&self, user: UserId, column: Column) -> AppResult<Option<String>> {
        Ok(self.read::<Option<String>>(user, column).await?.flatten())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_preferences(&self, user: UserId) -> AppResult<UserPreferences> {
        let default_text = self.default_metadata_text.clone();
        let default_mode = self.default_mode;
        with_connection(&self.pool, move |conn| {
            let prefs = conn
                .query_row(
                    "SELECT media_mode, format_template, remove_words, replace_words, prefix, suffix, \
                     upload_channel, thumbnail, caption, metadata_enabled, metadata_text, media_preference, \
                     compression_qualities, merge_type FROM user_settings WHERE user_id = ?1",
                    params![user],
                    |row| {
                        let media_mode: Option<String> = row.get(0)?;
                        let metadata_text: Option<String> = row.get(10)?;
                        Ok(UserPreferences {
                            user_id: user,
                            media_mode: media_mode.map_or(default_mode, |m| MediaMode::from_stored(&m)),
                            format_template: row.get(1)?,
                            remove_words: parse_json_list(row.get(2)?),
                            replace_words: parse_json_list(row.get(3)?),
                            prefix: row.get(4)?,
                            suffix: row.get(5)?,
                            upload_channel: row.get(6)?,
                            thumbnail: row.get(7)?,
                            caption: row.get(8)?,
                            metadata_enabled: row.get::<_, i64>(9)? != 0,
                            metadata_text: metadata_text.unwrap_or_else(|| default_text.clone()),
                            media_preference: parse_preference(row.get(11)?),
                            compression_qualities: parse_json_list(row.get(12)?),
                            merge_type: row.get(13)?,
                        })
                    },
                )
                .optional()?;
            Ok(prefs.unwrap_or_else(|| UserPreferences {
                media_mode: default_mode,
                ..UserPreferences::defaults(user, &default_text)
            }))
        })
        .await
    }

    async fn get_format_template(&self, user: UserId) -> AppResult<Option<String>> {
        self.read_nullable_text(user, Column::FormatTemplate).await
    }

    async fn set_format_template(&self, user: UserId, template: Option<String>) -> AppResult<()> {
        let template = template.filter(|t| !t.trim().eq_ignore_ascii_case("none"));
        self.write(user, Column::FormatTemplate, text_or_null(template)).await
    }

    async fn get_media_mode(&self, user: UserId) -> AppResult<MediaMode> {
        Ok(self
            .read_nullable_text(user, Column::MediaMode)
            .await?
            .map_or(self.default_mode, |m| MediaMode::from_stored(&m)))
    }

    async fn set_media_mode(&self, user: UserId, mode: MediaMode) -> AppResult<()> {
        self.write(user, Column::MediaMode, Value::Text(mode.to_string())).await
    }

    async fn get_remove_words(&self, user: UserId) -> AppResult<Vec<String>> {
        Ok(parse_json_list(self.read::<String>(user, Column::RemoveWords).await?))
    }

    async fn set_remove_words(&self, user: UserId, words: Vec<String>) -> AppResult<()> {
        self.write(user, Column::RemoveWords, json_text(&words)?).await
    }

    async fn get_replace_words(&self, user: UserId) -> AppResult<Vec<(String, String)>> {
        Ok(parse_json_list(self.read::<String>(user, Column::ReplaceWords).await?))
    }

    async fn set_replace_words(&self, user: UserId, pairs: Vec<(String, String)>) -> AppResult<()> {
        self.write(user, Column::ReplaceWords, json_text(&pairs)?).await
    }

    async fn get_prefix(&self, user: UserId) -> AppResult<Option<String>> {
        self.read_nullable_text(user, Column::Prefix).await
    }

    async fn set_prefix(&self, user: UserId, prefix: Option<String>) -> AppResult<()> {
        self.write(user, Column::Prefix, text_or_null(prefix)).await
    }

    async fn get_suffix(&self, user: UserId) -> AppResult<Option<String>> {
        self.read_nullable_text(user, Column::Suffix).await
    }

    async fn set_suffix(&self, user: UserId, suffix: Option<String>) -> AppResult<()> {
        self.write(user, Column::Suffix, text_or_null(suffix)).await
    }

    async fn get_upload_channel(&self, user: UserId) -> AppResult<Option<i64>> {
        Ok(self.read::<Option<i64>>(user, Column::UploadChannel).await?.flatten())
    }

    async fn set_upload_channel(&self, user: UserId, channel: i64) -> AppResult<()> {
        self.write(user, Column::UploadChannel, Value::Integer(channel)).await
    }

    async fn delete_upload_channel(&self, user: UserId) -> AppResult<()> {
        self.write(user, Column::UploadChannel, Value::Null).await
    }

    async fn get_thumbnail(&self, user: UserId) -> AppResult<Option<String>> {
        self.read_nullable_text(user, Column::Thumbnail).await
    }

    async fn set_thumbnail(&self, user: UserId, file_id: Option<String>) -> AppResult<()> {
        self.write(user, Column::Thumbnail, text_or_null(file_id)).await
    }

    async fn get_caption(&self, user: UserId) -> AppResult<Option<String>> {
        self.read_nullable_text(user, Column::Caption).await
    }

    async fn set_caption(&self, user: UserId, caption: Option<String>) -> AppResult<()> {
        self.write(user, Column::Caption, text_or_null(caption)).await
    }

    async fn get_metadata_enabled(&self, user: UserId) -> AppResult<bool> {
        Ok(self
            .read::<i64>(user, Column::MetadataEnabled)
            .await?
            .map(|v| v != 0)
            .unwrap_or(true))
    }

    async fn set_metadata_enabled(&self, user: UserId, enabled: bool) -> AppResult<()> {
        self.write(user, Column::MetadataEnabled, Value::Integer(i64::from(enabled)))
            .await
    }

    async fn get_metadata_text(&self, user: UserId) -> AppResult<String> {
        Ok(self
            .read_nullable_text(user, Column::MetadataText)
            .await?
            .unwrap_or_else(|| self.default_metadata_text.clone()))
    }

    async fn set_metadata_text(&self, user: UserId, text: String) -> AppResult<()> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("Metadata text cannot be empty".to_string()));
        }
        self.write(user, Column::MetadataText, Value::Text(text)).await
    }

    async fn get_media_type_preference(&self, user: UserId) -> AppResult<Option<MediaPreference>> {
        Ok(parse_preference(self.read_nullable_text(user, Column::MediaPreference).await?))
    }

    async fn set_media_type_preference(&self, user: UserId, preference: Option<MediaPreference>) -> AppResult<()> {
        self.write(
            user,
            Column::MediaPreference,
            text_or_null(preference.map(|p| p.to_string())),
        )
        .await
    }

    async fn get_compression_qualities(&self, user: UserId) -> AppResult<Vec<String>> {
        Ok(parse_json_list(self.read::<String>(user, Column::CompressionQualities).await?))
    }

    async fn set_compression_qualities(&self, user: UserId, labels: Vec<String>) -> AppResult<()> {
        self.write(user, Column::CompressionQualities, json_text(&labels)?).await
    }

    async fn get_merge_queue(&self, user: UserId) -> AppResult<Vec<QueuedFile>> {
        with_connection(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT source_file_id, filename, size_bytes, kind, source_message_id \
                 FROM merge_queue WHERE user_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![user], |row| {
                let kind: String = row.get(3)?;
                let size: i64 = row.get(2)?;
                Ok(QueuedFile {
                    source_file_id: row.get(0)?,
                    filename: row.get(1)?,
                    size_bytes: u64::try_from(size).unwrap_or(0),
                    kind: kind.parse().unwrap_or(MediaKind::Document),
                    source_message_id: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn append_merge_queue(&self, user: UserId, file: QueuedFile) -> AppResult<()> {
        with_connection(&self.pool, move |conn| {
            conn.execute(
                "INSERT INTO merge_queue (user_id, source_file_id, filename, size_bytes, kind, source_message_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user,
                    file.source_file_id,
                    file.filename,
                    i64::try_from(file.size_bytes).unwrap_or(i64::MAX),
                    file.kind.to_string(),
                    file.source_message_id
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear_merge_queue(&self, user: UserId) -> AppResult<()> {
        with_connection(&self.pool, move |conn| {
            conn.execute("DELETE FROM merge_queue WHERE user_id = ?1", params![user])?;
            Ok(())
        })
        .await
    }

    async fn get_merge_type(&self, user: UserId) -> AppResult<Option<String>> {
        self.read_nullable_text(user, Column::MergeType).await
    }

    async fn set_merge_type(&self, user: UserId, merge_type: Option<String>) -> AppResult<()> {
        self.write(user, Column::MergeType, text_or_null(merge_type)).await
    }

    async fn clear_word_rules(&self, user: UserId) -> AppResult<()> {
        self.set_remove_words(user, Vec::new()).await?;
        self.set_replace_words(user, Vec::new()).await
    }

    async fn reset_naming_rules(&self, user: UserId) -> AppResult<()> {
        self.clear_word_rules(user).await?;
        self.set_prefix(user, None).await?;
        self.set_suffix(user, None).await
    }
}

/// Appends words not already present, keeping order
pub fn merge_remove_words(existing: &[String], input: &str) -> Vec<String> {
    let mut words = existing.to_vec();
    for word in input.split(',').map(str::trim).filter(|w| !w.is_empty()) {
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    words
}

/// Parses `old:new,old2:new2` and upserts into `existing`.
///
/// Returns the merged list plus the pairs that could not be parsed. An empty
/// replacement is allowed (`old:` deletes `old`).
pub fn merge_replace_words(existing: &[(String, String)], input: &str) -> (Vec<(String, String)>, Vec<String>) {
    let mut pairs = existing.to_vec();
    let mut invalid = Vec::new();
    for raw in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match raw.split_once(':') {
            Some((old, new)) if !old.trim().is_empty() => {
                let (old, new) = (old.trim().to_string(), new.trim().to_string());
                match pairs.iter_mut().find(|(o, _)| *o == old) {
                    Some(slot) => slot.1 = new,
                    None => pairs.push((old, new)),
                }
            }
            _ => invalid.push(raw.to_string()),
        }
    }
    (pairs, invalid)
}
