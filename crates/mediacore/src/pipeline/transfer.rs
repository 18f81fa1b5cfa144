//! Acquisition and delivery shared by every job.

use std::path::{Path, PathBuf};

use super::actor::{elevated_available, select_actor, upload_actor, ActorChoice};
use super::Pipeline;
use crate::core::error::{AppError, AppResult};
use crate::core::retry::retry;
use crate::media::{get_file_size, human_bytes, MediaKind};
use crate::storage::MediaPreference;
use crate::transport::{Actor, ChatRef, DownloadRequest, MessageRef, OutgoingFile, RemoteFile, SendAs};

/// Container class for an upload: explicit preference, else inferred from the input kind
pub fn send_as_for(preference: Option<MediaPreference>, kind: MediaKind) -> SendAs {
    match preference {
        Some(MediaPreference::Document) => SendAs::Document,
        Some(MediaPreference::Video) => SendAs::Video,
        Some(MediaPreference::Audio) => SendAs::Audio,
        None => match kind {
            MediaKind::Video => SendAs::Video,
            MediaKind::Audio => SendAs::Audio,
            MediaKind::Document | MediaKind::Subtitle => SendAs::Document,
        },
    }
}

/// User-facing size rejection
pub fn size_limit_message(size: u64, limit: u64) -> String {
    format!(
        "❌ File Too Large!\n\nFile Size: {}\nMaximum: {}",
        human_bytes(size),
        human_bytes(limit)
    )
}

impl Pipeline {
    /// Largest link download worth fetching: what can still be uploaded right now
    pub(crate) async fn link_size_limit(&self) -> u64 {
        self.settings
            .limits
            .effective(elevated_available(self.transport.as_ref()).await)
    }

    /// Actor able to download `size` bytes right now, or a size error
    pub(crate) async fn download_actor(&self, size: u64) -> AppResult<Actor> {
        let elevated = elevated_available(self.transport.as_ref()).await;
        match select_actor(size, elevated, self.settings.limits) {
            ActorChoice::Use(actor) => Ok(actor),
            ActorChoice::TooLarge { limit } => Err(AppError::Validation(size_limit_message(size, limit))),
        }
    }

    /// Downloads `file` to `dest`, retrying when the transport hands back no handle
    pub(crate) async fn acquire(
        &self,
        actor: Actor,
        file: &RemoteFile,
        dest: &Path,
        progress: Option<MessageRef>,
    ) -> AppResult<PathBuf> {
        let transport = self.transport.clone();
        let result = retry(&self.settings.acquire_retry, |attempt| {
            let transport = transport.clone();
            async move {
                let request = DownloadRequest {
                    actor,
                    file_id: &file.file_id,
                    dest,
                    progress,
                    attempt,
                };
                match transport.download(request).await? {
                    Some(path) => Ok(path),
                    None => Err(AppError::Transport(format!(
                        "no file handle for {} (attempt {})",
                        file.file_name,
                        attempt + 1
                    ))),
                }
            }
        })
        .await;

        log::info!(
            "📥 Acquisition of {} finished after {} attempt(s) in {:?}",
            file.file_name,
            result.attempts,
            result.total_duration
        );
        result.into_result()
    }

    /// Sends `file` to `chat` with the actor its size calls for
    pub(crate) async fn deliver(
        &self,
        chat: ChatRef,
        file: &OutgoingFile,
        progress: Option<MessageRef>,
    ) -> AppResult<()> {
        let size = get_file_size(&file.path).await?;
        let actor = upload_actor(self.transport.as_ref(), size, self.settings.limits).await;
        log::info!(
            "📤 Uploading {} ({}) as {} via {} to {:?}",
            file.filename,
            human_bytes(size),
            file.send_as,
            actor,
            chat
        );
        self.transport.send_file(actor, chat, file, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_send_as_prefers_explicit_preference() {
        assert_eq!(send_as_for(Some(MediaPreference::Document), MediaKind::Video), SendAs::Document);
        assert_eq!(send_as_for(None, MediaKind::Video), SendAs::Video);
        assert_eq!(send_as_for(None, MediaKind::Audio), SendAs::Audio);
        assert_eq!(send_as_for(None, MediaKind::Document), SendAs::Document);
    }

    #[test]
    fn test_size_limit_message() {
        let msg = size_limit_message(3 * 1024 * 1024 * 1024, 2 * 1024 * 1024 * 1024);
        assert!(msg.contains("3.00 GB"));
        assert!(msg.contains("2.00 GB"));
    }
}
