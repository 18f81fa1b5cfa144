//! Rename job: name, download, optional metadata tag, thumbnail, upload.

use std::path::PathBuf;

use super::dispatcher::{failed, settle};
use super::scratch::Scratch;
use super::status::Status;
use super::transfer::send_as_for;
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::config;
use crate::core::error::AppResult;
use crate::media::{commands, format_duration, human_bytes, split_extension};
use crate::naming::{fallback_name, name_from_reply, plan_filename, NamePlan, NamingRules};
use crate::storage::UserPreferences;
use crate::transport::{Actor, ChatRef, DownloadRequest, OutgoingFile, Reply, SendAs};

/// Renders a caption template. `{duration}` is `0:00:00` when unknown.
pub fn render_caption(template: &str, filename: &str, size: u64, duration: Option<f64>) -> String {
    template
        .replace("{filename}", filename)
        .replace("{filesize}", &human_bytes(size))
        .replace("{duration}", &format_duration(duration.unwrap_or(0.0)))
}

impl Pipeline {
    pub(crate) async fn run_rename(&self, req: &JobRequest) -> JobOutcome {
        let prefs = match self.store.get_preferences(req.user_id).await {
            Ok(prefs) => prefs,
            Err(e) => return failed(&e),
        };
        let rules = prefs.naming_rules();

        let new_name = match plan_filename(&req.file.file_name, req.caption.as_deref(), &rules) {
            NamePlan::Ready(name) => name,
            NamePlan::Ask => match self.ask_for_name(req, &rules).await {
                Ok(Some(name)) => name,
                Ok(None) => return JobOutcome::Cancelled,
                Err(e) => return failed(&e),
            },
        };
        log::info!("✏️ {} -> {}", req.file.file_name, new_name);

        let mut status = Status::start(self.transport.as_ref(), req.chat, "📥 Downloading...").await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = self.rename_steps(req, &prefs, &new_name, &mut status, &mut scratch).await;
        scratch.cleanup().await;
        settle(&mut status, result).await
    }

    /// `None` when the user cancelled
    async fn ask_for_name(&self, req: &JobRequest, rules: &NamingRules) -> AppResult<Option<String>> {
        let prompt = format!(
            "✏️ Send the new name for:\n\n📁 {}\n\nSend {} to abort.",
            req.file.file_name,
            config::prompts::CANCEL_TOKEN
        );
        match self.transport.ask(req.chat, &prompt, self.settings.rename_timeout).await? {
            Reply::Text(text) if text.trim().eq_ignore_ascii_case(config::prompts::CANCEL_TOKEN) => {
                self.notify(req.chat, "❌ Rename cancelled.").await;
                Ok(None)
            }
            Reply::Text(text) if !text.trim().is_empty() => {
                Ok(Some(name_from_reply(&text, &req.file.file_name, rules)))
            }
            Reply::Text(_) | Reply::TimedOut => {
                let name = fallback_name(&req.file.file_name);
                self.notify(req.chat, &format!("⏰ No name received, keeping the original:\n\n📁 {}", name))
                    .await;
                Ok(Some(name))
            }
        }
    }

    async fn rename_steps(
        &self,
        req: &JobRequest,
        prefs: &UserPreferences,
        new_name: &str,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<JobOutcome> {
        self.scratch_dir().await?;
        let actor = self.download_actor(req.file.size_bytes).await?;
        let extension = split_extension(new_name).1;

        let download = scratch.path("dl", extension);
        let downloaded = self.acquire(actor, &req.file, &download, status.message()).await?;
        scratch.track(&downloaded);

        let mut upload_path = downloaded.clone();
        if prefs.metadata_enabled {
            status.update("🏷 Adding metadata...").await;
            let tagged = scratch.path("meta", extension);
            let invocation = commands::metadata_tag(&downloaded, &tagged, &prefs.metadata_text);
            match self.tool.run(&invocation).await {
                Ok(()) => upload_path = tagged,
                Err(e) => log::warn!("Metadata tagging failed, uploading untagged file: {}", e),
            }
        }

        let thumbnail = match prefs.thumbnail.as_deref() {
            Some(file_id) => self.prepare_thumbnail(file_id, scratch).await,
            None => None,
        };

        let send_as = send_as_for(prefs.media_preference, req.file.kind);
        let size = crate::media::get_file_size(&upload_path).await?;
        let wants_duration = matches!(send_as, SendAs::Video | SendAs::Audio)
            || prefs.caption.as_deref().is_some_and(|c| c.contains("{duration}"));
        let duration = if wants_duration {
            self.tool.media_duration(&upload_path).await.ok()
        } else {
            None
        };

        let caption = match prefs.caption.as_deref() {
            Some(template) => render_caption(template, new_name, size, duration),
            None => new_name.to_string(),
        };

        let destination = prefs.upload_channel.map(ChatRef).unwrap_or(req.chat);
        status.update("📤 Uploading...").await;
        let outgoing = OutgoingFile::new(upload_path, new_name, send_as)
            .caption(caption)
            .thumbnail(thumbnail)
            .duration(duration);
        self.deliver(destination, &outgoing, status.message()).await?;

        match prefs.upload_channel {
            Some(channel) => {
                status
                    .update(&format!("✅ Uploaded to channel {}\n\n📁 {}", channel, new_name))
                    .await
            }
            None => status.update(&format!("✅ Done!\n\n📁 {}", new_name)).await,
        }
        Ok(JobOutcome::Completed)
    }

    /// Downloads the stored thumbnail and resizes it. Failures are logged and skipped.
    pub(crate) async fn prepare_thumbnail(&self, file_id: &str, scratch: &mut Scratch) -> Option<PathBuf> {
        let source = scratch.path("thumb_src", "jpg");
        let request = DownloadRequest {
            actor: Actor::Primary,
            file_id,
            dest: &source,
            progress: None,
            attempt: 0,
        };
        let source = match self.transport.download(request).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                log::warn!("Thumbnail download returned no file handle");
                return None;
            }
            Err(e) => {
                log::warn!("Thumbnail download failed: {}", e);
                return None;
            }
        };
        scratch.track(&source);

        let resized = scratch.path("thumb", "jpg");
        match self.tool.run(&commands::thumbnail(&source, &resized)).await {
            Ok(()) => Some(resized),
            Err(e) => {
                log::warn!("Thumbnail resize failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_caption() {
        let caption = render_caption("{filename} | {filesize} | {duration}", "a.mkv", 1536, Some(3725.0));
        assert_eq!(caption, "a.mkv | 1.50 KB | 1:02:05");
    }

    #[test]
    fn test_render_caption_unknown_duration() {
        assert_eq!(render_caption("{duration}", "a", 0, None), "0:00:00");
    }
}
