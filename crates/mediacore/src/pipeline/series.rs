//! Special-content profile: files named after the configured series skip mode
//! dispatch and go straight to the series channel.

use std::path::PathBuf;

use lazy_regex::regex;

use super::dispatcher::settle;
use super::fetch::{fetch_to_file, parse_media_url};
use super::scratch::Scratch;
use super::status::Status;
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::error::AppResult;
use crate::media::{format_duration, human_bytes, split_extension};
use crate::naming::patterns::{bracketed_quality, extract_series_episode};
use crate::naming::text::sanitize_filename;
use crate::transport::{ChatRef, OutgoingFile, SendAs};

/// Moves a bracketed `[720p]` tag in front of the extension.
/// Returns the new name and the quality (`Unknown` without a tag).
pub fn series_name(filename: &str) -> (String, String) {
    let Some(quality) = bracketed_quality(filename).map(str::to_string) else {
        return (filename.to_string(), "Unknown".to_string());
    };

    let stripped = regex!(r"\d+p").replace_all(filename, "");
    let stripped = regex!(r"\[.*?\]").replace_all(&stripped, "");
    let (stem, extension) = split_extension(&stripped);
    let renamed = format!("{} {}{}", stem, quality, extension);
    let renamed = regex!(r"\.+").replace_all(&renamed, ".");
    let renamed = regex!(r"\s+").replace_all(&renamed, " ");
    (renamed.trim().to_string(), quality)
}

pub fn series_caption(title: &str, episode: &str, quality: &str, size: u64, duration: Option<f64>) -> String {
    format!(
        "{} Episode {}\n\n📺 Quality: {}\n💾 Size: {}\n⏱ Duration: {}",
        title,
        episode,
        quality,
        human_bytes(size),
        format_duration(duration.unwrap_or(0.0))
    )
}

impl Pipeline {
    pub(crate) async fn run_series(&self, req: &JobRequest) -> JobOutcome {
        let mut status = Status::start(
            self.transport.as_ref(),
            req.chat,
            &format!("🔄 Auto-processing {}...\n📥 Downloading...", self.settings.series_title),
        )
        .await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = self.series_steps(req, &mut status, &mut scratch).await;
        scratch.cleanup().await;
        settle(&mut status, result).await
    }

    async fn series_steps(
        &self,
        req: &JobRequest,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<JobOutcome> {
        let (new_name, quality) = series_name(&req.file.file_name);
        let new_name = sanitize_filename(&new_name);
        let episode = extract_series_episode(&req.file.file_name);
        log::info!("📺 Series file {} -> {} (episode {}, {})", req.file.file_name, new_name, episode, quality);

        self.scratch_dir().await?;
        let actor = self.download_actor(req.file.size_bytes).await?;
        let dest = scratch.path("series", split_extension(&new_name).1);
        let input = self.acquire(actor, &req.file, &dest, status.message()).await?;
        scratch.track(&input);

        status.update("📊 Extracting metadata...").await;
        let duration = match self.tool.media_duration(&input).await {
            Ok(d) => Some(d),
            Err(e) => {
                log::warn!("Duration lookup failed for {}: {}", input.display(), e);
                None
            }
        };

        status.update("🎨 Preparing thumbnail...").await;
        let thumbnail = self.series_thumbnail(scratch).await;

        let caption = series_caption(
            &self.settings.series_title,
            &episode,
            &quality,
            req.file.size_bytes,
            duration,
        );
        status.update("📤 Uploading to channel...").await;
        let outgoing = OutgoingFile::new(&input, &new_name, SendAs::Video)
            .caption(caption)
            .thumbnail(thumbnail)
            .duration(duration);
        self.deliver(ChatRef(self.settings.series_channel), &outgoing, status.message())
            .await?;

        status
            .update(&format!(
                "✅ Successfully uploaded!\n\nEpisode: {}\nQuality: {}\nSize: {}",
                episode,
                quality,
                human_bytes(req.file.size_bytes)
            ))
            .await;
        Ok(JobOutcome::Completed)
    }

    /// Fetches the series thumbnail. Failures are logged and skipped.
    pub(crate) async fn series_thumbnail(&self, scratch: &mut Scratch) -> Option<PathBuf> {
        let url = match parse_media_url(&self.settings.series_thumbnail_url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Bad series thumbnail URL: {}", e);
                return None;
            }
        };
        let dest = scratch.path("series_thumb", "jpg");
        match fetch_to_file(&self.http, &url, &dest, self.settings.limits.primary, None).await {
            Ok(_) => Some(dest),
            Err(e) => {
                log::warn!("Series thumbnail download failed: {}", e);
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
    fn test_series_name_moves_quality() {
        let (name, quality) = series_name("Jai Bajarangabali E12 [720p].mkv");
        assert_eq!(name, "Jai Bajarangabali E12 720p.mkv");
        assert_eq!(quality, "720p");
    }

    #[test]
    fn test_series_name_without_tag() {
        let (name, quality) = series_name("Jai Bajarangabali E12.mkv");
        assert_eq!(name, "Jai Bajarangabali E12.mkv");
        assert_eq!(quality, "Unknown");
    }

    #[test]
    fn test_series_caption() {
        let caption = series_caption("Jai Bajarangabali", "07", "720p", 1024 * 1024, Some(61.0));
        assert!(caption.starts_with("Jai Bajarangabali Episode 07\n\n"));
        assert!(caption.contains("💾 Size: 1.00 MB"));
        assert!(caption.contains("⏱ Duration: 0:01:01"));
    }
}
