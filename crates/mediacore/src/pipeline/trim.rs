//! Trim job: stream-copy cut between two user-supplied times.
//!
//! A prompt timeout, `/cancel` or a malformed time aborts the job. There is no
//! re-encode fallback when the copy cut fails.

use std::path::Path;
use std::time::Duration;

use super::dispatcher::{failed, settle};
use super::fetch::{fetch_to_file, filename_from_url, parse_media_url};
use super::scratch::Scratch;
use super::status::Status;
use super::transfer::send_as_for;
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::media::{commands, format_duration, parse_time, split_extension, MediaKind};
use crate::storage::UserId;
use crate::transport::{ChatRef, OutgoingFile, Reply};

/// Inclusive start, exclusive end, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimRange {
    pub start: f64,
    pub end: f64,
}

impl TrimRange {
    /// Rejects `end <= start`
    pub fn new(start: f64, end: f64) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::Validation(format!(
                "❌ End time ({}) must be after start time ({}).",
                format_duration(end),
                format_duration(start)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

pub fn trimmed_name(original: &str) -> String {
    let (stem, extension) = split_extension(original);
    let extension = if extension.is_empty() { ".mp4" } else { extension };
    format!("{}_trimmed{}", stem, extension)
}

fn trim_caption(range: TrimRange) -> String {
    format!(
        "✂️ Trimmed\n\n⏱ Start: {}\n⏱ End: {}\n⏳ Duration: {}",
        format_duration(range.start),
        format_duration(range.end),
        format_duration(range.duration())
    )
}

enum Asked {
    Time(f64),
    Stop,
}

impl Pipeline {
    pub(crate) async fn run_trim_file(&self, req: &JobRequest) -> JobOutcome {
        let range = match self.ask_range(req.chat, self.settings.trim_file_timeout).await {
            Ok(Some(range)) => range,
            Ok(None) => return JobOutcome::Cancelled,
            Err(e) => {
                self.notify(req.chat, &e.user_message()).await;
                return failed(&e);
            }
        };

        let mut status = Status::start(self.transport.as_ref(), req.chat, "📥 Downloading...").await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = async {
            self.scratch_dir().await?;
            let actor = self.download_actor(req.file.size_bytes).await?;
            let dest = scratch.path("dl", split_extension(&req.file.file_name).1);
            let input = self.acquire(actor, &req.file, &dest, status.message()).await?;
            scratch.track(&input);
            self.cut_and_send(req.user_id, req.chat, &input, &req.file.file_name, req.file.kind, range, &mut status, &mut scratch)
                .await
        }
        .await;
        scratch.cleanup().await;
        settle(&mut status, result).await
    }

    /// `/trim <url>`: fetch over HTTP, then the same prompts and cut
    pub async fn trim_link(&self, user_id: UserId, chat: ChatRef, raw_url: &str) -> JobOutcome {
        let url = match parse_media_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                self.notify(chat, &e.user_message()).await;
                return failed(&e);
            }
        };
        let Some(_ticket) = self.guard.try_acquire(url.as_str()) else {
            return JobOutcome::Duplicate;
        };
        let filename = filename_from_url(&url);

        let mut status = Status::start(self.transport.as_ref(), chat, "📥 Downloading from link...").await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = async {
            self.scratch_dir().await?;
            let dest = scratch.path("link", split_extension(&filename).1);
            let max_bytes = self.link_size_limit().await;
            fetch_to_file(&self.http, &url, &dest, max_bytes, Some(&mut status)).await?;
            status.update("✅ Downloaded. Waiting for trim times...").await;

            let Some(range) = self.ask_range(chat, self.settings.trim_link_timeout).await? else {
                status.info("Trim cancelled.").await;
                return Ok(JobOutcome::Cancelled);
            };
            self.cut_and_send(user_id, chat, &dest, &filename, MediaKind::Video, range, &mut status, &mut scratch)
                .await
        }
        .await;
        scratch.cleanup().await;
        let outcome = settle(&mut status, result).await;
        crate::core::metrics::record_job("trim", outcome.label());
        outcome
    }

    /// Asks for start and end. `None` on cancel or timeout.
    async fn ask_range(&self, chat: ChatRef, timeout: Duration) -> AppResult<Option<TrimRange>> {
        let start = match self
            .ask_time(chat, "⏱ Send the start time (HH:MM:SS, MM:SS or seconds):", timeout)
            .await?
        {
            Asked::Time(t) => t,
            Asked::Stop => return Ok(None),
        };
        let end = match self
            .ask_time(chat, "⏱ Send the end time (HH:MM:SS, MM:SS or seconds):", timeout)
            .await?
        {
            Asked::Time(t) => t,
            Asked::Stop => return Ok(None),
        };
        TrimRange::new(start, end).map(Some)
    }

    async fn ask_time(&self, chat: ChatRef, prompt: &str, timeout: Duration) -> AppResult<Asked> {
        let prompt = format!("{}\n\nSend {} to abort.", prompt, config::prompts::CANCEL_TOKEN);
        match self.transport.ask(chat, &prompt, timeout).await? {
            Reply::TimedOut => {
                self.notify(chat, "⏰ Timed out. Trim cancelled.").await;
                Ok(Asked::Stop)
            }
            Reply::Text(text) if text.trim().eq_ignore_ascii_case(config::prompts::CANCEL_TOKEN) => {
                self.notify(chat, "❌ Trim cancelled.").await;
                Ok(Asked::Stop)
            }
            Reply::Text(text) => parse_time(&text).map(Asked::Time).ok_or_else(|| {
                AppError::Validation(format!(
                    "❌ Invalid time: {:?}\n\nUse HH:MM:SS, MM:SS or seconds.",
                    text.trim()
                ))
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn cut_and_send(
        &self,
        user_id: UserId,
        chat: ChatRef,
        input: &Path,
        original_name: &str,
        kind: MediaKind,
        range: TrimRange,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<JobOutcome> {
        status.update("✂️ Trimming...").await;
        let name = trimmed_name(original_name);
        let output = scratch.path("trim", split_extension(&name).1);
        self.tool
            .run(&commands::trim_copy(input, &output, range.start, range.end))
            .await?;

        let preference = self.store.get_media_type_preference(user_id).await.unwrap_or_else(|e| {
            log::warn!("Failed to read media preference for {}: {}", user_id, e);
            None
        });
        status.update("📤 Uploading...").await;
        let outgoing = OutgoingFile::new(&output, &name, send_as_for(preference, kind))
            .caption(trim_caption(range))
            .duration(Some(range.duration()));
        self.deliver(chat, &outgoing, status.message()).await?;

        status.update(&format!("✅ Trimmed!\n\n📁 {}", name)).await;
        Ok(JobOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_range_rejects_end_not_after_start() {
        assert!(TrimRange::new(10.0, 10.0).is_err());
        assert!(TrimRange::new(10.0, 5.0).is_err());
        assert_eq!(TrimRange::new(5.0, 10.0).unwrap().duration(), 5.0);
    }

    #[test]
    fn test_trimmed_name() {
        assert_eq!(trimmed_name("Movie.mkv"), "Movie_trimmed.mkv");
        assert_eq!(trimmed_name("clip"), "clip_trimmed.mp4");
    }

    #[test]
    fn test_trim_caption() {
        let caption = trim_caption(TrimRange::new(65.0, 125.0).unwrap());
        assert!(caption.contains("Start: 0:01:05"));
        assert!(caption.contains("Duration: 0:01:00"));
    }
}
