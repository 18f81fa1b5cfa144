//! Merge job and its per-user queue.
//!
//! Files pile up in the queue while the user is in merge mode. "Merge now"
//! classifies the queue, picks exactly one strategy and runs it. Only a
//! successful merge clears the queue.

use std::path::{Path, PathBuf};

use super::choices::Callback;
use super::dispatcher::{failed, settle};
use super::scratch::Scratch;
use super::status::Status;
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::error::{AppError, AppResult};
use crate::media::{commands, is_audio_name, is_subtitle_name, split_extension, MediaKind};
use crate::storage::{QueuedFile, UserId};
use crate::transport::{Button, ChatRef, MessageRef, OutgoingFile, RemoteFile, SendAs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Video,
    Audio,
    Subtitle,
}

/// Subtitle extension wins over the recorded kind; audio documents count as audio
pub fn bucket_of(file: &QueuedFile) -> Bucket {
    if file.kind == MediaKind::Subtitle || is_subtitle_name(&file.filename) {
        Bucket::Subtitle
    } else if file.kind == MediaKind::Audio || (file.kind == MediaKind::Document && is_audio_name(&file.filename)) {
        Bucket::Audio
    } else {
        Bucket::Video
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub videos: usize,
    pub audios: usize,
    pub subtitles: usize,
}

pub fn count_buckets(files: &[QueuedFile]) -> BucketCounts {
    files.iter().fold(BucketCounts::default(), |mut counts, file| {
        match bucket_of(file) {
            Bucket::Video => counts.videos += 1,
            Bucket::Audio => counts.audios += 1,
            Bucket::Subtitle => counts.subtitles += 1,
        }
        counts
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MergeStrategy {
    Concat,
    MuxAudio,
    MuxSubtitles,
    MuxAll,
}

impl MergeStrategy {
    pub fn extension(self) -> &'static str {
        match self {
            MergeStrategy::Concat | MergeStrategy::MuxAudio => ".mp4",
            MergeStrategy::MuxSubtitles | MergeStrategy::MuxAll => ".mkv",
        }
    }
}

/// Exactly one strategy per bucket combination, or `None` for an unsupported one
pub fn select_strategy(counts: BucketCounts) -> Option<MergeStrategy> {
    match (counts.videos, counts.audios, counts.subtitles) {
        (v, 0, 0) if v > 1 => Some(MergeStrategy::Concat),
        (1, a, 0) if a >= 1 => Some(MergeStrategy::MuxAudio),
        (1, 0, s) if s >= 1 => Some(MergeStrategy::MuxSubtitles),
        (1, a, s) if a >= 1 && s >= 1 => Some(MergeStrategy::MuxAll),
        _ => None,
    }
}

pub fn merged_name(first_video: &str, strategy: MergeStrategy) -> String {
    format!("{}_merged{}", split_extension(first_video).0, strategy.extension())
}

fn queue_text(queue: &[QueuedFile]) -> String {
    let counts = count_buckets(queue);
    let listing: Vec<String> = queue
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{}. {}", i + 1, f.filename))
        .collect();
    format!(
        "📋 Merge queue: {} file(s)\n\n🎬 Videos: {}\n🎵 Audio: {}\n📝 Subtitles: {}\n\n{}",
        queue.len(),
        counts.videos,
        counts.audios,
        counts.subtitles,
        listing.join("\n")
    )
}

fn queue_buttons() -> Vec<Vec<Button>> {
    vec![vec![
        Button::new("🔗 Merge Now", Callback::MergeNow.encode()),
        Button::new("🗑 Clear Queue", Callback::MergeClear.encode()),
    ]]
}

impl Pipeline {
    pub(crate) async fn enqueue_merge(&self, req: &JobRequest) -> JobOutcome {
        let queued = QueuedFile {
            source_file_id: req.file.file_id.clone(),
            filename: req.file.file_name.clone(),
            size_bytes: req.file.size_bytes,
            kind: req.file.kind,
            source_message_id: req.file.message_id,
        };
        let queue = async {
            self.store.append_merge_queue(req.user_id, queued).await?;
            self.store.get_merge_queue(req.user_id).await
        }
        .await;
        let queue = match queue {
            Ok(queue) => queue,
            Err(e) => {
                self.notify(req.chat, &e.user_message()).await;
                return failed(&e);
            }
        };

        if let Err(e) = self
            .transport
            .send_with_buttons(req.chat, &queue_text(&queue), queue_buttons())
            .await
        {
            log::warn!("Failed to show merge queue: {}", e);
        }
        JobOutcome::Queued { position: queue.len() }
    }

    /// `/merge`: current queue with its buttons
    pub async fn show_merge_queue(&self, user_id: UserId, chat: ChatRef) -> JobOutcome {
        let queue = match self.store.get_merge_queue(user_id).await {
            Ok(queue) => queue,
            Err(e) => return failed(&e),
        };
        if queue.is_empty() {
            let text = "📭 Your merge queue is empty. Switch to merge mode and send files to queue them.";
            self.notify(chat, text).await;
            return JobOutcome::Info(text.to_string());
        }
        if let Err(e) = self.transport.send_with_buttons(chat, &queue_text(&queue), queue_buttons()).await {
            return failed(&e);
        }
        JobOutcome::Info(format!("{} file(s) queued", queue.len()))
    }

    pub async fn clear_merge_queue(&self, user_id: UserId, chat: ChatRef, origin: Option<MessageRef>) -> JobOutcome {
        match self.store.clear_merge_queue(user_id).await {
            Ok(()) => {
                self.replace_origin(chat, origin, "🗑 Merge queue cleared.").await;
                JobOutcome::Completed
            }
            Err(e) => {
                self.replace_origin(chat, origin, &e.user_message()).await;
                failed(&e)
            }
        }
    }

    pub async fn merge_now(&self, user_id: UserId, chat: ChatRef, origin: Option<MessageRef>) -> JobOutcome {
        let guard_key = format!("merge:{}", user_id);
        let Some(_ticket) = self.guard.try_acquire(&guard_key) else {
            return JobOutcome::Duplicate;
        };

        let queue = match self.store.get_merge_queue(user_id).await {
            Ok(queue) => queue,
            Err(e) => return failed(&e),
        };
        if queue.len() < 2 {
            let text = format!(
                "❌ Need at least 2 files to merge, the queue has {}.",
                queue.len()
            );
            self.replace_origin(chat, origin, &text).await;
            return JobOutcome::Failed(text);
        }
        let Some(strategy) = select_strategy(count_buckets(&queue)) else {
            let counts = count_buckets(&queue);
            let text = format!(
                "❌ Unsupported combination: {} video(s), {} audio, {} subtitle(s).\n\n\
                 Supported: several videos, or one video with audio and/or subtitles.",
                counts.videos, counts.audios, counts.subtitles
            );
            self.replace_origin(chat, origin, &text).await;
            return JobOutcome::Failed(text);
        };
        log::info!("🔗 Merging {} files for user {} ({})", queue.len(), user_id, strategy);

        let mut status = Status::reuse(self.transport.as_ref(), chat, origin, "📥 Downloading queued files...").await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = self.merge_steps(chat, &queue, strategy, &mut status, &mut scratch).await;
        scratch.cleanup().await;

        if result.is_ok() {
            if let Err(e) = self.store.clear_merge_queue(user_id).await {
                log::error!("Merged, but failed to clear the queue of {}: {}", user_id, e);
            }
        }
        let outcome = settle(&mut status, result).await;
        crate::core::metrics::record_job("merge", outcome.label());
        outcome
    }

    async fn merge_steps(
        &self,
        chat: ChatRef,
        queue: &[QueuedFile],
        strategy: MergeStrategy,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<JobOutcome> {
        self.scratch_dir().await?;

        let mut videos: Vec<(PathBuf, &QueuedFile)> = Vec::new();
        let mut audios: Vec<PathBuf> = Vec::new();
        let mut subtitles: Vec<PathBuf> = Vec::new();
        for (idx, queued) in queue.iter().enumerate() {
            status
                .update(&format!("📥 Downloading {}/{}: {}", idx + 1, queue.len(), queued.filename))
                .await;
            let path = self.download_queued(chat, queued, status.message(), scratch).await?;
            match bucket_of(queued) {
                Bucket::Video => videos.push((path, queued)),
                Bucket::Audio => audios.push(path),
                Bucket::Subtitle => subtitles.push(path),
            }
        }

        let (first_video, first_file) = videos
            .first()
            .map(|(path, file)| (path.clone(), *file))
            .ok_or_else(|| AppError::Validation("❌ No video in the merge queue.".to_string()))?;
        let name = merged_name(&first_file.filename, strategy);
        let output = scratch.path("merged", strategy.extension());

        status.update("🔗 Merging...").await;
        let audio_refs: Vec<&Path> = audios.iter().map(PathBuf::as_path).collect();
        let subtitle_refs: Vec<&Path> = subtitles.iter().map(PathBuf::as_path).collect();
        match strategy {
            MergeStrategy::Concat => {
                let inputs: Vec<&Path> = videos.iter().map(|(p, _)| p.as_path()).collect();
                self.concat(&inputs, &output, status, scratch).await?;
            }
            MergeStrategy::MuxAudio => {
                self.tool
                    .run(&commands::mux_audio(&first_video, &audio_refs, &output))
                    .await?
            }
            MergeStrategy::MuxSubtitles => {
                self.tool
                    .run(&commands::mux_subtitles(&first_video, &subtitle_refs, &output))
                    .await?
            }
            MergeStrategy::MuxAll => {
                self.tool
                    .run(&commands::mux_all(&first_video, &audio_refs, &subtitle_refs, &output))
                    .await?
            }
        }

        status.update("📤 Uploading...").await;
        let duration = self.tool.media_duration(&output).await.ok();
        let outgoing = OutgoingFile::new(&output, &name, SendAs::Video)
            .caption(format!("🔗 Merged {} files\n\n📁 {}", queue.len(), name))
            .duration(duration);
        self.deliver(chat, &outgoing, status.message()).await?;

        status.update(&format!("✅ Merged!\n\n📁 {}", name)).await;
        Ok(JobOutcome::Completed)
    }

    /// Zero-copy concat first, filter-graph re-encode when that fails
    async fn concat(
        &self,
        inputs: &[&Path],
        output: &Path,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<()> {
        let list = scratch.path("concat", "txt");
        fs_err::tokio::write(&list, commands::concat_list(inputs)).await?;

        match self.tool.run(&commands::concat_copy(&list, output)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("Stream-copy concat failed, re-encoding: {}", e);
                status.update("🔗 Formats differ, re-encoding...").await;
                self.tool.run(&commands::concat_reencode(inputs, output)).await?;
                Ok(())
            }
        }
    }

    /// Re-fetches the queued message for a fresh file handle, falling back to
    /// the stored one, then downloads it.
    async fn download_queued(
        &self,
        chat: ChatRef,
        queued: &QueuedFile,
        progress: Option<MessageRef>,
        scratch: &mut Scratch,
    ) -> AppResult<PathBuf> {
        let remote = match self.transport.fetch_file(chat, queued.source_message_id).await {
            Ok(Some(remote)) => remote,
            Ok(None) => {
                log::warn!("Queued message {} is gone, using the stored file id", queued.source_message_id);
                stored_remote(queued)
            }
            Err(e) => {
                log::warn!("Failed to re-fetch message {}: {}", queued.source_message_id, e);
                stored_remote(queued)
            }
        };

        let actor = self.download_actor(remote.size_bytes).await?;
        let dest = scratch.path("mq", split_extension(&queued.filename).1);
        let path = self.acquire(actor, &remote, &dest, progress).await?;
        scratch.track(&path);
        Ok(path)
    }
}

fn stored_remote(queued: &QueuedFile) -> RemoteFile {
    RemoteFile {
        file_id: queued.source_file_id.clone(),
        file_name: queued.filename.clone(),
        size_bytes: queued.size_bytes,
        kind: queued.kind,
        message_id: queued.source_message_id,
    }
}
