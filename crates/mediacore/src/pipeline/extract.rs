//! Extract / remove-streams job. One tool run per choice, no retries.

use super::choices::{Callback, ChoiceAction, ChoiceKind, PendingChoice};
use super::dispatcher::{failed, settle};
use super::scratch::Scratch;
use super::status::Status;
use super::transfer::send_as_for;
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::error::AppResult;
use crate::media::commands::{self, StreamRemoval};
use crate::media::tool::StreamType;
use crate::media::{split_extension, MediaKind};
use crate::storage::MediaPreference;
use crate::transport::{Button, MessageRef, OutgoingFile, SendAs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOp {
    Audio,
    Subtitle,
    Remove(StreamRemoval),
}

impl ExtractOp {
    /// Output filename and upload class
    pub fn output(self, original: &str, preference: Option<MediaPreference>) -> (String, SendAs) {
        let (stem, extension) = split_extension(original);
        match self {
            ExtractOp::Audio => (format!("{}.mp3", stem), SendAs::Audio),
            ExtractOp::Subtitle => (format!("{}.srt", stem), SendAs::Document),
            ExtractOp::Remove(removal) => {
                let extension = if extension.is_empty() { ".mkv" } else { extension };
                (
                    format!("{}{}{}", stem, removal.suffix(), extension),
                    send_as_for(preference, MediaKind::Video),
                )
            }
        }
    }

    fn working(self) -> &'static str {
        match self {
            ExtractOp::Audio => "🎵 Extracting audio...",
            ExtractOp::Subtitle => "📝 Extracting subtitles...",
            ExtractOp::Remove(StreamRemoval::Audio) => "🔇 Removing audio...",
            ExtractOp::Remove(StreamRemoval::Subtitles) => "🚫 Removing subtitles...",
            ExtractOp::Remove(StreamRemoval::Both) => "🎬 Removing audio and subtitles...",
        }
    }
}

impl Pipeline {
    pub(crate) async fn offer_extract(&self, req: &JobRequest) -> JobOutcome {
        let token = self
            .pending
            .park(PendingChoice {
                user_id: req.user_id,
                chat: req.chat,
                file: req.file.clone(),
                kind: ChoiceKind::Extract,
            })
            .await;
        let button = |label: &str, op: ExtractOp| {
            Button::new(label, Callback::pending(&token, ChoiceAction::Extract(op)).encode())
        };
        let rows = vec![
            vec![
                button("🎵 Extract Audio", ExtractOp::Audio),
                button("📝 Extract Subtitles", ExtractOp::Subtitle),
            ],
            vec![
                button("🔇 Remove Audio", ExtractOp::Remove(StreamRemoval::Audio)),
                button("🚫 Remove Subtitles", ExtractOp::Remove(StreamRemoval::Subtitles)),
            ],
            vec![button("🎬 Remove Both", ExtractOp::Remove(StreamRemoval::Both))],
            vec![Button::new(
                "❌ Cancel",
                Callback::pending(&token, ChoiceAction::Cancel).encode(),
            )],
        ];

        let text = format!("🎛 What should I do with:\n\n📁 {}", req.file.file_name);
        match self.transport.send_with_buttons(req.chat, &text, rows).await {
            Ok(_) => JobOutcome::AwaitingChoice,
            Err(e) => failed(&e),
        }
    }

    pub(crate) async fn run_extract(
        &self,
        choice: &PendingChoice,
        op: ExtractOp,
        origin: Option<MessageRef>,
    ) -> JobOutcome {
        let mut status = Status::reuse(self.transport.as_ref(), choice.chat, origin, "📥 Downloading...").await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = self.extract_steps(choice, op, &mut status, &mut scratch).await;
        scratch.cleanup().await;
        settle(&mut status, result).await
    }

    async fn extract_steps(
        &self,
        choice: &PendingChoice,
        op: ExtractOp,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<JobOutcome> {
        self.scratch_dir().await?;
        let actor = self.download_actor(choice.file.size_bytes).await?;
        let dest = scratch.path("dl", split_extension(&choice.file.file_name).1);
        let input = self.acquire(actor, &choice.file, &dest, status.message()).await?;
        scratch.track(&input);

        if op == ExtractOp::Subtitle && self.tool.count_streams(&input, StreamType::Subtitle).await? == 0 {
            let text = "No subtitles found in this file.";
            status.info(text).await;
            return Ok(JobOutcome::Info(text.to_string()));
        }

        let preference = self
            .store
            .get_media_type_preference(choice.user_id)
            .await
            .unwrap_or_default();
        let (name, send_as) = op.output(&choice.file.file_name, preference);
        let output = scratch.path("ex", split_extension(&name).1);

        status.update(op.working()).await;
        let invocation = match op {
            ExtractOp::Audio => commands::extract_audio(&input, &output),
            ExtractOp::Subtitle => commands::extract_subtitle(&input, &output),
            ExtractOp::Remove(removal) => commands::remove_streams(&input, &output, removal),
        };
        self.tool.run(&invocation).await?;

        status.update("📤 Uploading...").await;
        let outgoing = OutgoingFile::new(&output, &name, send_as).caption(name.clone());
        self.deliver(choice.chat, &outgoing, status.message()).await?;

        status.update(&format!("✅ Done!\n\n📁 {}", name)).await;
        Ok(JobOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_names() {
        assert_eq!(
            ExtractOp::Audio.output("Show E01.mkv", None),
            ("Show E01.mp3".to_string(), SendAs::Audio)
        );
        assert_eq!(
            ExtractOp::Subtitle.output("Show E01.mkv", None),
            ("Show E01.srt".to_string(), SendAs::Document)
        );
        assert_eq!(
            ExtractOp::Remove(StreamRemoval::Both).output("Show E01.mkv", None),
            ("Show E01_video_only.mkv".to_string(), SendAs::Video)
        );
        assert_eq!(
            ExtractOp::Remove(StreamRemoval::Audio).output("clip.mp4", Some(MediaPreference::Document)),
            ("clip_no_audio.mp4".to_string(), SendAs::Document)
        );
    }
}
