//! Compress job: one transcode and upload per selected quality.
//!
//! Qualities run one after another and each output is deleted before the next
//! one starts. A failing quality is reported and the rest still run.

use super::choices::{Callback, ChoiceAction, ChoiceKind, PendingChoice};
use super::dispatcher::settle;
use super::scratch::Scratch;
use super::status::Status;
use super::transfer::send_as_for;
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::error::{AppError, AppResult};
use crate::media::quality::{self, CompressionQuality};
use crate::media::{commands, remove_quietly, split_extension, MediaKind};
use crate::transport::{Button, MessageRef};

/// `{stem}_{label}.mp4`
pub fn compressed_name(original: &str, quality: &CompressionQuality) -> String {
    format!("{}_{}.mp4", split_extension(original).0, quality.label)
}

/// Outcome of a batch given per-quality results
pub fn batch_outcome(succeeded: usize, failed: usize) -> JobOutcome {
    match (succeeded, failed) {
        (_, 0) => JobOutcome::Completed,
        (0, _) => JobOutcome::Failed(format!("All {} qualities failed", failed)),
        (succeeded, failed) => JobOutcome::Partial { succeeded, failed },
    }
}

impl Pipeline {
    /// Runs the stored qualities, or offers quality buttons when none are stored
    pub(crate) async fn start_compress(&self, req: &JobRequest) -> JobOutcome {
        let choice = PendingChoice {
            user_id: req.user_id,
            chat: req.chat,
            file: req.file.clone(),
            kind: ChoiceKind::Compress,
        };

        let stored = self.store.get_compression_qualities(req.user_id).await.unwrap_or_else(|e| {
            log::warn!("Failed to read compression qualities for {}: {}", req.user_id, e);
            Vec::new()
        });
        if !stored.is_empty() {
            return self.run_compress(&choice, &stored, None).await;
        }

        let token = self.pending.park(choice).await;
        let mut rows: Vec<Vec<Button>> = quality::CATALOG
            .chunks(3)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|q| {
                        let data = Callback::pending(&token, ChoiceAction::Compress(Some(q.label.to_string())));
                        Button::new(q.label, data.encode())
                    })
                    .collect()
            })
            .collect();
        rows.push(vec![
            Button::new("🎯 All", Callback::pending(&token, ChoiceAction::Compress(None)).encode()),
            Button::new("❌ Cancel", Callback::pending(&token, ChoiceAction::Cancel).encode()),
        ]);

        let text = format!("🗜 Choose a compression quality for:\n\n📁 {}", req.file.file_name);
        match self.transport.send_with_buttons(req.chat, &text, rows).await {
            Ok(_) => JobOutcome::AwaitingChoice,
            Err(e) => super::dispatcher::failed(&e),
        }
    }

    pub(crate) async fn run_compress(
        &self,
        choice: &PendingChoice,
        labels: &[String],
        origin: Option<MessageRef>,
    ) -> JobOutcome {
        let mut status = Status::reuse(self.transport.as_ref(), choice.chat, origin, "📥 Downloading...").await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = self.compress_steps(choice, labels, &mut status, &mut scratch).await;
        scratch.cleanup().await;
        settle(&mut status, result).await
    }

    async fn compress_steps(
        &self,
        choice: &PendingChoice,
        labels: &[String],
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<JobOutcome> {
        let qualities: Vec<&CompressionQuality> = labels.iter().filter_map(|l| quality::find(l)).collect();
        if qualities.is_empty() {
            return Err(AppError::Validation(format!("❌ No valid quality selected: {}", labels.join(", "))));
        }

        self.scratch_dir().await?;
        let actor = self.download_actor(choice.file.size_bytes).await?;
        let dest = scratch.path("dl", split_extension(&choice.file.file_name).1);
        let input = self.acquire(actor, &choice.file, &dest, status.message()).await?;
        scratch.track(&input);

        let preference = self
            .store
            .get_media_type_preference(choice.user_id)
            .await
            .unwrap_or_default();
        let total = qualities.len();
        let mut report: Vec<String> = Vec::with_capacity(total);
        let mut succeeded = 0;
        let mut failed = 0;

        for (idx, q) in qualities.iter().enumerate() {
            let progress = format!("🗜 Compressing to {} ({}/{})...", q.label, idx + 1, total);
            status.update(&with_report(&progress, &report)).await;

            let output = scratch.path("cq", "mp4");
            let name = compressed_name(&choice.file.file_name, q);
            let attempt = async {
                self.tool.run(&commands::compress(&input, &output, q)).await?;
                status.update(&with_report(&format!("📤 Uploading {}...", name), &report)).await;
                let outgoing = crate::transport::OutgoingFile::new(&output, &name, send_as_for(preference, MediaKind::Video))
                    .caption(format!("🗜 {}\n\n📁 {}", q.label, name));
                self.deliver(choice.chat, &outgoing, status.message()).await
            }
            .await;
            remove_quietly(&output).await;

            match attempt {
                Ok(()) => {
                    succeeded += 1;
                    report.push(format!("✔️ {}", q.label));
                }
                Err(e) => {
                    log::error!("Compression to {} failed for {}: {}", q.label, choice.file.file_name, e);
                    failed += 1;
                    report.push(format!("❌ {}: {}", q.label, e.user_message()));
                }
            }
        }

        let summary = format!("✅ Compression finished! {}/{} compressed.", succeeded, total);
        status.update(&with_report(&summary, &report)).await;
        Ok(batch_outcome(succeeded, failed))
    }
}

fn with_report(head: &str, report: &[String]) -> String {
    if report.is_empty() {
        head.to_string()
    } else {
        format!("{}\n\n{}", head, report.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compressed_name() {
        let q = quality::find("720p").unwrap();
        assert_eq!(compressed_name("My.Show.mkv", q), "My.Show_720p.mp4");
    }

    #[test]
    fn test_batch_outcome() {
        assert_eq!(batch_outcome(3, 0), JobOutcome::Completed);
        assert_eq!(batch_outcome(2, 1), JobOutcome::Partial { succeeded: 2, failed: 1 });
        assert!(matches!(batch_outcome(0, 2), JobOutcome::Failed(_)));
    }

    #[test]
    fn test_with_report() {
        assert_eq!(with_report("head", &[]), "head");
        assert_eq!(with_report("head", &["a".into(), "b".into()]), "head\n\na\nb");
    }
}
