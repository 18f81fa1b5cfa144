//! Mode dispatcher: routes one inbound file or button press to exactly one job.

use super::choices::{Callback, ChoiceAction};
use super::status::Status;
use super::transfer::size_limit_message;
use super::actor::{elevated_available, select_actor, ActorChoice};
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::storage::{MediaMode, UserId};
use crate::transport::{ChatRef, MessageRef};

/// Case-insensitive literal prefix test for the special-content profile
pub fn is_series_file(filename: &str, prefix: &str) -> bool {
    let prefix = prefix.trim();
    !prefix.is_empty()
        && filename
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Turns a job result into its outcome, marking the status message failed on error
pub(crate) async fn settle(status: &mut Status<'_>, result: AppResult<JobOutcome>) -> JobOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Job failed: {}", e);
            let message = e.user_message();
            status.fail(&message).await;
            JobOutcome::Failed(message)
        }
    }
}

impl Pipeline {
    /// Entry point for every file-bearing message
    pub async fn handle_file(&self, req: JobRequest) -> JobOutcome {
        log::info!(
            "📨 File from user {}: {} ({} bytes, {})",
            req.user_id,
            req.file.file_name,
            req.file.size_bytes,
            req.file.kind
        );

        if is_series_file(&req.file.file_name, &self.settings.series_prefix) {
            let Some(_ticket) = self.guard.try_acquire(&req.file.file_id) else {
                log::info!("🔁 Duplicate delivery of {} dropped", req.file.file_id);
                return JobOutcome::Duplicate;
            };
            let outcome = self.run_series(&req).await;
            metrics::record_job("series", outcome.label());
            return outcome;
        }

        let mode = match self.store.get_media_mode(req.user_id).await {
            Ok(mode) => mode,
            Err(e) => {
                log::warn!("Failed to read media mode for user {}: {}, using rename", req.user_id, e);
                MediaMode::Rename
            }
        };

        let elevated = elevated_available(self.transport.as_ref()).await;
        if let ActorChoice::TooLarge { limit } = select_actor(req.file.size_bytes, elevated, self.settings.limits) {
            let message = size_limit_message(req.file.size_bytes, limit);
            if let Err(e) = self.transport.send_text(req.chat, &message).await {
                log::warn!("Failed to send size limit message: {}", e);
            }
            let outcome = JobOutcome::Failed(message);
            metrics::record_job(mode.as_ref(), outcome.label());
            return outcome;
        }

        let Some(_ticket) = self.guard.try_acquire(&req.file.file_id) else {
            log::info!("🔁 Duplicate delivery of {} dropped", req.file.file_id);
            return JobOutcome::Duplicate;
        };

        let outcome = match mode {
            MediaMode::Rename => self.run_rename(&req).await,
            MediaMode::Trim => self.run_trim_file(&req).await,
            MediaMode::Extract => self.offer_extract(&req).await,
            MediaMode::Merge => self.enqueue_merge(&req).await,
            MediaMode::Compress => self.start_compress(&req).await,
            MediaMode::Autotrim => self.offer_autotrim(&req).await,
        };

        log::info!("✅ {} job for user {} ended: {}", mode, req.user_id, outcome.label());
        metrics::record_job(mode.as_ref(), outcome.label());
        outcome
    }

    /// Entry point for every inline button press
    pub async fn handle_choice(
        &self,
        user_id: UserId,
        chat: ChatRef,
        origin: Option<MessageRef>,
        data: &str,
    ) -> JobOutcome {
        let Some(callback) = Callback::parse(data) else {
            log::warn!("Unknown callback data from user {}: {:?}", user_id, data);
            return JobOutcome::Info("Unknown action".to_string());
        };

        let (token, action) = match callback {
            Callback::MergeNow => return self.merge_now(user_id, chat, origin).await,
            Callback::MergeClear => return self.clear_merge_queue(user_id, chat, origin).await,
            Callback::Pending { token, action } => (token, action),
        };

        let Some(choice) = self.pending.peek(&token).await else {
            let text = "⏰ This request has expired. Please send the file again.";
            self.replace_origin(chat, origin, text).await;
            return JobOutcome::Info(text.to_string());
        };
        if choice.user_id != user_id {
            log::warn!("User {} pressed a button owned by {}", user_id, choice.user_id);
            return JobOutcome::Info("This button is not for you".to_string());
        }
        if action.kind().is_some_and(|kind| kind != choice.kind) {
            log::warn!("Callback {:?} does not fit a pending {:?} request", action, choice.kind);
            return JobOutcome::Info("Unknown action".to_string());
        }
        // Claim the request; a concurrent second press finds nothing
        let Some(choice) = self.pending.take(&token).await else {
            return JobOutcome::Duplicate;
        };

        if action == ChoiceAction::Cancel {
            self.replace_origin(chat, origin, "❌ Cancelled.").await;
            return JobOutcome::Cancelled;
        }

        let Some(_ticket) = self.guard.try_acquire(&choice.file.file_id) else {
            log::info!("🔁 {} is already being processed", choice.file.file_id);
            return JobOutcome::Duplicate;
        };

        let (label, outcome) = match action {
            ChoiceAction::Extract(op) => ("extract", self.run_extract(&choice, op, origin).await),
            ChoiceAction::Compress(label) => {
                let labels = match label {
                    Some(label) => vec![label],
                    None => crate::media::quality::all_labels(),
                };
                ("compress", self.run_compress(&choice, &labels, origin).await)
            }
            ChoiceAction::AutotrimStart => ("autotrim", self.run_autotrim_file(&choice, origin).await),
            ChoiceAction::Cancel => return JobOutcome::Cancelled,
        };
        metrics::record_job(label, outcome.label());
        outcome
    }

    /// Edits the button message, or posts `text` when there is none
    pub(crate) async fn replace_origin(&self, chat: ChatRef, origin: Option<MessageRef>, text: &str) {
        let result = match origin {
            Some(message) => self.transport.edit_text(message, text).await,
            None => self.transport.send_text(chat, text).await.map(|_| ()),
        };
        if let Err(e) = result {
            log::warn!("Failed to update message in {:?}: {}", chat, e);
        }
    }

    /// Sends `text` and logs when that fails
    pub(crate) async fn notify(&self, chat: ChatRef, text: &str) {
        if let Err(e) = self.transport.send_text(chat, text).await {
            log::warn!("Failed to notify {:?}: {}", chat, e);
        }
    }
}

/// Failure outcome for errors raised before a status message exists
pub(crate) fn failed(e: &AppError) -> JobOutcome {
    log::error!("Job failed: {}", e);
    JobOutcome::Failed(e.user_message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_prefix_is_case_insensitive() {
        assert!(is_series_file("jai bajarangabali E12 [720p].mkv", "Jai Bajarangabali"));
        assert!(is_series_file("JAI BAJARANGABALI.mkv", "Jai Bajarangabali"));
        assert!(!is_series_file("Jai.mkv", "Jai Bajarangabali"));
        assert!(!is_series_file("anything.mkv", ""));
    }

    #[test]
    fn test_series_prefix_handles_multibyte_names() {
        assert!(!is_series_file("ЖЖЖЖЖЖЖЖЖЖ.mkv", "Jai Bajarangabali"));
    }
}
