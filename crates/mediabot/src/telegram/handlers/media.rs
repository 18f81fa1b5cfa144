//! Inbound files, photos and plain-text replies

use teloxide::prelude::*;

use mediacore::JobRequest;

use super::types::{HandlerDeps, HandlerError, chat_of, sender_id};
use crate::telegram::files::{largest_photo, remote_file};

/// Starts a job for a document, video or audio message.
///
/// The job runs on its own task so that replies to its prompts can reach the
/// pending-reply registry while it waits.
pub async fn handle_media(msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (Some(user_id), Some(file)) = (sender_id(msg), remote_file(msg)) else {
        return Ok(());
    };
    let req = JobRequest {
        user_id,
        chat: chat_of(msg),
        file,
        caption: msg.caption().map(str::to_string),
    };

    let pipeline = deps.pipeline.clone();
    tokio::spawn(async move {
        let name = req.file.file_name.clone();
        let outcome = pipeline.handle_file(req).await;
        log::debug!("Job for {} returned {:?}", name, outcome);
    });
    Ok(())
}

/// A photo becomes the user's thumbnail
pub async fn handle_photo(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (Some(user_id), Some(file_id)) = (sender_id(msg), largest_photo(msg)) else {
        return Ok(());
    };
    deps.store().set_thumbnail(user_id, Some(file_id)).await?;
    log::info!("🖼 Thumbnail saved for user {}", user_id);
    bot.send_message(msg.chat.id, "✅ Thumbnail saved!\n\nUse /viewthumb to see it or /delthumb to remove it.")
        .await?;
    Ok(())
}

/// Hands a text message to a waiting prompt, if any. Returns whether it was consumed.
pub fn deliver_reply(msg: &Message, deps: &HandlerDeps) -> bool {
    let Some(text) = msg.text() else {
        return false;
    };
    deps.replies.deliver(msg.chat.id.0, text)
}

/// Plain text while an auto-trim session waits for its final filename
pub async fn handle_autotrim_name(msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (Some(user_id), Some(text)) = (sender_id(msg), msg.text()) else {
        return Ok(());
    };
    let pipeline = deps.pipeline.clone();
    let text = text.to_string();
    tokio::spawn(async move {
        if let Some(outcome) = pipeline.autotrim_filename_reply(user_id, &text).await {
            log::info!("Auto-trim upload for user {} ended: {}", user_id, outcome.label());
        }
    });
    Ok(())
}
