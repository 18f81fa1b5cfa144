//! Inline button presses

use teloxide::prelude::*;
use teloxide::types::CallbackQuery;

use mediacore::transport::{ChatRef, MessageRef};

use super::types::{HandlerDeps, HandlerError};

/// Routes a button press to the pipeline. The query is answered right away;
/// the chosen job reports through its own status message.
pub async fn handle_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    let (Some(data), Some(message)) = (q.data.clone(), q.regular_message()) else {
        return Ok(());
    };
    let Ok(user_id) = i64::try_from(q.from.id.0) else {
        return Ok(());
    };
    let chat = ChatRef(message.chat.id.0);
    let origin = MessageRef {
        chat,
        message_id: message.id.0,
    };

    log::info!("🔘 Callback {:?} from user {}", data, user_id);
    let pipeline = deps.pipeline.clone();
    tokio::spawn(async move {
        let outcome = pipeline.handle_choice(user_id, chat, Some(origin), &data).await;
        log::debug!("Callback {:?} returned {:?}", data, outcome);
    });
    Ok(())
}
