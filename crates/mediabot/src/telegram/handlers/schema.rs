//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

use super::callbacks::handle_callback;
use super::commands::handle_command;
use super::media::{deliver_reply, handle_autotrim_name, handle_media, handle_photo};
use super::types::{HandlerDeps, HandlerError, sender_id};
use crate::telegram::Bot;
use crate::telegram::bot::Command;

/// Creates the dispatcher schema for the bot.
///
/// Order matters: commands first, then answers to pending prompts, then
/// auto-trim filenames, then media. Only private chats are served.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(reply_handler(deps.clone()))
        .branch(autotrim_name_handler(deps.clone()))
        .branch(photo_handler(deps.clone()))
        .branch(media_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn is_private(msg: &Message) -> bool {
    msg.chat.is_private()
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| is_private(&msg))
        .branch(dptree::entry().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let deps = deps.clone();
                async move {
                    log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
                    if let Err(e) = handle_command(&bot, &msg, cmd, &deps).await {
                        log::error!("❌ Command failed in chat {}: {}", msg.chat.id, e);
                        let _ = bot.send_message(msg.chat.id, format!("❌ Error: {}", e)).await;
                    }
                    Ok(())
                }
            },
        ))
}

/// Text answers to an interactive prompt (new filename, trim times, /cancel)
fn reply_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let waiting = deps.clone();
    Update::filter_message()
        .filter(move |msg: Message| {
            is_private(&msg) && msg.text().is_some() && waiting.replies.is_waiting(msg.chat.id.0)
        })
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                if !deliver_reply(&msg, &deps) {
                    log::debug!("Prompt in chat {} ended before the reply arrived", msg.chat.id);
                }
                Ok(())
            }
        })
}

fn autotrim_name_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let sessions = deps.pipeline.sessions().clone();
    Update::filter_message()
        .filter(move |msg: Message| {
            is_private(&msg)
                && msg.text().is_some()
                && sender_id(&msg).is_some_and(|user| sessions.is_awaiting_name(user))
        })
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                handle_autotrim_name(&msg, &deps).await?;
                Ok(())
            }
        })
}

fn photo_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| is_private(&msg) && msg.photo().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_photo(&bot, &msg, &deps).await {
                    log::error!("Failed to save thumbnail: {}", e);
                    let _ = bot.send_message(msg.chat.id, "❌ Failed to save thumbnail.").await;
                }
                Ok(())
            }
        })
}

fn media_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            is_private(&msg) && (msg.document().is_some() || msg.video().is_some() || msg.audio().is_some())
        })
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                handle_media(&msg, &deps).await?;
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            handle_callback(&bot, &q, &deps).await?;
            Ok(())
        }
    })
}
