//! [`Transport`] implementation over the Telegram Bot API.
//!
//! The primary identity handles every chat interaction. The elevated one,
//! when configured, only moves files that exceed the primary size ceiling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use teloxide::{ApiError, RequestError};

use mediacore::core::retry::{RetryConfig, retry};
use mediacore::transport::{
    Actor, Button, ChatRef, DownloadRequest, MessageRef, OutgoingFile, RemoteFile, Reply, SendAs, Transport,
};
use mediacore::{AppError, AppResult};

use super::files::remote_file;
use super::replies::PendingReplies;

pub struct TelegramTransport {
    primary: Bot,
    elevated: Option<Bot>,
    replies: PendingReplies,
    notify_retry: RetryConfig,
}

impl TelegramTransport {
    pub fn new(primary: Bot, elevated: Option<Bot>, replies: PendingReplies) -> Self {
        Self {
            primary,
            elevated,
            replies,
            notify_retry: RetryConfig::rate_limit(),
        }
    }

    pub fn primary(&self) -> &Bot {
        &self.primary
    }

    pub fn replies(&self) -> &PendingReplies {
        &self.replies
    }

    fn bot(&self, actor: Actor) -> &Bot {
        match (actor, self.elevated.as_ref()) {
            (Actor::Elevated, Some(bot)) => bot,
            (Actor::Elevated, None) => {
                log::warn!("Elevated identity requested but not configured, using primary");
                &self.primary
            }
            (Actor::Primary, _) => &self.primary,
        }
    }
}

fn message_ref(chat: ChatRef, msg: &Message) -> MessageRef {
    MessageRef {
        chat,
        message_id: msg.id.0,
    }
}

fn keyboard(rows: Vec<Vec<Button>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.into_iter().map(|row| {
        row.into_iter()
            .map(|b| InlineKeyboardButton::callback(b.label, b.data))
            .collect::<Vec<_>>()
    }))
}

/// Copies a file the Bot API server left on the local disk (`--local` mode),
/// otherwise streams it over HTTP
async fn save_file(bot: &Bot, remote_path: &str, dest: &Path) -> AppResult<()> {
    let local = Path::new(remote_path);
    if local.is_absolute() && fs_err::tokio::metadata(local).await.is_ok() {
        log::info!("📂 Local Bot API file, copying {}", remote_path);
        fs_err::tokio::copy(local, dest).await?;
        return Ok(());
    }

    let mut dst = fs_err::tokio::File::create(dest).await?;
    bot.download_file(remote_path, &mut dst)
        .await
        .map_err(|e| AppError::Transport(format!("download of {} failed: {}", remote_path, e)))
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat: ChatRef, text: &str) -> AppResult<MessageRef> {
        let bot = &self.primary;
        let msg = retry(&self.notify_retry, |_| async move { bot.send_message(ChatId(chat.0), text).await })
            .await
            .into_result()?;
        Ok(message_ref(chat, &msg))
    }

    async fn send_with_buttons(&self, chat: ChatRef, text: &str, rows: Vec<Vec<Button>>) -> AppResult<MessageRef> {
        let bot = &self.primary;
        let markup = keyboard(rows);
        let msg = retry(&self.notify_retry, |_| {
            let markup = markup.clone();
            async move { bot.send_message(ChatId(chat.0), text).reply_markup(markup).await }
        })
        .await
        .into_result()?;
        Ok(message_ref(chat, &msg))
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> AppResult<()> {
        let result = self
            .primary
            .edit_message_text(ChatId(message.chat.0), MessageId(message.message_id), text)
            .await;
        match result {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn send_file(
        &self,
        actor: Actor,
        chat: ChatRef,
        file: &OutgoingFile,
        progress: Option<MessageRef>,
    ) -> AppResult<()> {
        if let Some(progress) = progress {
            let text = format!("📤 Uploading {}...", file.filename);
            if let Err(e) = self.edit_text(progress, &text).await {
                log::debug!("Progress edit failed: {}", e);
            }
        }

        let bot = self.bot(actor);
        let chat_id = ChatId(chat.0);
        let input = InputFile::file(&file.path).file_name(file.filename.clone());
        let caption = file.caption.clone().unwrap_or_else(|| file.filename.clone());
        let thumbnail = file.thumbnail.as_ref().map(InputFile::file);
        log::info!("📤 Sending {} as {} via {} identity", file.filename, file.send_as, actor);

        let sent = match file.send_as {
            SendAs::Video => {
                let mut req = bot.send_video(chat_id, input).caption(caption).supports_streaming(true);
                if let Some(thumb) = thumbnail {
                    req = req.thumbnail(thumb);
                }
                if let Some(duration) = file.duration_secs {
                    req = req.duration(duration);
                }
                req.await
            }
            SendAs::Audio => {
                let mut req = bot.send_audio(chat_id, input).caption(caption);
                if let Some(thumb) = thumbnail {
                    req = req.thumbnail(thumb);
                }
                if let Some(duration) = file.duration_secs {
                    req = req.duration(duration);
                }
                req.await
            }
            SendAs::Document => {
                let mut req = bot
                    .send_document(chat_id, input)
                    .caption(caption)
                    .disable_content_type_detection(true);
                if let Some(thumb) = thumbnail {
                    req = req.thumbnail(thumb);
                }
                req.await
            }
            SendAs::Photo => bot.send_photo(chat_id, InputFile::file(&file.path)).caption(caption).await,
        };
        sent?;
        Ok(())
    }

    async fn download(&self, request: DownloadRequest<'_>) -> AppResult<Option<PathBuf>> {
        let bot = self.bot(request.actor);
        if let Some(progress) = request.progress {
            let text = if request.attempt == 0 {
                "📥 Downloading...".to_string()
            } else {
                format!("📥 Downloading... (attempt {})", request.attempt + 1)
            };
            if let Err(e) = self.edit_text(progress, &text).await {
                log::debug!("Progress edit failed: {}", e);
            }
        }

        let file = bot.get_file(FileId(request.file_id.to_string())).await?;
        if file.path.is_empty() {
            log::warn!("Bot API returned no path for {}", request.file_id);
            return Ok(None);
        }
        log::info!("📥 Downloading {} ({} bytes) via {}", file.path, file.size, request.actor);

        if let Some(parent) = request.dest.parent() {
            fs_err::tokio::create_dir_all(parent).await?;
        }
        save_file(bot, &file.path, request.dest).await?;
        Ok(Some(request.dest.to_path_buf()))
    }

    async fn ask(&self, chat: ChatRef, prompt: &str, timeout: Duration) -> AppResult<Reply> {
        // Register first so a fast reply cannot slip past the waiter
        let mut ticket = self.replies.register(chat.0);
        if let Err(e) = self.send_text(chat, prompt).await {
            self.replies.forget(&ticket);
            return Err(e);
        }

        match tokio::time::timeout(timeout, &mut ticket.rx).await {
            Ok(Ok(text)) => Ok(Reply::Text(text)),
            // Replaced by a newer prompt in the same chat
            Ok(Err(_)) => Ok(Reply::TimedOut),
            Err(_) => {
                self.replies.forget(&ticket);
                Ok(Reply::TimedOut)
            }
        }
    }

    async fn fetch_file(&self, chat: ChatRef, message_id: i32) -> AppResult<Option<RemoteFile>> {
        // The Bot API has no "get message"; a forward into the same chat
        // returns a fresh copy with current file handles.
        let chat_id = ChatId(chat.0);
        let forwarded = match self.primary.forward_message(chat_id, chat_id, MessageId(message_id)).await {
            Ok(msg) => msg,
            Err(RequestError::Api(e)) => {
                log::warn!("Message {} in chat {} is gone: {}", message_id, chat.0, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file = remote_file(&forwarded).map(|mut file| {
            file.message_id = message_id;
            file
        });
        if let Err(e) = self.primary.delete_message(chat_id, forwarded.id).await {
            log::debug!("Failed to delete forwarded copy: {}", e);
        }
        Ok(file)
    }

    async fn channel_title_if_admin(&self, channel: ChatRef) -> AppResult<Option<String>> {
        let me = self.primary.get_me().await?;
        let member = match self.primary.get_chat_member(ChatId(channel.0), me.id).await {
            Ok(member) => member,
            Err(RequestError::Api(e)) => {
                log::info!("Bot has no access to channel {}: {}", channel.0, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if !member.is_privileged() {
            return Ok(None);
        }

        let chat = self.primary.get_chat(ChatId(channel.0)).await?;
        Ok(Some(
            chat.title().map(str::to_string).unwrap_or_else(|| channel.0.to_string()),
        ))
    }

    async fn is_connected(&self, actor: Actor) -> bool {
        let bot = match (actor, self.elevated.as_ref()) {
            (Actor::Primary, _) => &self.primary,
            (Actor::Elevated, Some(bot)) => bot,
            (Actor::Elevated, None) => return false,
        };
        match bot.get_me().await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("{} identity is not reachable: {}", actor, e);
                false
            }
        }
    }

    fn has_elevated(&self) -> bool {
        self.elevated.is_some()
    }
}
