//! Recording transport

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mediacore::transport::{
    Actor, Button, ChatRef, DownloadRequest, MessageRef, OutgoingFile, RemoteFile, Reply, Transport,
};
use mediacore::AppResult;

/// A file handed to `send_file`, with what was on disk at that moment
#[derive(Debug, Clone)]
pub struct SentFile {
    pub actor: Actor,
    pub chat: ChatRef,
    pub file: OutgoingFile,
    pub existed: bool,
}

#[derive(Debug, Default)]
struct Log {
    texts: Vec<(ChatRef, String)>,
    edits: Vec<(MessageRef, String)>,
    buttons: Vec<(ChatRef, String, Vec<Vec<Button>>)>,
    files: Vec<SentFile>,
    prompts: Vec<String>,
    download_attempts: Vec<u32>,
    download_actors: Vec<Actor>,
    downloaded_ids: Vec<String>,
}

pub struct RecordingTransport {
    log: Mutex<Log>,
    replies: Mutex<VecDeque<Reply>>,
    reply_delay: Duration,
    empty_downloads: AtomicU32,
    next_message_id: AtomicI32,
    elevated: bool,
    elevated_connected: bool,
    refetchable: Mutex<HashMap<i32, RemoteFile>>,
    fail_sends_named: Mutex<Vec<String>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            log: Mutex::new(Log::default()),
            replies: Mutex::new(VecDeque::new()),
            reply_delay: Duration::ZERO,
            empty_downloads: AtomicU32::new(0),
            next_message_id: AtomicI32::new(100),
            elevated: false,
            elevated_connected: true,
            refetchable: Mutex::new(HashMap::new()),
            fail_sends_named: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text replies handed out to `ask` in order; `TimedOut` once they run out
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies
            .lock()
            .unwrap()
            .extend(replies.into_iter().map(|r| Reply::Text(r.into())));
        self
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// The first `n` downloads come back without a file handle
    pub fn with_empty_downloads(self, n: u32) -> Self {
        self.empty_downloads.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    /// Elevated identity configured but failing its liveness check
    pub fn with_elevated_disconnected(mut self) -> Self {
        self.elevated = true;
        self.elevated_connected = false;
        self
    }

    /// `send_file` fails for this output filename
    pub fn failing_sends_of(self, filename: &str) -> Self {
        self.fail_sends_named.lock().unwrap().push(filename.to_string());
        self
    }

    pub fn refetchable(&self, chat_message: i32, file: RemoteFile) {
        self.refetchable.lock().unwrap().insert(chat_message, file);
    }

    pub fn texts(&self) -> Vec<String> {
        self.log.lock().unwrap().texts.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.log.lock().unwrap().edits.iter().map(|(_, t)| t.clone()).collect()
    }

    /// Every text the user saw, sent or edited, in order of recording per kind
    pub fn all_text(&self) -> String {
        let log = self.log.lock().unwrap();
        log.texts
            .iter()
            .map(|(_, t)| t.as_str())
            .chain(log.edits.iter().map(|(_, t)| t.as_str()))
            .chain(log.buttons.iter().map(|(_, t, _)| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    pub fn button_messages(&self) -> Vec<(String, Vec<Vec<Button>>)> {
        self.log
            .lock()
            .unwrap()
            .buttons
            .iter()
            .map(|(_, text, rows)| (text.clone(), rows.clone()))
            .collect()
    }

    /// Callback data of every button of the last button message
    pub fn last_button_data(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .buttons
            .last()
            .map(|(_, _, rows)| rows.iter().flatten().map(|b| b.data.clone()).collect())
            .unwrap_or_default()
    }

    pub fn sent_files(&self) -> Vec<SentFile> {
        self.log.lock().unwrap().files.clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.log.lock().unwrap().prompts.clone()
    }

    pub fn download_attempts(&self) -> Vec<u32> {
        self.log.lock().unwrap().download_attempts.clone()
    }

    pub fn download_actors(&self) -> Vec<Actor> {
        self.log.lock().unwrap().download_actors.clone()
    }

    pub fn downloaded_ids(&self) -> Vec<String> {
        self.log.lock().unwrap().downloaded_ids.clone()
    }

    fn next_message(&self, chat: ChatRef) -> MessageRef {
        MessageRef {
            chat,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, chat: ChatRef, text: &str) -> AppResult<MessageRef> {
        self.log.lock().unwrap().texts.push((chat, text.to_string()));
        Ok(self.next_message(chat))
    }

    async fn send_with_buttons(&self, chat: ChatRef, text: &str, rows: Vec<Vec<Button>>) -> AppResult<MessageRef> {
        self.log.lock().unwrap().buttons.push((chat, text.to_string(), rows));
        Ok(self.next_message(chat))
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> AppResult<()> {
        self.log.lock().unwrap().edits.push((message, text.to_string()));
        Ok(())
    }

    async fn send_file(
        &self,
        actor: Actor,
        chat: ChatRef,
        file: &OutgoingFile,
        _progress: Option<MessageRef>,
    ) -> AppResult<()> {
        if self.fail_sends_named.lock().unwrap().contains(&file.filename) {
            return Err(mediacore::AppError::Transport(format!("upload of {} rejected", file.filename)));
        }
        let existed = tokio::fs::metadata(&file.path).await.is_ok();
        self.log.lock().unwrap().files.push(SentFile {
            actor,
            chat,
            file: file.clone(),
            existed,
        });
        Ok(())
    }

    async fn download(&self, request: DownloadRequest<'_>) -> AppResult<Option<PathBuf>> {
        {
            let mut log = self.log.lock().unwrap();
            log.download_attempts.push(request.attempt);
            log.download_actors.push(request.actor);
            log.downloaded_ids.push(request.file_id.to_string());
        }
        let empty = self
            .empty_downloads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if empty {
            return Ok(None);
        }
        tokio::fs::write(request.dest, format!("media:{}", request.file_id)).await?;
        Ok(Some(request.dest.to_path_buf()))
    }

    async fn ask(&self, _chat: ChatRef, prompt: &str, _timeout: Duration) -> AppResult<Reply> {
        self.log.lock().unwrap().prompts.push(prompt.to_string());
        if !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }
        Ok(self.replies.lock().unwrap().pop_front().unwrap_or(Reply::TimedOut))
    }

    async fn fetch_file(&self, _chat: ChatRef, message_id: i32) -> AppResult<Option<RemoteFile>> {
        Ok(self.refetchable.lock().unwrap().get(&message_id).cloned())
    }

    async fn channel_title_if_admin(&self, _channel: ChatRef) -> AppResult<Option<String>> {
        Ok(Some("Test Channel".to_string()))
    }

    async fn is_connected(&self, actor: Actor) -> bool {
        match actor {
            Actor::Primary => true,
            Actor::Elevated => self.elevated && self.elevated_connected,
        }
    }

    fn has_elevated(&self) -> bool {
        self.elevated
    }
}
