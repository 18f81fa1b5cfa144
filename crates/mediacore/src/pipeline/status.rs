//! The single status message a job edits while it runs.

use crate::transport::{ChatRef, MessageRef, Transport};

pub struct Status<'a> {
    transport: &'a dyn Transport,
    chat: ChatRef,
    message: Option<MessageRef>,
    last_text: String,
}

impl<'a> Status<'a> {
    /// Posts a new status message
    pub async fn start(transport: &'a dyn Transport, chat: ChatRef, text: &str) -> Status<'a> {
        let message = match transport.send_text(chat, text).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::warn!("Failed to send status message to {:?}: {}", chat, e);
                None
            }
        };
        Status {
            transport,
            chat,
            message,
            last_text: text.to_string(),
        }
    }

    /// Takes over an existing message (e.g. the one carrying the buttons)
    pub async fn reuse(
        transport: &'a dyn Transport,
        chat: ChatRef,
        origin: Option<MessageRef>,
        text: &str,
    ) -> Status<'a> {
        match origin {
            Some(message) => {
                let mut status = Status {
                    transport,
                    chat,
                    message: Some(message),
                    last_text: String::new(),
                };
                status.update(text).await;
                status
            }
            None => Self::start(transport, chat, text).await,
        }
    }

    pub fn message(&self) -> Option<MessageRef> {
        self.message
    }

    /// Edits the message; failures are logged, never propagated
    pub async fn update(&mut self, text: &str) {
        if text == self.last_text {
            return;
        }
        self.last_text = text.to_string();

        let Some(message) = self.message else {
            self.message = self.transport.send_text(self.chat, text).await.ok();
            return;
        };
        if let Err(e) = self.transport.edit_text(message, text).await {
            log::warn!("Failed to edit status message: {}", e);
        }
    }

    pub async fn fail(&mut self, detail: &str) {
        self.update(&format!("❌ Failed!\n\n{}", detail)).await;
    }

    pub async fn info(&mut self, detail: &str) {
        self.update(&format!("ℹ️ {}", detail)).await;
    }
}
