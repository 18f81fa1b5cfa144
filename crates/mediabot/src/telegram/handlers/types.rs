//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::Message;

use mediacore::Pipeline;
use mediacore::storage::{SettingsStore, UserId};
use mediacore::transport::{ChatRef, MessageRef};

use crate::telegram::replies::PendingReplies;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub pipeline: Pipeline,
    pub replies: PendingReplies,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(pipeline: Pipeline, replies: PendingReplies) -> Self {
        Self { pipeline, replies }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        self.pipeline.store()
    }
}

/// Sender of a message; channel posts and anonymous admins have none
pub fn sender_id(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

pub fn chat_of(msg: &Message) -> ChatRef {
    ChatRef(msg.chat.id.0)
}

pub fn message_ref_of(msg: &Message) -> MessageRef {
    MessageRef {
        chat: chat_of(msg),
        message_id: msg.id.0,
    }
}
