//! Pending-reply registry behind interactive prompts.
//!
//! A prompt registers a waiter for its chat before the question is sent; the
//! next plain text message in that chat is routed to it instead of the
//! regular handlers. A newer prompt in the same chat replaces the older one,
//! whose receiver then resolves with an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;

struct Waiter {
    id: u64,
    tx: oneshot::Sender<String>,
}

/// Handle to a registered waiter
pub struct ReplyTicket {
    pub chat_id: i64,
    pub id: u64,
    pub rx: oneshot::Receiver<String>,
}

#[derive(Clone, Default)]
pub struct PendingReplies {
    waiters: Arc<DashMap<i64, Waiter>>,
    next_id: Arc<AtomicU64>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `chat_id`, replacing any previous one
    pub fn register(&self, chat_id: i64) -> ReplyTicket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if self.waiters.insert(chat_id, Waiter { id, tx }).is_some() {
            log::debug!("Prompt in chat {} replaced an unanswered one", chat_id);
        }
        ReplyTicket { chat_id, id, rx }
    }

    /// Hands `text` to the chat's waiter. False when nobody is waiting.
    pub fn deliver(&self, chat_id: i64, text: &str) -> bool {
        let Some((_, waiter)) = self.waiters.remove(&chat_id) else {
            return false;
        };
        // The prompt may have given up between the lookup and the send
        waiter.tx.send(text.to_string()).is_ok()
    }

    /// Drops the ticket's waiter unless a newer prompt already replaced it
    pub fn forget(&self, ticket: &ReplyTicket) {
        self.waiters.remove_if(&ticket.chat_id, |_, w| w.id == ticket.id);
    }

    pub fn is_waiting(&self, chat_id: i64) -> bool {
        self.waiters.contains_key(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_deliver_reaches_waiter() {
        let replies = PendingReplies::new();
        let ticket = replies.register(7);
        assert!(replies.is_waiting(7));

        assert!(replies.deliver(7, "New Name"));
        assert_eq!(ticket.rx.await.unwrap(), "New Name");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_deliver_without_waiter() {
        let replies = PendingReplies::new();
        assert!(!replies.deliver(7, "hello"));
    }

    #[tokio::test]
    async fn test_newer_prompt_replaces_older() {
        let replies = PendingReplies::new();
        let first = replies.register(7);
        let second = replies.register(7);

        // The replaced sender is dropped
        assert!(first.rx.await.is_err());

        // Forgetting the stale ticket keeps the newer waiter
        let stale = ReplyTicket {
            chat_id: 7,
            id: 0,
            rx: oneshot::channel().1,
        };
        replies.forget(&stale);
        assert!(replies.is_waiting(7));

        assert!(replies.deliver(7, "x"));
        assert_eq!(second.rx.await.unwrap(), "x");
    }

    #[test]
    fn test_forget_removes_own_waiter() {
        let replies = PendingReplies::new();
        let ticket = replies.register(1);
        replies.register(2);
        replies.forget(&ticket);
        assert!(!replies.is_waiting(1));
        assert_eq!(replies.len(), 1);
    }
}
