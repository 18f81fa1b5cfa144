//! Per-user auto-trim sessions.
//!
//! Created when a job starts, removed on upload, failure or cancel. Never
//! persisted. Map guards are never held across an await: every method here
//! is synchronous.
//!
//! Every session carries an id. A job only touches the session it opened:
//! once that session is cancelled, writes under its [`SessionTicket`] miss,
//! even when a newer session exists for the same user.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::pipeline::scratch::Scratch;
use crate::storage::UserId;
use crate::transport::{ChatRef, MessageRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Preparing,
    Analyzing,
    Cutting,
    /// Trimmed output ready, waiting for the final filename
    AwaitingName,
    Uploading,
}

#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub stage: Stage,
    pub chat: ChatRef,
    pub status: Option<MessageRef>,
    pub source_name: String,
    pub cancel: CancellationToken,
    pub hits: usize,
    pub segments: usize,
    pub output: Option<PathBuf>,
    pub scratch: Option<Scratch>,
    pub started: Instant,
}

/// Cloneable view of a session for status replies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub stage: Stage,
    pub source_name: String,
    pub hits: usize,
    pub segments: usize,
    pub elapsed_secs: u64,
}

/// Handed to the job that opened a session
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub id: u64,
    pub cancel: CancellationToken,
}

/// What the filename reply needs to upload the trimmed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadClaim {
    pub id: u64,
    pub output: PathBuf,
    pub status: Option<MessageRef>,
    pub chat: ChatRef,
}

#[derive(Debug, Clone, Default)]
pub struct AutotrimSessions {
    inner: Arc<DashMap<UserId, Session>>,
    next_id: Arc<AtomicU64>,
}

impl AutotrimSessions {
    /// Opens a session; `None` when the user already has one
    pub fn begin(&self, user: UserId, chat: ChatRef, source_name: &str) -> Option<SessionTicket> {
        match self.inner.entry(user) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let cancel = CancellationToken::new();
                entry.insert(Session {
                    id,
                    stage: Stage::Preparing,
                    chat,
                    status: None,
                    source_name: source_name.to_string(),
                    cancel: cancel.clone(),
                    hits: 0,
                    segments: 0,
                    output: None,
                    scratch: None,
                    started: Instant::now(),
                });
                Some(SessionTicket { id, cancel })
            }
        }
    }

    /// Applies `f` to the session opened under `id`. Returns whether it was
    /// still there.
    pub fn update(&self, user: UserId, id: u64, f: impl FnOnce(&mut Session)) -> bool {
        match self.inner.get_mut(&user) {
            Some(mut session) if session.id == id => {
                f(&mut session);
                true
            }
            _ => false,
        }
    }

    pub fn set_stage(&self, user: UserId, id: u64, stage: Stage) -> bool {
        self.update(user, id, |s| s.stage = stage)
    }

    pub fn summary(&self, user: UserId) -> Option<SessionSummary> {
        self.inner.get(&user).map(|s| SessionSummary {
            stage: s.stage,
            source_name: s.source_name.clone(),
            hits: s.hits,
            segments: s.segments,
            elapsed_secs: s.started.elapsed().as_secs(),
        })
    }

    pub fn is_awaiting_name(&self, user: UserId) -> bool {
        self.inner
            .get(&user)
            .is_some_and(|s| s.stage == Stage::AwaitingName)
    }

    /// Moves an awaiting session to `Uploading` and hands it out. Only one
    /// caller wins when two replies race.
    pub fn claim_for_upload(&self, user: UserId) -> Option<UploadClaim> {
        let mut session = self.inner.get_mut(&user)?;
        if session.stage != Stage::AwaitingName {
            return None;
        }
        let output = session.output.clone()?;
        session.stage = Stage::Uploading;
        Some(UploadClaim {
            id: session.id,
            output,
            status: session.status,
            chat: session.chat,
        })
    }

    /// Removes the session without cancelling it
    pub fn take(&self, user: UserId) -> Option<Session> {
        self.inner.remove(&user).map(|(_, session)| session)
    }

    /// Removes the session only when it is the one opened under `id`
    pub fn take_if(&self, user: UserId, id: u64) -> Option<Session> {
        self.inner
            .remove_if(&user, |_, session| session.id == id)
            .map(|(_, session)| session)
    }

    /// Cancels in-flight work and removes the session
    pub fn cancel(&self, user: UserId) -> Option<Session> {
        let session = self.take(user)?;
        session.cancel.cancel();
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
