//! Pending inline choices.
//!
//! A job that offers buttons parks its request here under a short random
//! token, and the buttons carry only that token. Callback data is capped at
//! 64 bytes by the transport, so file identifiers never travel in it.
//!
//! Callback grammar:
//!
//! ```text
//! ex:audio:<t>   ex:subs:<t>
//! rm:audio:<t>   rm:subs:<t>   rm:both:<t>
//! cq:<label>:<t> cq:all:<t>
//! at:start:<t>
//! cancel:<t>
//! mg:now         mg:clear
//! ```

use moka::future::Cache;

use super::extract::ExtractOp;
use crate::core::config;
use crate::media::commands::StreamRemoval;
use crate::media::quality;
use crate::storage::UserId;
use crate::transport::{ChatRef, RemoteFile};

const TOKEN_LEN: usize = 12;

/// Which job is waiting on the choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Extract,
    Compress,
    Autotrim,
}

/// A parked request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChoice {
    pub user_id: UserId,
    pub chat: ChatRef,
    pub file: RemoteFile,
    pub kind: ChoiceKind,
}

/// What a pressed button asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceAction {
    Extract(ExtractOp),
    /// One catalog label, or `None` for every quality
    Compress(Option<String>),
    AutotrimStart,
    Cancel,
}

impl ChoiceAction {
    /// Job kind the action belongs to; `None` fits any kind
    pub fn kind(&self) -> Option<ChoiceKind> {
        match self {
            ChoiceAction::Extract(_) => Some(ChoiceKind::Extract),
            ChoiceAction::Compress(_) => Some(ChoiceKind::Compress),
            ChoiceAction::AutotrimStart => Some(ChoiceKind::Autotrim),
            ChoiceAction::Cancel => None,
        }
    }
}

/// Decoded callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Pending { token: String, action: ChoiceAction },
    MergeNow,
    MergeClear,
}

impl Callback {
    pub fn pending(token: &str, action: ChoiceAction) -> Self {
        Callback::Pending {
            token: token.to_string(),
            action,
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "mg:now" => return Some(Callback::MergeNow),
            "mg:clear" => return Some(Callback::MergeClear),
            _ => {}
        }

        if let Some(token) = data.strip_prefix("cancel:") {
            return valid_token(token).map(|t| Callback::pending(t, ChoiceAction::Cancel));
        }

        let mut parts = data.splitn(3, ':');
        let (group, arg, token) = (parts.next()?, parts.next()?, parts.next()?);
        let token = valid_token(token)?;
        let action = match (group, arg) {
            ("ex", "audio") => ChoiceAction::Extract(ExtractOp::Audio),
            ("ex", "subs") => ChoiceAction::Extract(ExtractOp::Subtitle),
            ("rm", "audio") => ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Audio)),
            ("rm", "subs") => ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Subtitles)),
            ("rm", "both") => ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Both)),
            ("cq", label) if label == quality::ALL => ChoiceAction::Compress(None),
            ("cq", label) => ChoiceAction::Compress(Some(quality::find(label)?.label.to_string())),
            ("at", "start") => ChoiceAction::AutotrimStart,
            _ => return None,
        };
        Some(Callback::pending(token, action))
    }

    pub fn encode(&self) -> String {
        match self {
            Callback::MergeNow => "mg:now".to_string(),
            Callback::MergeClear => "mg:clear".to_string(),
            Callback::Pending { token, action } => match action {
                ChoiceAction::Extract(ExtractOp::Audio) => format!("ex:audio:{}", token),
                ChoiceAction::Extract(ExtractOp::Subtitle) => format!("ex:subs:{}", token),
                ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Audio)) => format!("rm:audio:{}", token),
                ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Subtitles)) => format!("rm:subs:{}", token),
                ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Both)) => format!("rm:both:{}", token),
                ChoiceAction::Compress(None) => format!("cq:{}:{}", quality::ALL, token),
                ChoiceAction::Compress(Some(label)) => format!("cq:{}:{}", label, token),
                ChoiceAction::AutotrimStart => format!("at:start:{}", token),
                ChoiceAction::Cancel => format!("cancel:{}", token),
            },
        }
    }
}

fn valid_token(token: &str) -> Option<&str> {
    (!token.is_empty() && token.len() <= TOKEN_LEN && token.chars().all(|c| c.is_ascii_alphanumeric())).then_some(token)
}

fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..TOKEN_LEN].to_string()
}

/// TTL cache of parked requests, shared by every pipeline clone
#[derive(Clone)]
pub struct PendingChoices {
    cache: Cache<String, PendingChoice>,
}

impl Default for PendingChoices {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingChoices {
    pub fn new() -> Self {
        Self::with_ttl(config::pending::ttl())
    }

    pub fn with_ttl(ttl: std::time::Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(config::pending::MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Parks `choice` and returns its token
    pub async fn park(&self, choice: PendingChoice) -> String {
        let token = new_token();
        self.cache.insert(token.clone(), choice).await;
        token
    }

    pub async fn peek(&self, token: &str) -> Option<PendingChoice> {
        self.cache.get(token).await
    }

    /// Removes and returns the request
    pub async fn take(&self, token: &str) -> Option<PendingChoice> {
        self.cache.remove(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use pretty_assertions::assert_eq;

    fn choice() -> PendingChoice {
        PendingChoice {
            user_id: 7,
            chat: ChatRef(7),
            file: RemoteFile {
                file_id: "file-1".into(),
                file_name: "a.mkv".into(),
                size_bytes: 10,
                kind: MediaKind::Video,
                message_id: 1,
            },
            kind: ChoiceKind::Extract,
        }
    }

    #[test]
    fn test_parse_known_callbacks() {
        assert_eq!(Callback::parse("mg:now"), Some(Callback::MergeNow));
        assert_eq!(
            Callback::parse("rm:both:abc123"),
            Some(Callback::pending(
                "abc123",
                ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Both))
            ))
        );
        assert_eq!(
            Callback::parse("cq:720P:abc"),
            Some(Callback::pending("abc", ChoiceAction::Compress(Some("720p".into()))))
        );
        assert_eq!(
            Callback::parse("cq:all:abc"),
            Some(Callback::pending("abc", ChoiceAction::Compress(None)))
        );
        assert_eq!(
            Callback::parse("cancel:abc"),
            Some(Callback::pending("abc", ChoiceAction::Cancel))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Callback::parse("cq:999p:abc"), None);
        assert_eq!(Callback::parse("ex:video:abc"), None);
        assert_eq!(Callback::parse("ex:audio:"), None);
        assert_eq!(Callback::parse("ex:audio:../../etc"), None);
        assert_eq!(Callback::parse(""), None);
    }

    #[test]
    fn test_encoded_callbacks_fit_transport_limit() {
        let token = new_token();
        assert_eq!(token.len(), TOKEN_LEN);
        for action in [
            ChoiceAction::Extract(ExtractOp::Remove(StreamRemoval::Subtitles)),
            ChoiceAction::Compress(Some("1080p".into())),
            ChoiceAction::AutotrimStart,
        ] {
            let encoded = Callback::pending(&token, action.clone()).encode();
            assert!(encoded.len() <= 64);
            assert_eq!(Callback::parse(&encoded), Some(Callback::pending(&token, action)));
        }
    }

    #[tokio::test]
    async fn test_park_and_take() {
        let pending = PendingChoices::new();
        let token = pending.park(choice()).await;
        assert_eq!(pending.peek(&token).await, Some(choice()));
        assert_eq!(pending.take(&token).await, Some(choice()));
        assert_eq!(pending.take(&token).await, None);
    }
}
