//! Mapping of Telegram attachments onto pipeline file descriptors

use teloxide::types::{FileMeta, Message};

use mediacore::media::{MediaKind, is_subtitle_name};
use mediacore::transport::RemoteFile;

/// Attachment class as Telegram reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Document,
    Video,
    Audio,
}

/// Display name for an attachment, with the defaults Telegram clients imply
/// when a video or audio is sent without one
pub fn attachment_name(attachment: Attachment, file_name: Option<&str>) -> String {
    match file_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => match attachment {
            Attachment::Video => "video.mp4".to_string(),
            Attachment::Audio => "audio.mp3".to_string(),
            Attachment::Document => "document".to_string(),
        },
    }
}

/// Media kind recorded for an attachment
pub fn attachment_kind(attachment: Attachment, name: &str) -> MediaKind {
    match attachment {
        Attachment::Video => MediaKind::Video,
        Attachment::Audio => MediaKind::Audio,
        Attachment::Document if is_subtitle_name(name) => MediaKind::Subtitle,
        Attachment::Document => MediaKind::Document,
    }
}

fn describe(attachment: Attachment, meta: &FileMeta, file_name: Option<&str>, message_id: i32) -> RemoteFile {
    let file_name = attachment_name(attachment, file_name);
    RemoteFile {
        file_id: meta.id.0.clone(),
        kind: attachment_kind(attachment, &file_name),
        file_name,
        size_bytes: u64::from(meta.size),
        message_id,
    }
}

/// The document, video or audio attached to `msg`
pub fn remote_file(msg: &Message) -> Option<RemoteFile> {
    let message_id = msg.id.0;
    if let Some(doc) = msg.document() {
        return Some(describe(Attachment::Document, &doc.file, doc.file_name.as_deref(), message_id));
    }
    if let Some(video) = msg.video() {
        return Some(describe(Attachment::Video, &video.file, video.file_name.as_deref(), message_id));
    }
    if let Some(audio) = msg.audio() {
        return Some(describe(Attachment::Audio, &audio.file, audio.file_name.as_deref(), message_id));
    }
    None
}

/// File id of the largest size of an attached photo
pub fn largest_photo(msg: &Message) -> Option<String> {
    msg.photo()?
        .iter()
        .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        .map(|p| p.file.id.0.clone())
}
