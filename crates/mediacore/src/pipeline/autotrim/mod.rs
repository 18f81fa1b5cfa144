//! Auto-trim job: cut repeated intro cards out of an episode.
//!
//! ```text
//! intro video ─► reference frame
//! target ─► scan (gray frames) ─► hits ─► keep segments ─► cut + concat
//!        ─► wait for filename ─► episode thumbnail ─► upload to series channel
//! ```
//!
//! The job spans two inbound messages (the start, then the filename reply),
//! so its state lives in [`session::AutotrimSessions`].

pub mod detect;
pub mod segments;
pub mod session;

use std::path::{Path, PathBuf};

use url::Url;

use self::detect::IntroDetector;
use self::segments::keep_segments;
use self::session::{SessionTicket, Stage};
use super::choices::{Callback, ChoiceAction, ChoiceKind, PendingChoice};
use super::dispatcher::{failed, settle};
use super::fetch::{fetch_to_file, filename_from_url, parse_media_url};
use super::scratch::Scratch;
use super::status::Status;
use super::{JobOutcome, JobRequest, Pipeline};
use crate::core::config::{self, autotrim as tuning};
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::media::tool::FrameGeometry;
use crate::media::{commands, format_duration, get_file_size, has_media_extension, human_bytes, split_extension};
use crate::naming::patterns::{extract_autotrim_episode, extract_quality};
use crate::naming::text::sanitize_filename;
use crate::storage::UserId;
use crate::transport::{Button, ChatRef, MessageRef, OutgoingFile, RemoteFile, SendAs};

/// Scan geometry used for both the reference frame and the target
pub fn scan_geometry() -> FrameGeometry {
    FrameGeometry {
        width: tuning::FRAME_WIDTH,
        height: tuning::FRAME_HEIGHT,
        fps: tuning::SCAN_FPS,
    }
}

/// Final upload name from the user's reply; `.mp4` when it has no media extension
pub fn autotrim_filename(reply: &str) -> String {
    let name = sanitize_filename(reply.trim());
    if name.is_empty() {
        "autotrim.mp4".to_string()
    } else if has_media_extension(&name) {
        name
    } else {
        format!("{}.mp4", name)
    }
}

enum Source<'a> {
    Link(Url),
    File(&'a RemoteFile),
}

impl Source<'_> {
    fn name(&self) -> String {
        match self {
            Source::Link(url) => filename_from_url(url),
            Source::File(file) => file.file_name.clone(),
        }
    }
}

enum Prepared {
    Ready {
        output: PathBuf,
        hits: usize,
        segments: usize,
    },
    /// Normal "nothing to cut" result with a diagnostic
    Nothing(String),
    Cancelled,
}

impl Pipeline {
    /// `/autotrim <video_url> [intro_url]`
    pub async fn autotrim_link(
        &self,
        user_id: UserId,
        chat: ChatRef,
        video_url: &str,
        intro_url: Option<&str>,
    ) -> JobOutcome {
        let urls = parse_media_url(video_url).and_then(|video| {
            let intro = parse_media_url(intro_url.unwrap_or(&self.settings.intro_video_url))?;
            Ok((video, intro))
        });
        let (video, intro) = match urls {
            Ok(urls) => urls,
            Err(e) => {
                self.notify(chat, &e.user_message()).await;
                return failed(&e);
            }
        };

        let outcome = self.start_autotrim(user_id, chat, Source::Link(video), intro, None).await;
        metrics::record_job("autotrim", outcome.label());
        outcome
    }

    pub(crate) async fn offer_autotrim(&self, req: &JobRequest) -> JobOutcome {
        let token = self
            .pending
            .park(PendingChoice {
                user_id: req.user_id,
                chat: req.chat,
                file: req.file.clone(),
                kind: ChoiceKind::Autotrim,
            })
            .await;
        let rows = vec![vec![
            Button::new(
                "▶️ Start Auto-Trim",
                Callback::pending(&token, ChoiceAction::AutotrimStart).encode(),
            ),
            Button::new("❌ Cancel", Callback::pending(&token, ChoiceAction::Cancel).encode()),
        ]];
        let text = format!(
            "✂️ Auto-trim removes repeated intro cards from:\n\n📁 {}",
            req.file.file_name
        );
        match self.transport.send_with_buttons(req.chat, &text, rows).await {
            Ok(_) => JobOutcome::AwaitingChoice,
            Err(e) => failed(&e),
        }
    }

    pub(crate) async fn run_autotrim_file(&self, choice: &PendingChoice, origin: Option<MessageRef>) -> JobOutcome {
        let intro = match parse_media_url(&self.settings.intro_video_url) {
            Ok(url) => url,
            Err(e) => {
                self.replace_origin(choice.chat, origin, &e.user_message()).await;
                return failed(&e);
            }
        };
        self.start_autotrim(choice.user_id, choice.chat, Source::File(&choice.file), intro, origin)
            .await
    }

    async fn start_autotrim(
        &self,
        user_id: UserId,
        chat: ChatRef,
        source: Source<'_>,
        intro: Url,
        origin: Option<MessageRef>,
    ) -> JobOutcome {
        let Some(ticket) = self.sessions.begin(user_id, chat, &source.name()) else {
            let text = "ℹ️ You already have an active auto-trim session.\n\nUse /autotrimcancel to cancel it.";
            self.replace_origin(chat, origin, text).await;
            return JobOutcome::Info(text.to_string());
        };

        let mut status = Status::reuse(
            self.transport.as_ref(),
            chat,
            origin,
            "🔧 Auto-Trim started!\n\n⏳ Step 1/4: Preparing intro template...",
        )
        .await;
        let status_message = status.message();
        self.sessions.update(user_id, ticket.id, |s| s.status = status_message);

        let cancel = &ticket.cancel;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = self
            .autotrim_prepare(user_id, &source, &intro, &ticket, &mut status, &mut scratch)
            .await;

        match result {
            Ok(Prepared::Ready { output, hits, segments }) => {
                let mut slot = Some(scratch);
                let stored = !cancel.is_cancelled()
                    && self.sessions.update(user_id, ticket.id, |s| {
                        s.output = Some(output);
                        s.hits = hits;
                        s.segments = segments;
                        s.stage = Stage::AwaitingName;
                        s.scratch = slot.take();
                    });
                if let Some(scratch) = slot {
                    scratch.cleanup().await;
                }
                if !stored {
                    status.update("❌ Auto-trim cancelled.").await;
                    return JobOutcome::Cancelled;
                }
                status
                    .update(&format!(
                        "✅ Trimmed! {} intro card(s) found, {} segment(s) kept.\n\n\
                         ✏️ Send the final filename (e.g. Episode 11.mp4).\n\
                         Send {} to abort.",
                        hits,
                        segments,
                        config::prompts::CANCEL_TOKEN
                    ))
                    .await;
                JobOutcome::AwaitingReply
            }
            Ok(Prepared::Nothing(diagnostic)) => {
                self.sessions.take_if(user_id, ticket.id);
                scratch.cleanup().await;
                status.info(&diagnostic).await;
                JobOutcome::Info(diagnostic)
            }
            Ok(Prepared::Cancelled) => {
                scratch.cleanup().await;
                status.update("❌ Auto-trim cancelled.").await;
                JobOutcome::Cancelled
            }
            Err(_) if cancel.is_cancelled() => {
                scratch.cleanup().await;
                status.update("❌ Auto-trim cancelled.").await;
                JobOutcome::Cancelled
            }
            Err(e) => {
                self.sessions.take_if(user_id, ticket.id);
                scratch.cleanup().await;
                settle(&mut status, Err(e)).await
            }
        }
    }

    async fn autotrim_prepare(
        &self,
        user_id: UserId,
        source: &Source<'_>,
        intro: &Url,
        ticket: &SessionTicket,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<Prepared> {
        let cancel = &ticket.cancel;
        self.scratch_dir().await?;
        let geometry = scan_geometry();

        let intro_path = scratch.path("intro", "mp4");
        let max_bytes = self.link_size_limit().await;
        fetch_to_file(&self.http, intro, &intro_path, max_bytes, None).await?;
        let reference = self.reference_frame(&intro_path, geometry, scratch).await?;

        status.update("⏳ Step 2/4: Downloading video...").await;
        let video = match source {
            Source::Link(url) => {
                let dest = scratch.path("autotrim_src", split_extension(&filename_from_url(url)).1);
                fetch_to_file(&self.http, url, &dest, max_bytes, Some(&mut *status)).await?;
                dest
            }
            Source::File(file) => {
                let actor = self.download_actor(file.size_bytes).await?;
                let dest = scratch.path("autotrim_src", split_extension(&file.file_name).1);
                let path = self.acquire(actor, file, &dest, status.message()).await?;
                scratch.track(&path);
                path
            }
        };
        if cancel.is_cancelled() {
            return Ok(Prepared::Cancelled);
        }
        let duration = self.tool.media_duration(&video).await?;

        status.update("⏳ Step 3/4: Analyzing video for intro cards...").await;
        if !self.sessions.set_stage(user_id, ticket.id, Stage::Analyzing) {
            return Ok(Prepared::Cancelled);
        }
        let mut detector = IntroDetector::new(
            reference,
            geometry.fps,
            tuning::MATCH_THRESHOLD,
            tuning::DEBOUNCE_SECS,
        );
        let frames = self
            .tool
            .scan_gray_frames(&video, geometry, cancel, &mut |frame: &[u8]| detector.push_frame(frame))
            .await?;
        log::info!(
            "🔍 Scanned {} frames of {}, {} intro card(s)",
            frames,
            video.display(),
            detector.hits().len()
        );

        if detector.hits().len() < tuning::MIN_HITS {
            let found: Vec<String> = detector
                .hits()
                .iter()
                .map(|h| format!("{} ({:.2})", format_duration(h.timestamp), h.score))
                .collect();
            let best = detector
                .best_score()
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "n/a".to_string());
            return Ok(Prepared::Nothing(format!(
                "Not enough intro cards found: {} (need at least {}).\n\n\
                 Frames scanned: {}\nBest similarity: {}\nFound at: {}",
                found.len(),
                tuning::MIN_HITS,
                frames,
                best,
                if found.is_empty() { "-".to_string() } else { found.join(", ") }
            )));
        }

        let hits = detector.into_hits();
        let segments = keep_segments(&hits, duration);
        if segments.is_empty() {
            return Ok(Prepared::Nothing(format!(
                "Found {} intro cards but no valid segment to keep.",
                hits.len()
            )));
        }

        status
            .update(&format!("⏳ Step 4/4: Cutting {} segment(s)...", segments.len()))
            .await;
        if !self.sessions.set_stage(user_id, ticket.id, Stage::Cutting) {
            return Ok(Prepared::Cancelled);
        }
        let segment_dir = scratch.dir("segments");
        fs_err::tokio::create_dir_all(&segment_dir).await?;

        let mut parts = Vec::with_capacity(segments.len());
        for (idx, segment) in segments.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(Prepared::Cancelled);
            }
            let part = segment_dir.join(format!("segment_{}.mp4", idx + 1));
            self.tool
                .run(&commands::segment_copy(&video, &part, segment.start, segment.end))
                .await?;
            parts.push(part);
        }

        let list = segment_dir.join("concat.txt");
        let part_refs: Vec<&Path> = parts.iter().map(PathBuf::as_path).collect();
        fs_err::tokio::write(&list, commands::concat_list(&part_refs)).await?;
        let output = scratch.path("autotrim", "mp4");
        self.tool.run(&commands::concat_copy(&list, &output)).await?;

        Ok(Prepared::Ready {
            output,
            hits: hits.len(),
            segments: segments.len(),
        })
    }

    async fn reference_frame(
        &self,
        intro: &Path,
        geometry: FrameGeometry,
        scratch: &mut Scratch,
    ) -> AppResult<Vec<u8>> {
        let frame_path = scratch.path("intro_frame", "gray");
        self.tool
            .run(&commands::reference_frame(intro, &frame_path, geometry))
            .await?;
        let frame = fs_err::tokio::read(&frame_path).await?;
        if frame.len() != geometry.frame_len() {
            return Err(AppError::Validation(format!(
                "❌ Intro reference frame has {} bytes, expected {}.",
                frame.len(),
                geometry.frame_len()
            )));
        }
        Ok(frame)
    }

    /// Plain-text message from a user whose session waits for a filename.
    /// `None` when there is no such session and the text is not ours.
    pub async fn autotrim_filename_reply(&self, user_id: UserId, text: &str) -> Option<JobOutcome> {
        if !self.sessions.is_awaiting_name(user_id) {
            return None;
        }
        if text.trim().eq_ignore_ascii_case(config::prompts::CANCEL_TOKEN) {
            if let Some(session) = self.sessions.take(user_id) {
                let chat = session.chat;
                if let Some(scratch) = session.scratch {
                    scratch.cleanup().await;
                }
                self.notify(chat, "✅ Auto-trim session cancelled.").await;
            }
            return Some(JobOutcome::Cancelled);
        }

        let claim = self.sessions.claim_for_upload(user_id)?;
        let (output, chat) = (claim.output.clone(), claim.chat);
        let filename = autotrim_filename(text);
        let episode = extract_autotrim_episode(&filename);
        let (hits, segments) = self
            .sessions
            .summary(user_id)
            .map(|s| (s.hits, s.segments))
            .unwrap_or_default();

        let mut status = Status::reuse(
            self.transport.as_ref(),
            chat,
            claim.status,
            "🎨 Generating custom thumbnail...",
        )
        .await;
        let mut scratch = Scratch::new(&self.settings.scratch_dir);
        let result = self
            .autotrim_upload(&output, &filename, episode, hits, segments, &mut status, &mut scratch)
            .await;
        scratch.cleanup().await;
        if let Some(session) = self.sessions.take_if(user_id, claim.id) {
            if let Some(session_scratch) = session.scratch {
                session_scratch.cleanup().await;
            }
        }

        let outcome = settle(&mut status, result).await;
        metrics::record_job("autotrim", outcome.label());
        Some(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    async fn autotrim_upload(
        &self,
        output: &Path,
        filename: &str,
        episode: u32,
        hits: usize,
        segments: usize,
        status: &mut Status<'_>,
        scratch: &mut Scratch,
    ) -> AppResult<JobOutcome> {
        let thumbnail = match self.series_thumbnail(scratch).await {
            Some(base) => {
                let badged = scratch.path("ep_thumb", "jpg");
                match self
                    .tool
                    .run(&commands::episode_thumbnail(&base, &badged, episode, None))
                    .await
                {
                    Ok(()) => Some(badged),
                    Err(e) => {
                        log::warn!("Episode thumbnail failed, using the plain one: {}", e);
                        Some(base)
                    }
                }
            }
            None => None,
        };

        let size = get_file_size(output).await?;
        let duration = self.tool.media_duration(output).await.ok();
        let caption = format!(
            "{} Episode {}\n\n📺 Quality: {}\n💾 Size: {}\n⏱ Duration: {}\n✂️ Segments: {}",
            self.settings.series_title,
            episode,
            extract_quality(filename),
            human_bytes(size),
            format_duration(duration.unwrap_or(0.0)),
            segments
        );

        status.update("📤 Uploading to channel...").await;
        let outgoing = OutgoingFile::new(output, filename, SendAs::Video)
            .caption(caption)
            .thumbnail(thumbnail)
            .duration(duration);
        self.deliver(ChatRef(self.settings.series_channel), &outgoing, status.message())
            .await?;

        status
            .update(&format!(
                "✅ Auto-Trim complete!\n\n📁 {}\nEpisode: {}\nSize: {}\nDuration: {}\nSegments: {}\nIntro cards found: {}",
                filename,
                episode,
                human_bytes(size),
                format_duration(duration.unwrap_or(0.0)),
                segments,
                hits
            ))
            .await;
        Ok(JobOutcome::Completed)
    }

    /// `/autotrimstatus`
    pub async fn autotrim_status(&self, user_id: UserId, chat: ChatRef) -> JobOutcome {
        let text = match self.sessions.summary(user_id) {
            Some(s) => format!(
                "✅ Active auto-trim session\n\n📁 Video: {}\n📍 Stage: {}\n📊 Intro cards: {}\n✂️ Segments: {}\n⏱ Running for {}",
                s.source_name,
                s.stage,
                s.hits,
                s.segments,
                format_duration(s.elapsed_secs as f64)
            ),
            None => "ℹ️ No active auto-trim session.\n\nUse /autotrim <video_link> to start.".to_string(),
        };
        self.notify(chat, &text).await;
        JobOutcome::Info(text)
    }

    /// `/autotrimcancel`: stops in-flight analysis and removes session files
    pub async fn autotrim_cancel(&self, user_id: UserId, chat: ChatRef) -> JobOutcome {
        match self.sessions.cancel(user_id) {
            Some(session) => {
                if let Some(scratch) = session.scratch {
                    scratch.cleanup().await;
                }
                log::info!("Auto-trim session of {} cancelled at stage {}", user_id, session.stage);
                self.notify(
                    chat,
                    "✅ Session cancelled.\n\nYour auto-trim session was cancelled and its temporary files removed.",
                )
                .await;
                JobOutcome::Cancelled
            }
            None => {
                let text = "ℹ️ You don't have an active auto-trim session to cancel.";
                self.notify(chat, text).await;
                JobOutcome::Info(text.to_string())
            }
        }
    }
}
