//! End-to-end job tests against the recording transport and scripted tool
//!
//! Run with: cargo test -p mediacore --test jobs_test

mod common;

use common::*;
use mediacore::storage::{MediaMode, MediaPreference, SettingsStore};
use mediacore::transport::SendAs;
use mediacore::JobOutcome;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Rename
// ============================================================================

mod rename_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_word_rules_rename_without_prompt() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new());
        h.store
            .set_remove_words(USER, vec!["WEB-DL".to_string(), "x264".to_string()])
            .await
            .unwrap();

        let outcome = h
            .pipeline
            .handle_file(video_request("f1", "Movie.2022.720p.WEB-DL.x264.mkv"))
            .await;

        assert_eq!(outcome, JobOutcome::Completed);
        assert!(h.transport.prompts().is_empty());
        let sent = h.transport.sent_files();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].file.filename, "Movie 2022 720p.mkv");
        assert_eq!(sent[0].file.caption.as_deref(), Some("Movie 2022 720p.mkv"));
        assert_eq!(sent[0].file.send_as, SendAs::Video);
        assert_eq!(sent[0].file.duration_secs, Some(120));
        assert!(sent[0].existed);
        assert_eq!(h.tool.operations(), vec!["metadata"]);
    }

    #[tokio::test]
    async fn test_template_and_caption_to_channel() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new().with_duration(61.0));
        h.store
            .set_format_template(USER, Some("Naruto [episode] [quality]".to_string()))
            .await
            .unwrap();
        h.store
            .set_caption(USER, Some("{filename} | {duration}".to_string()))
            .await
            .unwrap();
        h.store.set_upload_channel(USER, -1_001).await.unwrap();
        h.store.set_metadata_enabled(USER, false).await.unwrap();

        let outcome = h
            .pipeline
            .handle_file(video_request("f1", "Naruto S01E05 1080p.mkv"))
            .await;

        assert_eq!(outcome, JobOutcome::Completed);
        let sent = &h.transport.sent_files()[0];
        assert_eq!(sent.chat.0, -1_001);
        assert_eq!(sent.file.filename, "Naruto EP5 1080p.mkv");
        assert_eq!(sent.file.caption.as_deref(), Some("Naruto EP5 1080p.mkv | 0:01:01"));
        assert!(h.tool.runs().is_empty());
        assert!(h.transport.all_text().contains("Uploaded to channel -1001"));
    }

    #[tokio::test]
    async fn test_prompt_timeout_keeps_original_name() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new());

        let outcome = h.pipeline.handle_file(video_request("f1", "holiday clip.mp4")).await;

        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(h.transport.sent_files()[0].file.filename, "holiday clip.mp4");
        assert!(h.transport.texts().iter().any(|t| t.contains("No name received")));
    }

    #[tokio::test]
    async fn test_prompt_cancel_stops_before_download() {
        let h = Harness::new(RecordingTransport::new().with_replies(["/cancel"]), ScriptedTool::new());

        let outcome = h.pipeline.handle_file(video_request("f1", "clip.mp4")).await;

        assert_eq!(outcome, JobOutcome::Cancelled);
        assert!(h.transport.download_attempts().is_empty());
        assert!(h.transport.sent_files().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_uploads_untagged() {
        let h = Harness::new(
            RecordingTransport::new().with_replies(["Tagged?"]),
            ScriptedTool::new().failing_on("metadata"),
        );

        assert_eq!(h.pipeline.handle_file(video_request("f1", "a.mkv")).await, JobOutcome::Completed);
        let sent = &h.transport.sent_files()[0];
        assert_eq!(sent.file.filename, "Tagged.mkv");
        assert!(sent.existed);
    }

    #[tokio::test]
    async fn test_scratch_is_empty_after_jobs() {
        let h = Harness::new(
            RecordingTransport::new().with_replies(["ok"]),
            ScriptedTool::new(),
        );
        h.pipeline.handle_file(video_request("f1", "a.mkv")).await;
        assert_eq!(h.scratch_leftovers(), Vec::<String>::new());
    }
}

// ============================================================================
// Acquisition retry
// ============================================================================

mod acquire_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_handle_is_retried() {
        let transport = RecordingTransport::new().with_replies(["Name"]).with_empty_downloads(2);
        let h = Harness::new(transport, ScriptedTool::new());

        let outcome = h.pipeline.handle_file(video_request("f1", "a.mkv")).await;

        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(h.transport.download_attempts(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_job() {
        let transport = RecordingTransport::new().with_replies(["Name"]).with_empty_downloads(10);
        let h = Harness::new(transport, ScriptedTool::new());

        let outcome = h.pipeline.handle_file(video_request("f1", "a.mkv")).await;

        assert!(matches!(outcome, JobOutcome::Failed(_)));
        assert_eq!(h.transport.download_attempts().len(), 3);
        assert!(h.transport.edits().iter().any(|t| t.starts_with("❌ Failed!")));
    }
}

// ============================================================================
// Trim
// ============================================================================

mod trim_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_trim_file() {
        let h = Harness::new(RecordingTransport::new().with_replies(["1:00", "90"]), ScriptedTool::new());
        h.store.set_media_mode(USER, MediaMode::Trim).await.unwrap();

        let outcome = h.pipeline.handle_file(video_request("f1", "Movie.mkv")).await;

        assert_eq!(outcome, JobOutcome::Completed);
        let runs = h.tool.runs();
        assert_eq!(runs.len(), 1);
        let args = runs[0].args_lossy();
        assert!(args.windows(2).any(|w| w == ["-ss", "60"]));
        let sent = &h.transport.sent_files()[0];
        assert_eq!(sent.file.filename, "Movie_trimmed.mkv");
        assert_eq!(sent.file.duration_secs, Some(30));
        assert!(sent.file.caption.as_deref().unwrap().contains("Duration: 0:00:30"));
    }

    #[tokio::test]
    async fn test_end_before_start_never_runs_the_tool() {
        let h = Harness::new(RecordingTransport::new().with_replies(["00:02:00", "00:01:00"]), ScriptedTool::new());
        h.store.set_media_mode(USER, MediaMode::Trim).await.unwrap();

        let outcome = h.pipeline.handle_file(video_request("f1", "Movie.mkv")).await;

        assert!(matches!(outcome, JobOutcome::Failed(_)));
        assert!(h.tool.runs().is_empty());
        assert!(h.transport.download_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_bad_time_and_timeout() {
        let h = Harness::new(RecordingTransport::new().with_replies(["soon"]), ScriptedTool::new());
        h.store.set_media_mode(USER, MediaMode::Trim).await.unwrap();
        let outcome = h.pipeline.handle_file(video_request("f1", "Movie.mkv")).await;
        assert!(matches!(outcome, JobOutcome::Failed(text) if text.contains("Invalid time")));

        let h = Harness::new(RecordingTransport::new().with_replies(["10"]), ScriptedTool::new());
        h.store.set_media_mode(USER, MediaMode::Trim).await.unwrap();
        let outcome = h.pipeline.handle_file(video_request("f1", "Movie.mkv")).await;
        assert_eq!(outcome, JobOutcome::Cancelled);
        assert!(h.tool.runs().is_empty());
    }

    #[tokio::test]
    async fn test_trim_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/media/clip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4096]))
            .mount(&server)
            .await;
        let h = Harness::new(RecordingTransport::new().with_replies(["5", "0:10"]), ScriptedTool::new());

        let url = format!("{}/media/clip%20one.mp4", server.uri());
        let outcome = h.pipeline.trim_link(USER, CHAT, &url).await;

        assert_eq!(outcome, JobOutcome::Completed);
        let sent = &h.transport.sent_files()[0];
        assert_eq!(sent.file.filename, "clip one_trimmed.mp4");
        assert_eq!(sent.file.send_as, SendAs::Video);
        assert!(sent.file.caption.as_deref().unwrap().contains("Start: 0:00:05"));
    }

    #[tokio::test]
    async fn test_trim_link_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let h = Harness::new(RecordingTransport::new().with_replies(["5", "10"]), ScriptedTool::new());

        let outcome = h.pipeline.trim_link(USER, CHAT, &format!("{}/gone.mp4", server.uri())).await;
        assert!(matches!(outcome, JobOutcome::Failed(_)));
        assert!(h.transport.prompts().is_empty());

        let outcome = h.pipeline.trim_link(USER, CHAT, "ftp://example.com/a.mp4").await;
        assert!(matches!(outcome, JobOutcome::Failed(_)));
        assert!(h.tool.runs().is_empty());
    }

    #[tokio::test]
    async fn test_trim_link_over_the_size_limit_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; (21 * MB) as usize]))
            .mount(&server)
            .await;
        let h = Harness::new(RecordingTransport::new().with_replies(["5", "10"]), ScriptedTool::new());

        let outcome = h.pipeline.trim_link(USER, CHAT, &format!("{}/huge.mp4", server.uri())).await;

        assert!(matches!(outcome, JobOutcome::Failed(text) if text.contains("File Too Large")));
        assert!(h.transport.prompts().is_empty());
        assert!(h.tool.runs().is_empty());
        assert_eq!(h.scratch_leftovers(), Vec::<String>::new());
    }
}

// ============================================================================
// Compress
// ============================================================================

mod compress_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_stored_qualities_with_one_failure() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new().failing_on("scale=1280:720"));
        h.store.set_media_mode(USER, MediaMode::Compress).await.unwrap();
        h.store
            .set_compression_qualities(USER, vec!["1080p".into(), "720p".into(), "480p".into()])
            .await
            .unwrap();

        let outcome = h.pipeline.handle_file(video_request("f1", "clip.mkv")).await;

        assert_eq!(outcome, JobOutcome::Partial { succeeded: 2, failed: 1 });
        let names: Vec<String> = h.transport.sent_files().iter().map(|f| f.file.filename.clone()).collect();
        assert_eq!(names, vec!["clip_1080p.mp4", "clip_480p.mp4"]);
        assert_eq!(h.transport.download_attempts().len(), 1);
        let last = h.transport.edits().last().cloned().unwrap();
        assert!(last.contains("2/3 compressed"));
        assert!(last.contains("❌ 720p"));
        assert_eq!(h.scratch_leftovers(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_quality_buttons() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new());
        h.store.set_media_mode(USER, MediaMode::Compress).await.unwrap();

        let outcome = h.pipeline.handle_file(video_request("f1", "clip.mkv")).await;
        assert_eq!(outcome, JobOutcome::AwaitingChoice);

        let data = h.transport.last_button_data();
        assert_eq!(data.len(), 7);
        let pick = data.iter().find(|d| d.starts_with("cq:576p:")).unwrap().clone();

        let outcome = h.pipeline.handle_choice(USER, CHAT, None, &pick).await;
        assert_eq!(outcome, JobOutcome::Completed);
        assert_eq!(h.transport.sent_files()[0].file.filename, "clip_576p.mp4");
    }

    #[tokio::test]
    async fn test_every_upload_failing_fails_the_job() {
        let transport = RecordingTransport::new().failing_sends_of("clip_360p.mp4");
        let h = Harness::new(transport, ScriptedTool::new());
        h.store.set_media_mode(USER, MediaMode::Compress).await.unwrap();
        h.store.set_compression_qualities(USER, vec!["360p".into()]).await.unwrap();

        let outcome = h.pipeline.handle_file(video_request("f1", "clip.mkv")).await;
        assert!(matches!(outcome, JobOutcome::Failed(_)));
    }
}

// ============================================================================
// Extract / remove streams
// ============================================================================

mod extract_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn pick(h: &Harness, prefix: &str) -> JobOutcome {
        h.store.set_media_mode(USER, MediaMode::Extract).await.unwrap();
        assert_eq!(
            h.pipeline.handle_file(video_request("f1", "Show E01.mkv")).await,
            JobOutcome::AwaitingChoice
        );
        let data = h.transport.last_button_data();
        let choice = data.iter().find(|d| d.starts_with(prefix)).unwrap().clone();
        h.pipeline.handle_choice(USER, CHAT, None, &choice).await
    }

    #[tokio::test]
    async fn test_no_subtitles_is_informational() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new().with_subtitle_streams(0));

        let outcome = pick(&h, "ex:subs:").await;

        assert_eq!(outcome, JobOutcome::Info("No subtitles found in this file.".to_string()));
        assert!(h.tool.runs().is_empty());
        assert!(h.transport.sent_files().is_empty());
    }

    #[tokio::test]
    async fn test_extract_audio() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new());

        assert_eq!(pick(&h, "ex:audio:").await, JobOutcome::Completed);
        let sent = &h.transport.sent_files()[0];
        assert_eq!(sent.file.filename, "Show E01.mp3");
        assert_eq!(sent.file.send_as, SendAs::Audio);
        assert_eq!(h.tool.operations(), vec!["extract_audio"]);
    }

    #[tokio::test]
    async fn test_remove_both_honours_preference() {
        let h = Harness::new(RecordingTransport::new(), ScriptedTool::new());
        h.store
            .set_media_type_preference(USER, Some(MediaPreference::Document))
            .await
            .unwrap();

        assert_eq!(pick(&h, "rm:both:").await, JobOutcome::Completed);
        let sent = &h.transport.sent_files()[0];
        assert_eq!(sent.file.filename, "Show E01_video_only.mkv");
        assert_eq!(sent.file.send_as, SendAs::Document);
    }
}
