//! Plain HTTP fetches of remote media (trim by link, auto-trim, series thumbnail).

use std::path::Path;
use std::time::{Duration, Instant};

use fs_err::tokio as fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::status::Status;
use super::transfer::size_limit_message;
use crate::core::error::{AppError, AppResult};
use crate::media::human_bytes;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

/// Parses `raw` and accepts only http(s) URLs
pub fn parse_media_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Validation(format!(
            "❌ Unsupported URL scheme: {}\n\nOnly http and https links are accepted.",
            other
        ))),
    }
}

/// Last path segment of the URL, or `video.mp4`
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(percent_decode)
        .unwrap_or_else(|| "video.mp4".to_string())
}

fn percent_decode(segment: &str) -> String {
    url::form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(k, v)| if v.is_empty() { k.into_owned() } else { format!("{}={}", k, v) })
        .unwrap_or_else(|| segment.to_string())
}

/// Streams `url` into `dest`. Progress edits on `status` are throttled.
/// Aborts once the announced or received size passes `max_bytes`.
/// Returns the number of bytes written.
pub async fn fetch_to_file(
    client: &reqwest::Client,
    url: &Url,
    dest: &Path,
    max_bytes: u64,
    mut status: Option<&mut Status<'_>>,
) -> AppResult<u64> {
    log::info!("🌐 Fetching {} -> {}", url, dest.display());
    let mut response = client.get(url.clone()).send().await?;
    if !response.status().is_success() {
        return Err(AppError::HttpStatus(response.status()));
    }

    let total = response.content_length();
    if let Some(total) = total.filter(|&t| t > max_bytes) {
        log::warn!("Link {} announces {} bytes, limit is {}", url, total, max_bytes);
        return Err(AppError::Validation(size_limit_message(total, max_bytes)));
    }

    let mut file = fs::File::create(dest).await?;
    let mut written: u64 = 0;
    let mut last_report = Instant::now();

    while let Some(chunk) = response.chunk().await? {
        written += chunk.len() as u64;
        if written > max_bytes {
            log::warn!("Link {} passed the {} byte limit, aborting", url, max_bytes);
            drop(file);
            crate::media::remove_quietly(dest).await;
            return Err(AppError::Validation(size_limit_message(written, max_bytes)));
        }
        file.write_all(&chunk).await?;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            last_report = Instant::now();
            if let Some(status) = status.as_deref_mut() {
                status.update(&progress_text(written, total)).await;
            }
        }
    }
    file.flush().await?;

    if written == 0 {
        return Err(AppError::Validation("❌ The link returned an empty file.".to_string()));
    }
    log::info!("🌐 Fetched {} ({})", url, human_bytes(written));
    Ok(written)
}

fn progress_text(written: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => format!(
            "📥 Downloading from link...\n\n{} / {} ({:.0}%)",
            human_bytes(written),
            human_bytes(total),
            written as f64 * 100.0 / total as f64
        ),
        _ => format!("📥 Downloading from link...\n\n{}", human_bytes(written)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_media_url() {
        assert!(parse_media_url("https://example.com/a.mp4").is_ok());
        assert!(parse_media_url(" http://example.com/a.mp4 ").is_ok());
        assert!(matches!(parse_media_url("ftp://example.com/a.mp4"), Err(AppError::Validation(_))));
        assert!(matches!(parse_media_url("not a url"), Err(AppError::Url(_))));
    }

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://example.com/media/My%20Show.mkv?x=1").unwrap();
        assert_eq!(filename_from_url(&url), "My Show.mkv");
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(filename_from_url(&url), "video.mp4");
    }

    #[tokio::test]
    async fn test_fetch_to_file_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let url = Url::parse(&format!("{}/clip.mp4", server.uri())).unwrap();
        let written = fetch_to_file(&reqwest::Client::new(), &url, &dest, 1 << 20, None)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_fetch_to_file_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/missing.mp4", server.uri())).unwrap();
        let err = fetch_to_file(&reqwest::Client::new(), &url, &dir.path().join("x"), 1 << 20, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HttpStatus(s) if s.as_u16() == 404));
    }

    #[tokio::test]
    async fn test_fetch_to_file_refuses_oversized_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("big.mp4");
        let url = Url::parse(&format!("{}/big.mp4", server.uri())).unwrap();
        let err = fetch_to_file(&reqwest::Client::new(), &url, &dest, 1024, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(text) if text.contains("File Too Large")));
        assert!(!dest.exists());
    }
}
