//! Configuration for the bot.
//! Everything is read once from the environment (after `.env` is loaded by the binary).

use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::MediaMode;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<SecretString> = Lazy::new(|| {
    SecretString::from(
        env::var("BOT_TOKEN")
            .or_else(|_| env::var("TELOXIDE_TOKEN"))
            .unwrap_or_default(),
    )
});

/// Custom Bot API URL for the primary identity (e.g. a proxy); api.telegram.org when unset
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| non_empty_var("BOT_API_URL"));

/// Bot API URL of the elevated identity, usually a self-hosted Bot API server.
/// The elevated identity exists only when this is set.
pub static ELEVATED_BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| non_empty_var("ELEVATED_BOT_API_URL"));

/// Token for the elevated identity. Falls back to BOT_TOKEN when unset.
pub static ELEVATED_BOT_TOKEN: Lazy<Option<SecretString>> =
    Lazy::new(|| non_empty_var("ELEVATED_BOT_TOKEN").map(SecretString::from));

/// Database file path
/// Default: mediabot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "mediabot.sqlite".to_string()));

/// Log file path
/// Default: mediabot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "mediabot.log".to_string()));

/// Scratch directory for downloads, cuts, merges and templates.
/// Supports tilde (~) expansion.
pub static TEMP_FILES_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("TEMP_FILES_DIR").unwrap_or_else(|_| "./downloads".to_string());
    PathBuf::from(shellexpand::tilde(&raw).to_string())
});

/// Health server port
/// Default: 8080
pub static PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
});

/// Metadata text stamped into containers for users who never set one
pub static DEFAULT_METADATA_TEXT: Lazy<String> =
    Lazy::new(|| env::var("DEFAULT_METADATA_TEXT").unwrap_or_else(|_| "Telegram : @mediabot".to_string()));

/// Mode of users who never picked one. Unknown values fall back to rename.
pub static DEFAULT_MEDIA_MODE: Lazy<MediaMode> =
    Lazy::new(|| parse_default_mode(non_empty_var("DEFAULT_MEDIA_MODE").as_deref()));

pub fn parse_default_mode(raw: Option<&str>) -> MediaMode {
    raw.map(MediaMode::from_stored).unwrap_or_default()
}

/// Reference video whose first frame is the intro card searched by auto-trim
pub static INTRO_TITLE_VIDEO: Lazy<String> =
    Lazy::new(|| env::var("INTRO_TITLE_VIDEO").unwrap_or_else(|_| "https://envs.sh/3G7.mp4".to_string()));

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Upload/download size ceilings per actor
pub mod limits {
    use super::{env, Lazy};

    pub const GIB: u64 = 1024 * 1024 * 1024;

    /// Size ceiling of the primary identity (bytes)
    pub static PRIMARY_MAX_FILE_SIZE: Lazy<u64> = Lazy::new(|| {
        env::var("PRIMARY_MAX_FILE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2 * GIB)
    });

    /// Size ceiling of the elevated identity (bytes)
    pub static ELEVATED_MAX_FILE_SIZE: Lazy<u64> = Lazy::new(|| {
        env::var("ELEVATED_MAX_FILE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4 * GIB)
    });
}

/// Special-content profile: files whose name starts with the prefix skip mode dispatch
pub mod series {
    use super::{env, Lazy};

    pub static PREFIX: Lazy<String> =
        Lazy::new(|| env::var("SERIES_PREFIX").unwrap_or_else(|_| "Jai Bajarangabali".to_string()));

    pub static CHANNEL: Lazy<i64> = Lazy::new(|| {
        env::var("SERIES_CHANNEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1002987317144)
    });

    pub static THUMBNAIL_URL: Lazy<String> =
        Lazy::new(|| env::var("SERIES_THUMB").unwrap_or_else(|_| "https://envs.sh/zcf.jpg".to_string()));

    pub static TITLE: Lazy<String> = Lazy::new(|| env::var("SERIES_TITLE").unwrap_or_else(|_| PREFIX.clone()));
}

/// Interactive prompt timeouts
pub mod prompts {
    use super::Duration;

    pub const RENAME_TIMEOUT_SECS: u64 = 60;
    pub const TRIM_FILE_TIMEOUT_SECS: u64 = 120;
    pub const TRIM_LINK_TIMEOUT_SECS: u64 = 60;

    /// Token that aborts a job waiting for a reply
    pub const CANCEL_TOKEN: &str = "/cancel";

    pub fn rename_timeout() -> Duration {
        Duration::from_secs(RENAME_TIMEOUT_SECS)
    }

    pub fn trim_file_timeout() -> Duration {
        Duration::from_secs(TRIM_FILE_TIMEOUT_SECS)
    }

    pub fn trim_link_timeout() -> Duration {
        Duration::from_secs(TRIM_LINK_TIMEOUT_SECS)
    }
}

/// External tool timeouts
pub mod tool {
    use super::Duration;

    /// Metadata tagging copies every stream, bounded separately
    pub const METADATA_TIMEOUT_SECS: u64 = 300;

    /// Stream-copy operations (cut, remux, demux)
    pub const COPY_TIMEOUT_SECS: u64 = 30 * 60;

    /// Re-encoding operations (compress, re-encode concat)
    pub const TRANSCODE_TIMEOUT_SECS: u64 = 3 * 60 * 60;

    pub fn metadata_timeout() -> Duration {
        Duration::from_secs(METADATA_TIMEOUT_SECS)
    }

    pub fn copy_timeout() -> Duration {
        Duration::from_secs(COPY_TIMEOUT_SECS)
    }

    pub fn transcode_timeout() -> Duration {
        Duration::from_secs(TRANSCODE_TIMEOUT_SECS)
    }

    /// Max characters of tool stderr shown to a user
    pub const STDERR_EXCERPT_CHARS: usize = 200;
}

/// In-flight de-duplication
pub mod dedup {
    use super::Duration;

    pub const WINDOW_SECS: u64 = 10;

    pub fn window() -> Duration {
        Duration::from_secs(WINDOW_SECS)
    }
}

/// Auto-trim detection parameters
pub mod autotrim {
    /// Grayscale analysis frame size
    pub const FRAME_WIDTH: u32 = 160;
    pub const FRAME_HEIGHT: u32 = 90;

    /// Frames sampled per second of video
    pub const SCAN_FPS: f64 = 5.0;

    /// Minimum normalized correlation counted as an intro hit
    pub const MATCH_THRESHOLD: f64 = 0.70;

    /// Seconds of video that must pass between two hits
    pub const DEBOUNCE_SECS: f64 = 3.0;

    pub const MIN_HITS: usize = 2;

    /// A kept segment stops this long before the next intro card
    pub const END_MARGIN_SECS: f64 = 0.5;

    /// A kept segment starts this long after an intro card
    pub const INTRO_SKIP_SECS: f64 = 5.0;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// HTTP request timeout (large media files)
    pub const TIMEOUT_SECS: u64 = 600;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Pending inline choices (extract, compress, auto-trim buttons)
pub mod pending {
    use super::Duration;

    pub const TTL_SECS: u64 = 15 * 60;
    pub const MAX_ENTRIES: u64 = 10_000;

    pub fn ttl() -> Duration {
        Duration::from_secs(TTL_SECS)
    }
}
