//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective runtime configuration at startup (never the tokens)
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Media bot configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("📂 Scratch dir: {}", config::TEMP_FILES_DIR.display());
    log::info!("🗄  Database: {}", *config::DATABASE_PATH);
    log::info!(
        "📦 Size caps: primary {} / elevated {}",
        crate::media::human_bytes(*config::limits::PRIMARY_MAX_FILE_SIZE),
        crate::media::human_bytes(*config::limits::ELEVATED_MAX_FILE_SIZE)
    );
    match config::ELEVATED_BOT_API_URL.as_deref() {
        Some(url) => log::info!("🚀 Elevated identity: {}", url),
        None => log::warn!("⚠️  No elevated identity configured, primary size cap applies to every job"),
    }
    log::info!("🎬 Series prefix: \"{}\" → channel {}", *config::series::PREFIX, *config::series::CHANNEL);
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::NamedTempFile;

    #[test]
    fn test_init_logger_accepts_writable_path() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        // A logger may already be installed by another test in this process,
        // so only the file creation part is guaranteed.
        let _ = init_logger(path);
        assert!(temp_file.path().exists());
    }

    #[test]
    fn test_init_logger_rejects_missing_directory() {
        let result = init_logger("/definitely/not/a/dir/mediabot.log");
        assert!(result.is_err());
    }
}
