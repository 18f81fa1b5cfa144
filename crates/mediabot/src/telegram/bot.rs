//! Bot identities and the command set
//!
//! This module contains:
//! - Command enum definition
//! - Primary and elevated bot creation
//! - Command registration in the Telegram UI

use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use mediacore::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "show help and your settings")]
    Start,
    #[command(description = "show help and your settings")]
    Help,
    #[command(description = "show or set the mode: rename, trim, extract, merge, compress, autotrim")]
    Media(String),
    #[command(description = "set a filename template, e.g. Show S01E[episode] [quality], or none")]
    Autorename(String),
    #[command(description = "force the upload type: document, video, audio or none")]
    Setmedia(String),
    #[command(description = "add words to strip from filenames, comma separated")]
    Remove(String),
    #[command(description = "add replacements, old:new,old2:new2")]
    Replace(String),
    #[command(description = "set a filename prefix, or none")]
    Prefix(String),
    #[command(description = "set a filename suffix, or none")]
    Suffix(String),
    #[command(description = "show removal words, replacements, prefix and suffix")]
    Viewwords,
    #[command(description = "clear removal words and replacements")]
    Clearwords,
    #[command(description = "clear every naming rule")]
    Resetall,
    #[command(description = "upload results to a channel where the bot is admin")]
    Setchannel(String),
    #[command(description = "show the upload channel")]
    Viewchannel,
    #[command(description = "upload results back to this chat")]
    Delchannel,
    #[command(description = "set a caption with {filename}, {filesize}, {duration}, or none")]
    Setcaption(String),
    #[command(description = "metadata tagging: on, off, or the tag text")]
    Metadata(String),
    #[command(description = "delete the stored thumbnail")]
    Delthumb,
    #[command(description = "show the stored thumbnail")]
    Viewthumb,
    #[command(description = "compression qualities, e.g. 720p,480p, all or none")]
    Compress(String),
    #[command(description = "trim a video from a direct link")]
    Trim(String),
    #[command(description = "show the merge queue")]
    Merge,
    #[command(description = "cut repeated intros: <video_url> [intro_url]")]
    Autotrim(String),
    #[command(description = "show your auto-trim job")]
    Autotrimstatus,
    #[command(description = "cancel your auto-trim job")]
    Autotrimcancel,
}

fn client() -> anyhow::Result<reqwest::Client> {
    Ok(ClientBuilder::new().timeout(config::network::timeout()).build()?)
}

fn with_api_url(bot: Bot, raw: &str, var: &str) -> anyhow::Result<Bot> {
    let url = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid {}: {}", var, e))?;
    Ok(bot.set_api_url(url))
}

/// Creates the primary Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token or invalid URL
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.expose_secret();
    if token.is_empty() {
        anyhow::bail!("BOT_TOKEN environment variable not set");
    }

    let bot = Bot::with_client(token, client()?);
    match config::BOT_API_URL.as_deref() {
        Some(raw) => {
            log::info!("Using custom Bot API URL: {}", raw);
            with_api_url(bot, raw, "BOT_API_URL")
        }
        None => Ok(bot),
    }
}

/// Creates the elevated identity, if one is configured.
///
/// It talks to its own Bot API server (usually self-hosted, with the larger
/// file limits) and uses `ELEVATED_BOT_TOKEN`, falling back to the primary token.
pub fn create_elevated_bot() -> anyhow::Result<Option<Bot>> {
    let Some(raw) = config::ELEVATED_BOT_API_URL.as_deref() else {
        return Ok(None);
    };

    let token = match config::ELEVATED_BOT_TOKEN.as_ref() {
        Some(token) => token.expose_secret().to_string(),
        None => config::BOT_TOKEN.expose_secret().to_string(),
    };
    if token.is_empty() {
        anyhow::bail!("ELEVATED_BOT_API_URL is set but no token is available");
    }

    log::info!("Using elevated Bot API URL: {}", raw);
    with_api_url(Bot::with_client(token, client()?), raw, "ELEVATED_BOT_API_URL").map(Some)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    let commands: Vec<BotCommand> = Command::bot_commands();
    bot.set_my_commands(commands).await?;
    Ok(())
}

/// Splits a command argument on whitespace into at most `n` parts
pub fn split_args(args: &str, n: usize) -> Vec<&str> {
    args.split_whitespace().take(n).collect()
}

/// `none` (any case) or an empty argument clears a setting
pub fn is_clear_keyword(args: &str) -> bool {
    let args = args.trim();
    args.is_empty() || args.eq_ignore_ascii_case("none")
}
