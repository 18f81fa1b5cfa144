//! Command handlers.
//!
//! Settings commands are answered by [`settings_reply`], which only touches the
//! settings store. Commands that start jobs are handed to the pipeline on a
//! separate task, because jobs wait for replies that the dispatcher would
//! otherwise queue behind the running handler.

use indoc::formatdoc;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};

use mediacore::media::{human_bytes, quality};
use mediacore::storage::{
    MediaMode, MediaPreference, SettingsStore, UserId, UserPreferences,
    settings::{merge_remove_words, merge_replace_words},
};
use mediacore::transport::{ChatRef, Transport};
use mediacore::{AppResult, Pipeline};
use mediacore::core::config;

use super::types::{HandlerDeps, HandlerError, chat_of, sender_id};
use crate::telegram::bot::{Command, is_clear_keyword, split_args};

fn or_none(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("None")
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "✅ Enabled" } else { "❌ Disabled" }
}

/// Help text with the user's current settings
pub fn help_text(prefs: &UserPreferences, elevated: bool) -> String {
    let cap = if elevated {
        *config::limits::ELEVATED_MAX_FILE_SIZE
    } else {
        *config::limits::PRIMARY_MAX_FILE_SIZE
    };
    let qualities = if prefs.compression_qualities.is_empty() {
        "Ask every time".to_string()
    } else {
        prefs.compression_qualities.join(", ")
    };

    formatdoc! {"
        👋 Send me a video, audio or document and I'll process it in your current mode.

        ⚙️ Your settings
        ├ Mode: {mode}
        ├ Rename template: {template}
        ├ Upload type: {preference}
        ├ Channel: {channel}
        ├ Caption: {caption}
        ├ Thumbnail: {thumb}
        ├ Metadata: {metadata}
        ├ Removal words: {removals}
        ├ Replacements: {replacements}
        ├ Compression: {qualities}
        └ Max file size: {cap}

        📝 Naming: /autorename /remove /replace /prefix /suffix /viewwords /clearwords /resetall
        🎬 Modes: /media rename|trim|extract|merge|compress|autotrim
        📤 Output: /setmedia /setchannel /viewchannel /delchannel /setcaption /metadata
        🖼 Thumbnail: send a photo, /viewthumb /delthumb
        ✂️ Jobs: /trim <url> /merge /compress /autotrim <url> /autotrimstatus /autotrimcancel

        Send {cancel} while I'm waiting for an answer to abort.",
        mode = prefs.media_mode,
        template = or_none(prefs.format_template.as_deref()),
        preference = prefs.media_preference.map(|p| p.to_string()).unwrap_or_else(|| "Auto".to_string()),
        channel = prefs.upload_channel.map(|c| c.to_string()).unwrap_or_else(|| "This chat".to_string()),
        caption = if prefs.caption.is_some() { "✅ Set" } else { "❌ Not Set" },
        thumb = if prefs.thumbnail.is_some() { "✅ Set" } else { "❌ Not Set" },
        metadata = on_off(prefs.metadata_enabled),
        removals = prefs.remove_words.len(),
        replacements = prefs.replace_words.len(),
        qualities = qualities,
        cap = human_bytes(cap),
        cancel = config::prompts::CANCEL_TOKEN,
    }
}

fn mode_hint(mode: MediaMode) -> &'static str {
    match mode {
        MediaMode::Rename => "Files are renamed with your template and word rules.",
        MediaMode::Trim => "I'll ask for start and end times for each file.",
        MediaMode::Extract => "Pick audio, subtitles or a stream removal for each file.",
        MediaMode::Merge => "Files are queued. Use /merge to combine them.",
        MediaMode::Compress => "Files are re-encoded to your /compress qualities.",
        MediaMode::Autotrim => "Repeated intro cards are cut out of each video.",
    }
}

fn view_words(prefs: &UserPreferences) -> String {
    let removals = if prefs.remove_words.is_empty() {
        "None".to_string()
    } else {
        prefs.remove_words.iter().map(|w| format!("• {}", w)).collect::<Vec<_>>().join("\n")
    };
    let replacements = if prefs.replace_words.is_empty() {
        "None".to_string()
    } else {
        prefs
            .replace_words
            .iter()
            .map(|(old, new)| format!("• {} → {}", old, new))
            .collect::<Vec<_>>()
            .join("\n")
    };
    formatdoc! {"
        📝 Your naming rules

        🗑 Removal words:
        {removals}

        🔄 Replacements:
        {replacements}

        📌 Prefix: {prefix}
        📌 Suffix: {suffix}",
        prefix = or_none(prefs.prefix.as_deref()),
        suffix = or_none(prefs.suffix.as_deref()),
    }
}

/// Answers a settings command. `None` for commands that are not about settings.
pub async fn settings_reply(store: &dyn SettingsStore, user: UserId, cmd: &Command) -> AppResult<Option<String>> {
    let text = match cmd {
        Command::Media(args) => {
            let args = args.trim();
            if args.is_empty() {
                let current = store.get_media_mode(user).await?;
                format!(
                    "🎬 Current mode: {}\n\nUsage: /media <mode>\nModes: {}",
                    current,
                    MediaMode::names().join(", ")
                )
            } else {
                match args.parse::<MediaMode>() {
                    Ok(mode) => {
                        store.set_media_mode(user, mode).await?;
                        format!("✅ Mode set to {}\n\n{}", mode, mode_hint(mode))
                    }
                    Err(_) => format!(
                        "❌ Unknown mode: {}\n\nUsage: /media <mode>\nModes: {}",
                        args,
                        MediaMode::names().join(", ")
                    ),
                }
            }
        }
        Command::Autorename(args) => {
            if args.trim().is_empty() {
                let current = store.get_format_template(user).await?;
                format!(
                    "📝 Current template: {}\n\nUsage: /autorename Show S01E[episode] [quality]\nUse /autorename none to remove it.",
                    or_none(current.as_deref())
                )
            } else if is_clear_keyword(args) {
                store.set_format_template(user, None).await?;
                "✅ Rename template removed.".to_string()
            } else {
                let template = args.trim().to_string();
                store.set_format_template(user, Some(template.clone())).await?;
                format!(
                    "✅ Rename template saved!\n\n{}\n\n[episode] and [quality] are filled from each filename.",
                    template
                )
            }
        }
        Command::Setmedia(args) => {
            let args = args.trim();
            if args.eq_ignore_ascii_case("none") {
                store.set_media_type_preference(user, None).await?;
                "✅ Upload type reset. Files keep their original type.".to_string()
            } else {
                match args.parse::<MediaPreference>() {
                    Ok(preference) => {
                        store.set_media_type_preference(user, Some(preference)).await?;
                        format!("✅ Files will be uploaded as {}.", preference)
                    }
                    Err(_) => "Usage: /setmedia document|video|audio|none".to_string(),
                }
            }
        }
        Command::Remove(args) => {
            if args.trim().is_empty() {
                "🗑 Usage: /remove [Hindi],WEB-DL,x264\n\nSeparate multiple words with commas.".to_string()
            } else {
                let existing = store.get_remove_words(user).await?;
                let merged = merge_remove_words(&existing, args);
                let added = merged.len() - existing.len();
                store.set_remove_words(user, merged.clone()).await?;
                if added == 0 {
                    "⚠️ All words are already in your removal list.\n\nUse /viewwords to see it.".to_string()
                } else {
                    format!(
                        "✅ {} word(s) added to your removal list.\n\nTotal words: {}",
                        added,
                        merged.len()
                    )
                }
            }
        }
        Command::Replace(args) => {
            if args.trim().is_empty() {
                "🔄 Usage: /replace S01:Season 1,EP:Episode\n\nFormat: old:new,old2:new2".to_string()
            } else {
                let existing = store.get_replace_words(user).await?;
                let (pairs, invalid) = merge_replace_words(&existing, args);
                let total = pairs.len();
                store.set_replace_words(user, pairs).await?;
                let mut text = format!("✅ Replacements saved.\n\nTotal pairs: {}", total);
                if !invalid.is_empty() {
                    text.push_str(&format!("\n\n⚠️ Skipped invalid pairs: {}", invalid.join(", ")));
                }
                text
            }
        }
        Command::Prefix(args) => affix_reply(store, user, args, Affix::Prefix).await?,
        Command::Suffix(args) => affix_reply(store, user, args, Affix::Suffix).await?,
        Command::Viewwords => view_words(&store.get_preferences(user).await?),
        Command::Clearwords => {
            store.clear_word_rules(user).await?;
            "✅ All removal words and replacements cleared.".to_string()
        }
        Command::Resetall => {
            store.reset_naming_rules(user).await?;
            "✅ Removal words, replacements, prefix and suffix cleared.".to_string()
        }
        Command::Viewchannel => match store.get_upload_channel(user).await? {
            Some(channel) => format!("📢 Uploads go to channel {}\n\nUse /delchannel to upload here again.", channel),
            None => "📢 No channel set. Files are sent back to this chat.".to_string(),
        },
        Command::Delchannel => {
            store.delete_upload_channel(user).await?;
            "✅ Channel removed. Files are sent back to this chat.".to_string()
        }
        Command::Setcaption(args) => {
            if args.trim().is_empty() {
                let current = store.get_caption(user).await?;
                format!(
                    "✏️ Current caption: {}\n\nUsage: /setcaption {{filename}} | {{filesize}} | {{duration}}\nUse /setcaption none to remove it.",
                    or_none(current.as_deref())
                )
            } else if is_clear_keyword(args) {
                store.set_caption(user, None).await?;
                "✅ Caption removed. The filename is used instead.".to_string()
            } else {
                store.set_caption(user, Some(args.trim().to_string())).await?;
                "✅ Caption saved.".to_string()
            }
        }
        Command::Metadata(args) => {
            let args = args.trim();
            if args.is_empty() {
                let prefs = store.get_preferences(user).await?;
                format!(
                    "📋 Metadata: {}\nText: {}\n\nUsage: /metadata on|off|<text>",
                    on_off(prefs.metadata_enabled),
                    prefs.metadata_text
                )
            } else if args.eq_ignore_ascii_case("on") {
                store.set_metadata_enabled(user, true).await?;
                "✅ Metadata tagging enabled.".to_string()
            } else if args.eq_ignore_ascii_case("off") {
                store.set_metadata_enabled(user, false).await?;
                "✅ Metadata tagging disabled.".to_string()
            } else {
                store.set_metadata_text(user, args.to_string()).await?;
                store.set_metadata_enabled(user, true).await?;
                format!("✅ Metadata text set to: {}", args)
            }
        }
        Command::Delthumb => {
            store.set_thumbnail(user, None).await?;
            "✅ Thumbnail deleted.".to_string()
        }
        Command::Compress(args) => {
            let args = args.trim();
            if args.is_empty() {
                let current = store.get_compression_qualities(user).await?;
                format!(
                    "🗜 Compression qualities: {}\n\nUsage: /compress 720p,480p | all | none\nAvailable: {}",
                    if current.is_empty() { "ask every time".to_string() } else { current.join(", ") },
                    quality::all_labels().join(", ")
                )
            } else if is_clear_keyword(args) {
                store.set_compression_qualities(user, Vec::new()).await?;
                "✅ Compression qualities cleared. I'll ask for each file.".to_string()
            } else {
                match quality::parse_list(args) {
                    Ok(labels) => {
                        let text = format!("✅ Compression qualities: {}", labels.join(", "));
                        store.set_compression_qualities(user, labels).await?;
                        text
                    }
                    Err(invalid) => format!(
                        "❌ Unknown qualities: {}\n\nAvailable: {}",
                        invalid.join(", "),
                        quality::all_labels().join(", ")
                    ),
                }
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(text))
}

#[derive(Clone, Copy)]
enum Affix {
    Prefix,
    Suffix,
}

async fn affix_reply(store: &dyn SettingsStore, user: UserId, args: &str, affix: Affix) -> AppResult<String> {
    let (label, command) = match affix {
        Affix::Prefix => ("Prefix", "/prefix"),
        Affix::Suffix => ("Suffix", "/suffix"),
    };

    if args.trim().is_empty() {
        let current = match affix {
            Affix::Prefix => store.get_prefix(user).await?,
            Affix::Suffix => store.get_suffix(user).await?,
        };
        return Ok(format!(
            "📌 Current {}: {}\n\nUsage: {} <text>\nUse {} none to remove it.",
            label.to_lowercase(),
            or_none(current.as_deref()),
            command,
            command
        ));
    }

    let value = (!is_clear_keyword(args)).then(|| args.trim().to_string());
    let text = match &value {
        Some(v) => format!("✅ {} set: {}", label, v),
        None => format!("✅ {} removed.", label),
    };
    match affix {
        Affix::Prefix => store.set_prefix(user, value).await?,
        Affix::Suffix => store.set_suffix(user, value).await?,
    }
    Ok(text)
}

/// `/setchannel <id>`: stores the channel only when the bot administers it
pub async fn set_channel_reply(
    transport: &dyn Transport,
    store: &dyn SettingsStore,
    user: UserId,
    args: &str,
) -> AppResult<String> {
    let Some(channel) = split_args(args, 1).first().and_then(|raw| raw.parse::<i64>().ok()) else {
        return Ok("📢 Usage: /setchannel -1001234567890\n\nAdd me to the channel as admin first.".to_string());
    };

    match transport.channel_title_if_admin(ChatRef(channel)).await? {
        Some(title) => {
            store.set_upload_channel(user, channel).await?;
            Ok(format!("✅ Uploads will go to {} ({}).", title, channel))
        }
        None => Ok(format!(
            "❌ I'm not an admin in {}.\n\nAdd me as admin with permission to post, then try again.",
            channel
        )),
    }
}

async fn send_help(bot: &Bot, msg: &Message, deps: &HandlerDeps, user: UserId) -> Result<(), HandlerError> {
    let prefs = deps.store().get_preferences(user).await?;
    let text = help_text(&prefs, deps.pipeline.transport().has_elevated());
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn view_thumb(bot: &Bot, msg: &Message, deps: &HandlerDeps, user: UserId) -> Result<(), HandlerError> {
    match deps.store().get_thumbnail(user).await? {
        Some(file_id) => {
            bot.send_photo(msg.chat.id, InputFile::file_id(FileId(file_id)))
                .caption("🖼 Your thumbnail")
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "🖼 No thumbnail set. Send me a photo to set one.")
                .await?;
        }
    }
    Ok(())
}

fn spawn_job<F>(label: &'static str, job: F)
where
    F: std::future::Future<Output = mediacore::JobOutcome> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = job.await;
        log::info!("{} finished: {}", label, outcome.label());
    });
}

fn start_trim(pipeline: Pipeline, user: UserId, chat: ChatRef, url: String) {
    spawn_job("Link trim", async move { pipeline.trim_link(user, chat, &url).await });
}

fn start_autotrim(pipeline: Pipeline, user: UserId, chat: ChatRef, video: String, intro: Option<String>) {
    spawn_job("Link auto-trim", async move {
        pipeline.autotrim_link(user, chat, &video, intro.as_deref()).await
    });
}

/// Entry point for every parsed command
pub async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(user) = sender_id(msg) else {
        return Ok(());
    };
    let chat = chat_of(msg);
    let pipeline = &deps.pipeline;

    match &cmd {
        Command::Start | Command::Help => send_help(bot, msg, deps, user).await?,
        Command::Viewthumb => view_thumb(bot, msg, deps, user).await?,
        Command::Setchannel(args) => {
            let text = set_channel_reply(pipeline.transport().as_ref(), deps.store().as_ref(), user, args).await?;
            bot.send_message(msg.chat.id, text).await?;
        }
        Command::Trim(args) => match split_args(args, 1).first() {
            Some(url) => start_trim(pipeline.clone(), user, chat, url.to_string()),
            None => {
                bot.send_message(msg.chat.id, "✂️ Usage: /trim <direct video link>\n\nOr switch to /media trim and send a file.")
                    .await?;
            }
        },
        Command::Merge => {
            pipeline.show_merge_queue(user, chat).await;
        }
        Command::Autotrim(args) => match split_args(args, 2).as_slice() {
            [video] => start_autotrim(pipeline.clone(), user, chat, video.to_string(), None),
            [video, intro] => start_autotrim(pipeline.clone(), user, chat, video.to_string(), Some(intro.to_string())),
            _ => {
                bot.send_message(
                    msg.chat.id,
                    "🎬 Usage: /autotrim <video_url> [intro_url]\n\nOr switch to /media autotrim and send a file.",
                )
                .await?;
            }
        },
        Command::Autotrimstatus => {
            pipeline.autotrim_status(user, chat).await;
        }
        Command::Autotrimcancel => {
            pipeline.autotrim_cancel(user, chat).await;
        }
        settings => {
            if let Some(text) = settings_reply(deps.store().as_ref(), user, settings).await? {
                bot.send_message(msg.chat.id, text).await?;
            }
        }
    }
    Ok(())
}
