//! Mediabot - Telegram front end of the media job pipeline.
//!
//! The pipeline itself lives in `mediacore`; this crate adapts it to the Bot
//! API: a [`telegram::TelegramTransport`] for one or two bot identities, the
//! dptree handler schema, the command set and the CLI.

pub mod cli;
pub mod telegram;
