//! Telegram bot integration and handlers

pub mod bot;
pub mod files;
pub mod handlers;
pub mod replies;
pub mod transport;

pub use teloxide::Bot;

pub use bot::{Command, create_bot, create_elevated_bot, setup_bot_commands};
pub use handlers::{HandlerDeps, HandlerError, schema};
pub use replies::PendingReplies;
pub use transport::TelegramTransport;
