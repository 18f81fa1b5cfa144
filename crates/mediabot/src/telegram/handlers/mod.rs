//! Update handlers: commands, prompt replies, media uploads and button presses

mod callbacks;
pub mod commands;
mod media;
mod schema;
mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
