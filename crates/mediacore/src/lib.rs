//! Mediacore - the media job pipeline behind the bot.
//!
//! Users send video/audio files; depending on their selected mode the pipeline
//! renames, trims, compresses, extracts/removes streams, merges or auto-trims
//! them with ffmpeg and delivers the result back through a [`transport::Transport`].
//!
//! # Modules
//!
//! - [`core`] - configuration, errors, logging, metrics, retry, process helpers, health server
//! - [`naming`] - filename computation (templates, word rules, prefix/suffix, sanitizing)
//! - [`media`] - media kinds, quality catalog, ffmpeg invocation builders and the tool runner
//! - [`storage`] - per-user settings store (SQLite)
//! - [`transport`] - messaging transport seam
//! - [`pipeline`] - dispatcher, in-flight guard, actor selection and every job

pub mod core;
pub mod media;
pub mod naming;
pub mod pipeline;
pub mod storage;
pub mod transport;

pub use crate::core::error::{AppError, AppResult};
pub use crate::pipeline::{JobOutcome, JobRequest, Pipeline, PipelineSettings};
