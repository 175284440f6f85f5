//! tunefetch - Telegram bot that answers a song name with an MP3
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, retry and shared types
//! - `conversion`: ffmpeg re-encoding
//! - `download`: resolve, fetch, size gate and the request pipeline
//! - `telegram`: bot commands, handlers and the chat transport

pub mod cli;
pub mod conversion;
pub mod core;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, Config, PipelineError};
pub use download::{Pipeline, PipelineSettings};
