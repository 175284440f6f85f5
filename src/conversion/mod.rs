//! Audio re-encoding.
//!
//! The provider already delivers audio in the target codec; this module
//! only comes into play when an artifact is too large for the chat
//! platform and has to be re-encoded at a lower bitrate.

pub mod audio;

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during conversion
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Output creation failed: {0}")]
    OutputFailed(String),

    #[error(transparent)]
    Process(#[from] crate::core::process::ProcessError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type ConversionResult<T> = Result<T, ConversionError>;

/// Check if ffmpeg is available
pub async fn check_ffmpeg(ffmpeg_bin: &str) -> bool {
    tokio::process::Command::new(ffmpeg_bin)
        .arg("-version")
        .kill_on_drop(true)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get file size in bytes
pub async fn get_file_size<P: AsRef<Path>>(path: P) -> ConversionResult<u64> {
    let metadata = fs_err::tokio::metadata(path.as_ref()).await?;
    Ok(metadata.len())
}
