//! yt-dlp failure analysis
//!
//! Classifies yt-dlp stderr into a failure type so the worker knows
//! whether a bounded retry makes sense.

use crate::download::error::ProviderError;

/// yt-dlp failure types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// Timeouts, resets, DNS, HTTP 429 / 5xx
    NetworkError,
    /// YouTube wants cookies or flagged the request as automated
    BotDetection,
    /// Private, removed, region locked, or no stream at all
    VideoUnavailable,
    /// FFmpeg / post-processor failure
    PostprocessError,
    /// Anything else
    Unknown,
}

/// Analyzes yt-dlp stderr and determines the failure type
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    // Post-processing first: ffmpeg errors often mention the file or the network path
    if stderr_lower.contains("postprocessing")
        || stderr_lower.contains("audio conversion failed")
        || stderr_lower.contains("ffmpeg not found")
        || stderr_lower.contains("ffprobe not found")
        || stderr_lower.contains("ffmpegextractaudio")
    {
        return YtDlpErrorType::PostprocessError;
    }

    if stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("cookies are no longer valid")
        || stderr_lower.contains("use --cookies")
        || stderr_lower.contains("http error 403")
    {
        return YtDlpErrorType::BotDetection;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
        || stderr_lower.contains("not available in your country")
        || stderr_lower.contains("requested format is not available")
        || stderr_lower.contains("no video formats found")
        || stderr_lower.contains("unsupported url")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("socket")
        || stderr_lower.contains("name resolution")
        || stderr_lower.contains("dns")
        || stderr_lower.contains("http error 429")
        || stderr_lower.contains("too many requests")
        || stderr_lower.contains("http error 5")
        || stderr_lower.contains("incomplete read")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Builds the provider error for a failed yt-dlp run.
pub fn provider_error_from_stderr(stderr: &str) -> ProviderError {
    let detail = last_error_line(stderr);
    match analyze_ytdlp_error(stderr) {
        YtDlpErrorType::NetworkError => ProviderError::Network(detail),
        YtDlpErrorType::PostprocessError => ProviderError::Postprocess(detail),
        YtDlpErrorType::BotDetection | YtDlpErrorType::VideoUnavailable => ProviderError::Unavailable(detail),
        YtDlpErrorType::Unknown => ProviderError::Process(detail),
    }
}

/// The most useful single line of yt-dlp stderr (the last `ERROR:` line, if any).
pub fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "yt-dlp exited without output".to_string())
}
