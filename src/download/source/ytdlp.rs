//! YtDlpSource: searches YouTube and extracts audio through the yt-dlp binary.
//!
//! Search runs `yt-dlp --flat-playlist --dump-single-json "ytsearchN:<query>"`
//! and parses the JSON; fetch runs yt-dlp with `-x --audio-format` so the
//! file lands in the scratch directory already transcoded.

use crate::core::process::{run_to_completion, run_with_timeout, tail_lines};
use crate::core::types::MediaCandidate;
use crate::download::error::ProviderError;
use crate::download::source::{FetchRequest, MediaProvider};
use crate::download::ytdlp_errors::provider_error_from_stderr;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Output template: one file per video id inside the scratch directory.
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Provider powered by yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    ytdl_bin: String,
    ffmpeg_bin: Option<String>,
    cookies_file: Option<PathBuf>,
}

impl YtDlpSource {
    pub fn new(ytdl_bin: impl Into<String>) -> Self {
        Self {
            ytdl_bin: ytdl_bin.into(),
            ffmpeg_bin: None,
            cookies_file: None,
        }
    }

    /// Points yt-dlp at a specific ffmpeg binary.
    #[must_use]
    pub fn with_ffmpeg(mut self, ffmpeg_bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = Some(ffmpeg_bin.into());
        self
    }

    /// Netscape-format cookies passed with `--cookies`.
    #[must_use]
    pub fn with_cookies(mut self, cookies_file: Option<PathBuf>) -> Self {
        self.cookies_file = cookies_file;
        self
    }

    /// yt-dlp version string, for the startup log.
    pub async fn version(&self) -> Result<String, ProviderError> {
        let mut cmd = Command::new(&self.ytdl_bin);
        cmd.arg("--version");
        let output = run_with_timeout(&mut cmd, Duration::from_secs(10)).await?;
        if !output.status.success() {
            return Err(ProviderError::Process(tail_lines(&output.stderr, 3)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.ytdl_bin);
        cmd.arg("--ignore-config").arg("--no-warnings");
        if let Some(cookies) = &self.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd
    }

    fn search_command(&self, query: &str, limit: usize) -> Command {
        let mut cmd = self.base_command();
        cmd.arg("--flat-playlist")
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg(format!("ytsearch{}:{}", limit.max(1), query));
        cmd
    }

    fn fetch_command(&self, request: &FetchRequest) -> Command {
        let mut cmd = self.base_command();
        cmd.arg("-f")
            .arg("bestaudio/best")
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-part")
            .arg("-x")
            .arg("--audio-format")
            .arg(request.codec.extension())
            .arg("--audio-quality")
            .arg(format!("{}K", request.bitrate_kbps))
            .arg("-o")
            .arg(request.output_dir.join(OUTPUT_TEMPLATE));
        if let Some(ffmpeg) = &self.ffmpeg_bin {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }
        cmd.arg("--").arg(&request.source_url);
        cmd
    }
}

#[async_trait]
impl MediaProvider for YtDlpSource {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>, ProviderError> {
        log::debug!("yt-dlp search: '{}' (limit {})", query, limit);
        let mut cmd = self.search_command(query, limit);
        let output = run_to_completion(&mut cmd).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("yt-dlp search failed for '{}': {}", query, tail_lines(&output.stderr, 3));
            return Err(provider_error_from_stderr(&stderr));
        }

        let mut candidates = parse_search_results(&output.stdout)?;
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn fetch_audio(&self, request: &FetchRequest) -> Result<(), ProviderError> {
        log::info!(
            "yt-dlp fetch: {} -> {} ({} @ {} kbps)",
            request.source_url,
            request.output_dir.display(),
            request.codec,
            request.bitrate_kbps
        );
        let mut cmd = self.fetch_command(request);
        let output = run_to_completion(&mut cmd).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("yt-dlp fetch failed for {}: {}", request.source_url, tail_lines(&output.stderr, 5));
            return Err(provider_error_from_stderr(&stderr));
        }
        Ok(())
    }
}

/// Parses `--dump-single-json` search output into candidates, provider order kept.
///
/// A playlist object contributes its `entries`; a bare video object counts
/// as a single result. Entries without a usable title or URL are skipped.
pub fn parse_search_results(stdout: &[u8]) -> Result<Vec<MediaCandidate>, ProviderError> {
    let root: Value = serde_json::from_slice(stdout).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let entries = match root.get("entries") {
        Some(Value::Array(entries)) => entries.clone(),
        Some(Value::Null) => Vec::new(),
        Some(other) => {
            return Err(ProviderError::Malformed(format!(
                "'entries' is not a list: {}",
                type_name(other)
            )))
        }
        None if root.get("title").is_some() => vec![root],
        None => Vec::new(),
    };

    let total = entries.len();
    let candidates: Vec<MediaCandidate> = entries.into_iter().filter_map(candidate_from_entry).collect();
    if candidates.len() < total {
        log::debug!("Skipped {} malformed search entries", total - candidates.len());
    }
    Ok(candidates)
}

fn candidate_from_entry(entry: Value) -> Option<MediaCandidate> {
    let Value::Object(meta) = entry else {
        return None;
    };

    let title = meta.get("title").and_then(Value::as_str)?.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let source_url = ["url", "webpage_url"]
        .iter()
        .filter_map(|key| meta.get(*key).and_then(Value::as_str))
        .find(|u| is_http_url(u))
        .map(str::to_string)
        .or_else(|| {
            meta.get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.trim().is_empty())
                .map(|id| format!("{}{}", WATCH_URL_PREFIX, id.trim()))
        })?;

    let duration_seconds = meta
        .get("duration")
        .and_then(Value::as_f64)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d.round() as u64);

    Some(MediaCandidate {
        title,
        source_url,
        duration_seconds,
        raw_provider_metadata: meta,
    })
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
