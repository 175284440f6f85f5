//! Audio codecs and bitrate re-encoding via FFmpeg

use super::{ConversionError, ConversionResult};
use crate::core::process::{run_to_completion, tail_lines};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Audio codecs an artifact can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AudioCodec {
    Mp3,
    M4a,
    Opus,
    Ogg,
    Aac,
    Flac,
    Wav,
}

impl AudioCodec {
    /// Parse from file extension string.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "m4a" => Some(Self::M4a),
            "opus" => Some(Self::Opus),
            "ogg" | "oga" => Some(Self::Ogg),
            "aac" => Some(Self::Aac),
            "flac" => Some(Self::Flac),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    /// Codec of a file, judged by its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the file extension for this codec.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Ogg => "ogg",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// Get the FFmpeg encoder name.
    fn encoder(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::M4a | Self::Aac => "aac",
            Self::Opus => "libopus",
            Self::Ogg => "libvorbis",
            Self::Flac => "flac",
            Self::Wav => "pcm_s16le",
        }
    }

    /// Whether a target bitrate means anything for this codec.
    pub fn supports_bitrate(&self) -> bool {
        !matches!(self, Self::Flac | Self::Wav)
    }
}

/// Re-encodes an audio file at a given bitrate.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn reencode(
        &self,
        input: &Path,
        output: &Path,
        codec: AudioCodec,
        bitrate_kbps: u32,
    ) -> ConversionResult<()>;
}

/// [`Transcoder`] backed by the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_bin: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    fn command(&self, input: &Path, output: &Path, codec: AudioCodec, bitrate_kbps: u32) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-map_metadata")
            .arg("0")
            .arg("-acodec")
            .arg(codec.encoder());

        if codec.supports_bitrate() {
            cmd.arg("-b:a").arg(format!("{}k", bitrate_kbps));
        }

        if matches!(codec, AudioCodec::M4a) {
            cmd.arg("-f").arg("ipod");
        }

        cmd.arg(output);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn reencode(
        &self,
        input: &Path,
        output: &Path,
        codec: AudioCodec,
        bitrate_kbps: u32,
    ) -> ConversionResult<()> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(ConversionError::InputNotFound(input.display().to_string()));
        }

        log::info!(
            "Re-encoding {} -> {} ({} @ {} kbps)",
            input.display(),
            output.display(),
            codec,
            bitrate_kbps
        );

        let mut cmd = self.command(input, output, codec, bitrate_kbps);
        let result = run_to_completion(&mut cmd).await?;

        if !result.status.success() {
            let stderr = tail_lines(&result.stderr, 5);
            log::error!("FFmpeg re-encode error: {}", stderr);
            return Err(ConversionError::FfmpegError(stderr));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(ConversionError::OutputFailed(output.display().to_string()));
        }

        Ok(())
    }
}
