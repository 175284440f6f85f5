//! The outbound chat surface the pipeline talks to.
//!
//! `TelegramTransport` (in `telegram::transport`) is the production
//! implementation; `DirectoryTransport` backs the `fetch` CLI command.

use crate::core::types::{Artifact, MediaCandidate};
use crate::core::utils::{escape_filename, truncate_chars};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Telegram caps audio captions at 1024 characters.
const MAX_CAPTION_CHARS: usize = 1024;

/// Id of a message the transport can later edit or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusHandle(pub i64);

/// Everything the transport needs to upload one audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAttachment {
    pub path: PathBuf,
    pub file_name: String,
    pub title: String,
    pub performer: Option<String>,
    pub caption: String,
    pub duration_secs: Option<u32>,
    pub size_bytes: u64,
}

impl AudioAttachment {
    /// Builds the attachment for a delivered artifact.
    ///
    /// The caption is `🎶 <title>` plus a `🎤 <performer>` line when the
    /// provider named one.
    pub fn for_artifact(artifact: &Artifact, candidate: &MediaCandidate) -> Self {
        let performer = candidate.performer().map(str::to_string);
        let caption = match &performer {
            Some(p) => format!("🎶 {}\n🎤 {}", candidate.title, p),
            None => format!("🎶 {}", candidate.title),
        };
        Self {
            path: artifact.local_path.clone(),
            file_name: format!("{}.{}", escape_filename(&candidate.title), artifact.codec.extension()),
            title: candidate.title.clone(),
            performer,
            caption: truncate_chars(&caption, MAX_CAPTION_CHARS),
            duration_secs: candidate.duration_seconds.and_then(|d| u32::try_from(d).ok()),
            size_bytes: artifact.size_bytes,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform refused the request (too large, chat gone, bad request)
    #[error("rejected by chat platform: {0}")]
    Rejected(String),

    /// The platform could not be reached, after retries
    #[error("chat platform unreachable: {0}")]
    Network(String),

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound operations on one conversation.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<StatusHandle, TransportError>;

    async fn edit_text(&self, handle: StatusHandle, text: &str) -> Result<(), TransportError>;

    async fn delete(&self, handle: StatusHandle) -> Result<(), TransportError>;

    async fn send_audio(&self, audio: &AudioAttachment) -> Result<(), TransportError>;
}

/// Writes delivered audio into a local directory and prints status text.
#[derive(Debug)]
pub struct DirectoryTransport {
    output_dir: PathBuf,
    next_id: AtomicI64,
}

impl DirectoryTransport {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn saved_path(&self, audio: &AudioAttachment) -> PathBuf {
        self.output_dir.join(&audio.file_name)
    }
}

#[async_trait]
impl ChatTransport for DirectoryTransport {
    async fn send_text(&self, text: &str) -> Result<StatusHandle, TransportError> {
        println!("{}", text);
        Ok(StatusHandle(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_text(&self, _handle: StatusHandle, text: &str) -> Result<(), TransportError> {
        println!("{}", text);
        Ok(())
    }

    async fn delete(&self, _handle: StatusHandle) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_audio(&self, audio: &AudioAttachment) -> Result<(), TransportError> {
        fs_err::tokio::create_dir_all(&self.output_dir).await?;
        let target = self.saved_path(audio);
        fs_err::tokio::copy(&audio.path, &target).await?;
        println!("{}", audio.caption);
        println!("✅ Saved {} ({} bytes)", target.display(), audio.size_bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::audio::AudioCodec;
    use serde_json::json;

    fn candidate(meta: serde_json::Value) -> MediaCandidate {
        MediaCandidate {
            title: "Şımarık / Remix".to_string(),
            source_url: "https://www.youtube.com/watch?v=x".to_string(),
            duration_seconds: Some(238),
            raw_provider_metadata: meta.as_object().cloned().unwrap_or_default(),
        }
    }

    fn artifact(path: PathBuf) -> Artifact {
        Artifact {
            local_path: path,
            size_bytes: 4,
            codec: AudioCodec::Mp3,
            bitrate_kbps: 192,
        }
    }

    #[test]
    fn test_attachment_caption_and_name() {
        let audio = AudioAttachment::for_artifact(
            &artifact(PathBuf::from("/tmp/a.mp3")),
            &candidate(json!({"artist": "Tarkan"})),
        );
        assert_eq!(audio.caption, "🎶 Şımarık / Remix\n🎤 Tarkan");
        assert_eq!(audio.file_name, "Şımarık _ Remix.mp3");
        assert_eq!(audio.performer.as_deref(), Some("Tarkan"));
        assert_eq!(audio.duration_secs, Some(238));
    }

    #[test]
    fn test_attachment_without_performer() {
        let audio = AudioAttachment::for_artifact(&artifact(PathBuf::from("/tmp/a.mp3")), &candidate(json!({})));
        assert_eq!(audio.caption, "🎶 Şımarık / Remix");
        assert_eq!(audio.performer, None);
    }

    #[tokio::test]
    async fn test_directory_transport_copies_file() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let file = src.path().join("abc.mp3");
        std::fs::write(&file, b"data").unwrap();

        let transport = DirectoryTransport::new(out.path());
        let audio = AudioAttachment::for_artifact(&artifact(file), &candidate(json!({})));
        let first = transport.send_text("hello").await.unwrap();
        let second = transport.send_text("again").await.unwrap();
        assert_ne!(first, second);

        transport.send_audio(&audio).await.unwrap();
        assert_eq!(std::fs::read(transport.saved_path(&audio)).unwrap(), b"data");
    }
}
