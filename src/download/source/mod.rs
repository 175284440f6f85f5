//! Media provider abstraction.
//!
//! The `MediaProvider` trait is the seam between the pipeline and whatever
//! actually searches for and downloads audio. The built-in backend is
//! `YtDlpSource`; tests plug in scripted providers.

pub mod ytdlp;

use crate::conversion::audio::AudioCodec;
use crate::core::types::MediaCandidate;
use crate::download::error::ProviderError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Request parameters for a fetch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Page URL of the selected candidate
    pub source_url: String,
    /// Directory the provider writes into; the file name is the provider's choice
    pub output_dir: PathBuf,
    /// Target codec of the extracted audio
    pub codec: AudioCodec,
    /// Target audio bitrate in kbps
    pub bitrate_kbps: u32,
}

/// Searches a catalogue and downloads audio for a chosen result.
///
/// Implementations must not select among candidates: they return results
/// in provider order and leave the policy to the resolver.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Human-readable name of this provider (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Up to `limit` candidates for a free-text query, in provider order.
    /// Malformed entries are dropped rather than failing the whole search.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>, ProviderError>;

    /// Download and extract audio into `request.output_dir`.
    async fn fetch_audio(&self, request: &FetchRequest) -> Result<(), ProviderError>;
}
