//! Request pipeline: validate → resolve → fetch → gate → send → cleanup.
//!
//! [`Pipeline::handle`] is the only entry point. It never returns an error:
//! every failure is logged, shown to the user as exactly one message,
//! and reported back as a [`DeliveryOutcome`].

use crate::conversion::audio::{FfmpegTranscoder, Transcoder};
use crate::conversion::check_ffmpeg;
use crate::core::config::Config;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::types::{DeliveryOutcome, MediaCandidate, SongRequest};
use crate::core::utils::format_mib;
use crate::core::validation::validate_query;
use crate::download::gate::{DeliveryGate, GateDecision, OversizePolicy};
use crate::download::resolver::{Resolver, ResolverSettings};
use crate::download::scratch::ScratchDir;
use crate::download::source::ytdlp::YtDlpSource;
use crate::download::source::MediaProvider;
use crate::download::transport::{AudioAttachment, ChatTransport, StatusHandle};
use crate::download::worker::{FetchWorker, WorkerPool, WorkerSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Everything the pipeline needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub scratch_root: PathBuf,
    pub resolver: ResolverSettings,
    pub worker: WorkerSettings,
    pub max_concurrent_jobs: usize,
    pub max_upload_bytes: u64,
    pub oversize_policy: OversizePolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("tunefetch"),
            resolver: ResolverSettings::default(),
            worker: WorkerSettings::default(),
            max_concurrent_jobs: 5,
            max_upload_bytes: crate::download::gate::TELEGRAM_UPLOAD_LIMIT_BYTES,
            oversize_policy: OversizePolicy::Reject,
        }
    }
}

/// Shared by all request tasks; every method takes `&self`.
pub struct Pipeline {
    resolver: Resolver,
    worker: FetchWorker,
    gate: DeliveryGate,
    scratch_root: PathBuf,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn MediaProvider>, transcoder: Arc<dyn Transcoder>, settings: PipelineSettings) -> Self {
        let pool = WorkerPool::new(settings.max_concurrent_jobs);
        Self {
            resolver: Resolver::new(Arc::clone(&provider), settings.resolver),
            worker: FetchWorker::new(provider, transcoder, pool, settings.worker),
            gate: DeliveryGate::new(settings.max_upload_bytes, settings.oversize_policy),
            scratch_root: settings.scratch_root,
        }
    }

    /// Production wiring: yt-dlp for search and fetch, ffmpeg for re-encoding.
    ///
    /// Missing binaries are only warned about; requests fail with a
    /// download error until they are installed.
    pub async fn from_config(config: &Config) -> Self {
        let source = YtDlpSource::new(config.ytdl_bin.clone())
            .with_ffmpeg(config.ffmpeg_bin.clone())
            .with_cookies(config.existing_cookies_path());
        match source.version().await {
            Ok(version) => log::info!("yt-dlp version: {}", version),
            Err(e) => log::warn!("⚠️  {} is not usable: {}", config.ytdl_bin, e),
        }
        if !check_ffmpeg(&config.ffmpeg_bin).await {
            log::warn!("⚠️  {} not found, audio extraction will fail", config.ffmpeg_bin);
        }

        let transcoder = FfmpegTranscoder::new(config.ffmpeg_bin.clone());
        Self::new(Arc::new(source), Arc::new(transcoder), config.pipeline_settings())
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn pool(&self) -> &WorkerPool {
        self.worker.pool()
    }

    /// Runs one request to completion and reports its single outcome.
    pub async fn handle(&self, request: &SongRequest, transport: &dyn ChatTransport) -> DeliveryOutcome {
        let started = Instant::now();

        let query = match validate_query(&request.raw_query) {
            Ok(query) => query,
            Err(e) => {
                let err = PipelineError::from(e);
                log::info!("Empty song request from {}", request.requester_id);
                if let Err(e) = transport.send_text(&err.user_message()).await {
                    log::warn!("Failed to send usage hint to {}: {}", request.requester_id, e);
                }
                return err.to_outcome();
            }
        };

        log::info!("🎵 Song request from {}: '{}'", request.requester_id, query);
        let mut status = StatusMessage::post(transport, &format!("🔎 Searching: {}", query)).await;

        match self.run(&query, transport, &mut status).await {
            Ok(candidate) => {
                status.clear().await;
                log::info!(
                    "✅ Delivered {} to {} in {:.1}s",
                    candidate.describe(),
                    request.requester_id,
                    started.elapsed().as_secs_f64()
                );
                DeliveryOutcome::sent(candidate.title)
            }
            Err(err) => {
                log::warn!(
                    "Request '{}' from {} ended as {} after {:.1}s: {}",
                    query,
                    request.requester_id,
                    err.kind(),
                    started.elapsed().as_secs_f64(),
                    err
                );
                status.finish(&err.user_message()).await;
                err.to_outcome()
            }
        }
    }

    async fn run(
        &self,
        query: &str,
        transport: &dyn ChatTransport,
        status: &mut StatusMessage<'_>,
    ) -> PipelineResult<MediaCandidate> {
        let candidate = match self.resolver.resolve(query).await {
            Ok(candidate) => candidate,
            Err(err) => {
                log::error!("Resolve failed for '{}': [{}] {}", query, err.kind(), err);
                return Err(err);
            }
        };
        log::info!("Selected {} for '{}'", candidate.describe(), query);
        status.update(&format!("⬇️ Downloading: {}", candidate.title)).await;

        let scratch = ScratchDir::create(&self.scratch_root).await?;
        let result = self.deliver(&candidate, &scratch, transport, status).await;

        if let Err(e) = scratch.cleanup().await {
            log::error!("Failed to remove scratch dir {}: {}", scratch.path().display(), e);
        }

        match result {
            Ok(()) => Ok(candidate),
            Err(err) => {
                log::error!(
                    "Delivery failed for '{}' on '{}' ({}): [{}] {}",
                    query,
                    candidate.title,
                    candidate.source_url,
                    err.kind(),
                    err
                );
                Err(err)
            }
        }
    }

    async fn deliver(
        &self,
        candidate: &MediaCandidate,
        scratch: &ScratchDir,
        transport: &dyn ChatTransport,
        status: &mut StatusMessage<'_>,
    ) -> PipelineResult<()> {
        let (fetched, deadline) = self.worker.fetch(candidate, scratch).await?;
        log::info!(
            "Fetched {} ({}, {} @ {} kbps)",
            fetched.local_path.display(),
            format_mib(fetched.size_bytes),
            fetched.codec,
            fetched.bitrate_kbps
        );

        let artifact = match self.gate.evaluate(&fetched) {
            GateDecision::SendAudio => fetched,
            GateDecision::Reject { size, limit } => return Err(PipelineError::TooLarge { size, limit }),
            GateDecision::Downgrade { target_bitrate_kbps } => {
                status
                    .update(&format!(
                        "🗜 File is {}, re-encoding at {} kbps…",
                        format_mib(fetched.size_bytes),
                        target_bitrate_kbps
                    ))
                    .await;
                let smaller = self.worker.downgrade(&fetched, target_bitrate_kbps, deadline).await?;
                log::info!(
                    "Re-encoded to {} kbps: {} -> {}",
                    target_bitrate_kbps,
                    format_mib(fetched.size_bytes),
                    format_mib(smaller.size_bytes)
                );
                match self.gate.evaluate_final(&smaller) {
                    GateDecision::SendAudio => smaller,
                    _ => {
                        return Err(PipelineError::TooLarge {
                            size: smaller.size_bytes,
                            limit: self.gate.limit(),
                        })
                    }
                }
            }
        };

        status.update("🚀 Sending…").await;
        let attachment = AudioAttachment::for_artifact(&artifact, candidate);
        transport
            .send_audio(&attachment)
            .await
            .map_err(|e| PipelineError::Delivery(e.to_string()))
    }
}

/// The one progress message a request shows while it runs.
///
/// Progress edits are best effort. `finish` turns it into the terminal
/// error message, falling back to a fresh message when there is nothing
/// to edit.
struct StatusMessage<'a> {
    transport: &'a dyn ChatTransport,
    handle: Option<StatusHandle>,
}

impl<'a> StatusMessage<'a> {
    async fn post(transport: &'a dyn ChatTransport, text: &str) -> Self {
        let handle = match transport.send_text(text).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Failed to post status message: {}", e);
                None
            }
        };
        Self { transport, handle }
    }

    async fn update(&mut self, text: &str) {
        if let Some(handle) = self.handle {
            if let Err(e) = self.transport.edit_text(handle, text).await {
                log::debug!("Status update skipped: {}", e);
            }
        }
    }

    async fn clear(self) {
        if let Some(handle) = self.handle {
            if let Err(e) = self.transport.delete(handle).await {
                log::debug!("Failed to delete status message: {}", e);
            }
        }
    }

    async fn finish(self, text: &str) {
        if let Some(handle) = self.handle {
            match self.transport.edit_text(handle, text).await {
                Ok(()) => return,
                Err(e) => log::warn!("Failed to edit status into error message: {}", e),
            }
        }
        if let Err(e) = self.transport.send_text(text).await {
            log::error!("Failed to report error to user: {}", e);
        }
    }
}
