//! Bounded worker pool for fetch + transcode jobs.
//!
//! Fetching and transcoding run as separate processes, so the pool's job
//! is admission control and deadlines: at most `capacity` jobs run at
//! once, and a request's jobs are cancelled (child processes killed) once
//! its [`Deadline`] passes. The deadline counts from the first admission,
//! not from enqueue, and a follow-up re-encode shares it.

use crate::conversion::audio::{AudioCodec, Transcoder};
use crate::conversion::get_file_size;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::retry::{retry, RetryConfig};
use crate::core::types::{Artifact, MediaCandidate};
use crate::download::error::ProviderError;
use crate::download::scratch::{clear_dir, locate_audio_file, ScratchDir};
use crate::download::source::{FetchRequest, MediaProvider};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::AbortOnDropHandle;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    Closed,

    #[error("job exceeded {}s deadline", .0.as_secs())]
    TimedOut(Duration),

    #[error("job crashed: {0}")]
    Crashed(String),
}

/// Instant by which all of one request's pool work must be finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    ceiling: Duration,
    at: Instant,
}

impl Deadline {
    /// A deadline `ceiling` from now.
    pub fn after(ceiling: Duration) -> Self {
        Self {
            ceiling,
            at: Instant::now() + ceiling,
        }
    }

    /// The full budget this deadline was created with.
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Fixed-capacity pool. Cloning shares the same permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs that could start right now without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `job` once a slot is free, cancelling it `ceiling` after admission.
    pub async fn run<F, T>(&self, ceiling: Duration, job: F) -> Result<T, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_admitted(ceiling, job).await.map(|(value, _)| value)
    }

    /// Like [`run`](Self::run), also returning the deadline that started at
    /// admission so follow-up work can stay within it.
    pub async fn run_admitted<F, T>(&self, ceiling: Duration, job: F) -> Result<(T, Deadline), PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.admit().await?;
        let deadline = Deadline::after(ceiling);
        let value = run_in_slot(permit, deadline, job).await?;
        Ok((value, deadline))
    }

    /// Runs `job` within an existing deadline. Waiting for a slot uses up
    /// the same budget.
    pub async fn run_within<F, T>(&self, deadline: Deadline, job: F) -> Result<T, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if deadline.is_expired() {
            return Err(PoolError::TimedOut(deadline.ceiling()));
        }
        let permit = tokio::time::timeout(deadline.remaining(), self.admit())
            .await
            .map_err(|_| PoolError::TimedOut(deadline.ceiling()))??;
        run_in_slot(permit, deadline, job).await
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        let waited = Instant::now();
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let queued = waited.elapsed();
        if queued > Duration::from_millis(100) {
            log::debug!("Job waited {:?} for a worker slot", queued);
        }
        Ok(permit)
    }
}

/// Spawns `job` holding `permit` and waits for it until `deadline`.
///
/// The task is aborted when the deadline passes and also when this future
/// is dropped, so a cancelled request never leaves a job (or its child
/// processes) running and holding the slot.
async fn run_in_slot<F, T>(permit: OwnedSemaphorePermit, deadline: Deadline, job: F) -> Result<T, PoolError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let remaining = deadline.remaining();
    if remaining.is_zero() {
        return Err(PoolError::TimedOut(deadline.ceiling()));
    }

    let mut handle = AbortOnDropHandle::new(tokio::spawn(async move {
        let _permit = permit;
        job.await
    }));

    match tokio::time::timeout(remaining, &mut handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(PoolError::Crashed(join_err.to_string())),
        Err(_) => {
            handle.abort();
            let _ = handle.await;
            Err(PoolError::TimedOut(deadline.ceiling()))
        }
    }
}

/// What the worker produces and how long it may take.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub codec: AudioCodec,
    pub bitrate_kbps: u32,
    /// Budget for the fetch (all retries included) plus any re-encode
    pub fetch_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Mp3,
            bitrate_kbps: 192,
            fetch_timeout: Duration::from_secs(150),
            retry: RetryConfig::with_attempts(3),
        }
    }
}

/// Downloads a candidate into a scratch directory and re-encodes on request.
pub struct FetchWorker {
    provider: Arc<dyn MediaProvider>,
    transcoder: Arc<dyn Transcoder>,
    pool: WorkerPool,
    settings: WorkerSettings,
}

impl FetchWorker {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        transcoder: Arc<dyn Transcoder>,
        pool: WorkerPool,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            provider,
            transcoder,
            pool,
            settings,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Fetches and transcodes `candidate` into `scratch`.
    ///
    /// Transient provider failures are retried inside the job, clearing
    /// partial files between attempts; the deadline covers all attempts.
    /// The returned [`Deadline`] is what is left for a later [`downgrade`](Self::downgrade).
    pub async fn fetch(&self, candidate: &MediaCandidate, scratch: &ScratchDir) -> PipelineResult<(Artifact, Deadline)> {
        let request = FetchRequest {
            source_url: candidate.source_url.clone(),
            output_dir: scratch.path().to_path_buf(),
            codec: self.settings.codec,
            bitrate_kbps: self.settings.bitrate_kbps,
        };
        let provider = Arc::clone(&self.provider);
        let retry_config = self.settings.retry.clone();

        let job = async move { fetch_with_retry(provider, request, retry_config).await };

        let (path, deadline) = match self.pool.run_admitted(self.settings.fetch_timeout, job).await {
            Ok((Ok(path), deadline)) => (path, deadline),
            Ok((Err(err), _)) => {
                log::warn!(
                    "Fetch of {} failed [{}]: {}",
                    candidate.source_url,
                    err.subcategory(),
                    err.message()
                );
                return Err(fetch_error(err));
            }
            Err(PoolError::TimedOut(deadline)) => return Err(PipelineError::Timeout(deadline)),
            Err(err) => return Err(PipelineError::Download(err.to_string())),
        };

        let codec = AudioCodec::from_path(&path).unwrap_or(self.settings.codec);
        let artifact = artifact_at(path, codec, self.settings.bitrate_kbps).await?;
        Ok((artifact, deadline))
    }

    /// Re-encodes `artifact` at `target_kbps`, replacing it on disk.
    ///
    /// Runs within the `deadline` handed out by [`fetch`](Self::fetch). The
    /// original file is removed once the smaller one exists, so a request
    /// never holds more than one artifact.
    pub async fn downgrade(&self, artifact: &Artifact, target_kbps: u32, deadline: Deadline) -> PipelineResult<Artifact> {
        let output = downgraded_path(&artifact.local_path, artifact.codec, target_kbps);
        let transcoder = Arc::clone(&self.transcoder);
        let input = artifact.local_path.clone();
        let out = output.clone();
        let codec = artifact.codec;

        let job = async move { transcoder.reencode(&input, &out, codec, target_kbps).await };

        match self.pool.run_within(deadline, job).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(PipelineError::Transcode(err.to_string())),
            Err(PoolError::TimedOut(deadline)) => return Err(PipelineError::Timeout(deadline)),
            Err(err) => return Err(PipelineError::Transcode(err.to_string())),
        }

        if let Err(e) = fs_err::tokio::remove_file(&artifact.local_path).await {
            log::warn!("Failed to remove pre-downgrade file: {}", e);
        }
        artifact_at(output, codec, target_kbps).await
    }
}

async fn fetch_with_retry(
    provider: Arc<dyn MediaProvider>,
    request: FetchRequest,
    retry_config: RetryConfig,
) -> Result<PathBuf, ProviderError> {
    let mut attempt = 0u32;
    let outcome = retry(&retry_config, || {
        attempt += 1;
        let first = attempt == 1;
        let provider = Arc::clone(&provider);
        let request = request.clone();
        async move {
            if !first {
                clear_partial_files(&request.output_dir).await;
            }
            if let Err(e) = provider.fetch_audio(&request).await {
                return Err(e);
            }
            match locate_audio_file(&request.output_dir, request.codec).await {
                Ok(Some(path)) => Ok(path),
                Ok(None) => Err(ProviderError::Postprocess(
                    "provider reported success but produced no audio file".to_string(),
                )),
                Err(e) => Err(ProviderError::Process(e.to_string())),
            }
        }
    })
    .await;

    if outcome.attempts > 1 {
        log::info!(
            "Fetch of {} finished after {} attempts in {:?}",
            request.source_url,
            outcome.attempts,
            outcome.total_duration
        );
    }
    outcome.into_result()
}

async fn clear_partial_files(dir: &Path) {
    if let Err(e) = clear_dir(dir).await {
        log::warn!("Failed to clear partial files in {} before retry: {}", dir.display(), e);
    }
}

fn fetch_error(err: ProviderError) -> PipelineError {
    match err {
        ProviderError::Postprocess(msg) => PipelineError::Transcode(msg),
        other => PipelineError::Download(other.to_string()),
    }
}

fn downgraded_path(original: &Path, codec: AudioCodec, target_kbps: u32) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    original.with_file_name(format!("{}-{}k.{}", stem, target_kbps, codec.extension()))
}

async fn artifact_at(path: PathBuf, codec: AudioCodec, bitrate_kbps: u32) -> PipelineResult<Artifact> {
    let size_bytes = get_file_size(&path)
        .await
        .map_err(|e| PipelineError::Transcode(format!("cannot stat {}: {}", path.display(), e)))?;
    Ok(Artifact {
        local_path: path,
        size_bytes,
        codec,
        bitrate_kbps,
    })
}
