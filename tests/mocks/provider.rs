//! Scripted media provider and transcoder

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::time::sleep;

use tunefetch::conversion::audio::{AudioCodec, Transcoder};
use tunefetch::conversion::{ConversionError, ConversionResult};
use tunefetch::core::types::MediaCandidate;
use tunefetch::download::{FetchRequest, MediaProvider, ProviderError};

pub fn candidate(title: &str, duration_seconds: Option<u64>) -> MediaCandidate {
    let mut meta = Map::new();
    meta.insert("uploader".to_string(), Value::String("Mock Channel".to_string()));
    if let Some(d) = duration_seconds {
        meta.insert("duration".to_string(), json!(d));
    }
    MediaCandidate {
        title: title.to_string(),
        source_url: format!("https://www.youtube.com/watch?v={}", title.replace(' ', "_")),
        duration_seconds,
        raw_provider_metadata: meta,
    }
}

/// Provider whose search results, file sizes and failures are scripted.
pub struct MockProvider {
    results: Vec<MediaCandidate>,
    search_error: Option<ProviderError>,
    file_bytes: u64,
    codec: AudioCodec,
    fetch_delay: Duration,
    /// Fetches left that fail with a transient network error
    transient_failures: AtomicU32,
    fetch_error: Option<ProviderError>,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    completed_fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetched_urls: Mutex<Vec<String>>,
    output_dirs: Mutex<Vec<PathBuf>>,
}

impl MockProvider {
    pub fn new(results: Vec<MediaCandidate>) -> Self {
        Self {
            results,
            search_error: None,
            file_bytes: 4_800_000,
            codec: AudioCodec::Mp3,
            fetch_delay: Duration::ZERO,
            transient_failures: AtomicU32::new(0),
            fetch_error: None,
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            completed_fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetched_urls: Mutex::new(Vec::new()),
            output_dirs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_file_bytes(mut self, bytes: u64) -> Self {
        self.file_bytes = bytes;
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_fetch_error(mut self, err: ProviderError) -> Self {
        self.fetch_error = Some(err);
        self
    }

    pub fn with_search_error(mut self, err: ProviderError) -> Self {
        self.search_error = Some(err);
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Fetches that ran to the point of writing their audio file.
    pub fn completed_fetches(&self) -> usize {
        self.completed_fetches.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched_urls.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn output_dirs(&self) -> Vec<PathBuf> {
        self.output_dirs.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<MediaCandidate>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.search_error {
            return Err(err.clone());
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }

    async fn fetch_audio(&self, request: &FetchRequest) -> Result<(), ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.fetch_inner(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MockProvider {
    async fn fetch_inner(&self, request: &FetchRequest) -> Result<(), ProviderError> {
        self.fetched_urls.lock().unwrap().push(request.source_url.clone());
        self.output_dirs.lock().unwrap().push(request.output_dir.clone());

        // A partial download is left behind before any failure
        let partial = request.output_dir.join("download.part");
        tokio::fs::write(&partial, b"partial").await.unwrap();

        if !self.fetch_delay.is_zero() {
            sleep(self.fetch_delay).await;
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Network("connection reset by peer".to_string()));
        }
        if let Some(err) = &self.fetch_error {
            return Err(err.clone());
        }

        let _ = tokio::fs::remove_file(&partial).await;
        let path = request
            .output_dir
            .join(format!("track.{}", self.codec.extension()));
        write_sized(&path, self.file_bytes).await;
        self.completed_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sparse file of exactly `bytes` bytes.
pub async fn write_sized(path: &Path, bytes: u64) {
    let file = tokio::fs::File::create(path).await.unwrap();
    file.set_len(bytes).await.unwrap();
}

/// Transcoder that scales the file size by `target / source_kbps`, or
/// writes a fixed size when one is set.
pub struct MockTranscoder {
    source_kbps: u32,
    fixed_output: Option<u64>,
    delay: Duration,
    fail: bool,
    calls: Mutex<Vec<u32>>,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self {
            source_kbps: 192,
            fixed_output: None,
            delay: Duration::ZERO,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fixed_output(mut self, bytes: u64) -> Self {
        self.fixed_output = Some(bytes);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Target bitrates requested so far.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn reencode(&self, input: &Path, output: &Path, _codec: AudioCodec, bitrate_kbps: u32) -> ConversionResult<()> {
        self.calls.lock().unwrap().push(bitrate_kbps);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        if self.fail {
            return Err(ConversionError::FfmpegError("mock encoder failure".to_string()));
        }
        let input_size = tokio::fs::metadata(input).await?.len();
        let size = self
            .fixed_output
            .unwrap_or(input_size * u64::from(bitrate_kbps) / u64::from(self.source_kbps));
        write_sized(output, size).await;
        Ok(())
    }
}
