//! Mock collaborators for pipeline integration tests
//!
//! A scripted media provider, a transcoder that writes smaller files, and
//! a chat transport that records everything it is asked to show.

#![allow(dead_code)] // not every test binary uses every helper

pub mod provider;
pub mod transport;

pub use provider::{candidate, MockProvider, MockTranscoder};
pub use transport::RecordingTransport;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tunefetch::core::retry::RetryConfig;
use tunefetch::download::{OversizePolicy, Pipeline, PipelineSettings};

pub const MIB: u64 = 1024 * 1024;

/// Settings tuned for tests: no backoff delays, short timeouts.
pub fn test_settings(scratch_root: &Path) -> PipelineSettings {
    let mut settings = PipelineSettings {
        scratch_root: scratch_root.to_path_buf(),
        ..PipelineSettings::default()
    };
    let retry = RetryConfig::with_attempts(3)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .no_jitter();
    settings.resolver.retry = retry.clone();
    settings.resolver.search_timeout = Duration::from_secs(5);
    settings.worker.retry = retry;
    settings.worker.fetch_timeout = Duration::from_secs(10);
    settings
}

pub fn pipeline(provider: Arc<MockProvider>, transcoder: Arc<MockTranscoder>, settings: PipelineSettings) -> Pipeline {
    Pipeline::new(provider, transcoder, settings)
}

pub fn downgrade_settings(scratch_root: &Path) -> PipelineSettings {
    PipelineSettings {
        oversize_policy: OversizePolicy::Downgrade,
        ..test_settings(scratch_root)
    }
}

/// Entries left under the scratch root.
pub fn leftover_entries(root: &Path) -> Vec<String> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
