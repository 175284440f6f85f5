use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::conversion::audio::AudioCodec;
use crate::core::validation::validate_command_args;

/// One inbound song request. Built per message and dropped once the
/// pipeline reports its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRequest {
    pub raw_query: String,
    /// Opaque id of whoever asked (Telegram user id, or 0 for the CLI)
    pub requester_id: i64,
}

impl SongRequest {
    pub fn new(raw_query: impl Into<String>, requester_id: i64) -> Self {
        Self {
            raw_query: raw_query.into(),
            requester_id,
        }
    }

    /// Request from a command's argument list (`/song a b c`).
    ///
    /// Arguments that validate to nothing leave `raw_query` empty, which the
    /// pipeline then rejects as an empty query.
    pub fn from_command_args<S: AsRef<str>>(args: &[S], requester_id: i64) -> Self {
        Self::new(validate_command_args(args).unwrap_or_default(), requester_id)
    }
}

/// A search result returned by the media provider before any download.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCandidate {
    pub title: String,
    pub source_url: String,
    /// `None` when the provider did not report a duration
    pub duration_seconds: Option<u64>,
    pub raw_provider_metadata: Map<String, Value>,
}

impl MediaCandidate {
    /// Performer name for the audio tag: artist, then creator, uploader, channel.
    pub fn performer(&self) -> Option<&str> {
        ["artist", "creator", "uploader", "channel"]
            .iter()
            .filter_map(|key| self.raw_provider_metadata.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|name| !name.is_empty())
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self.duration_seconds {
            Some(secs) => format!("'{}' ({}s, {})", self.title, secs, self.source_url),
            None => format!("'{}' (unknown duration, {})", self.title, self.source_url),
        }
    }
}

/// The transcoded audio file produced for one request.
///
/// Lives inside the request's scratch directory and is removed with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub codec: AudioCodec,
    pub bitrate_kbps: u32,
}

/// Terminal status of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    RejectedTooLarge,
    NotFound,
    Error,
}

/// What the pipeline reports back to its caller, exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub detail: String,
}

impl DeliveryOutcome {
    pub fn sent(detail: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Sent,
            detail: detail.into(),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == DeliveryStatus::Sent
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}
