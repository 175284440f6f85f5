use std::fmt;

use crate::core::process::ProcessError;
use crate::core::retry::Retryable;

/// Structured error type for provider operations (search, fetch).
///
/// Categorized so the resolver and worker can tell transient failures
/// (worth a bounded retry) from permanent ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network-level failure or rate limiting (transient)
    Network(String),
    /// Provider-side timeout on a single call (transient)
    Timeout(String),
    /// Media cannot be fetched: private, removed, region locked, no stream
    Unavailable(String),
    /// Post-processing into the target codec failed
    Postprocess(String),
    /// Provider output could not be parsed
    Malformed(String),
    /// Process execution failure (spawn, unexpected exit)
    Process(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Network(msg) => write!(f, "network error: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "timed out: {}", msg),
            ProviderError::Unavailable(msg) => write!(f, "unavailable: {}", msg),
            ProviderError::Postprocess(msg) => write!(f, "post-processing failed: {}", msg),
            ProviderError::Malformed(msg) => write!(f, "malformed provider output: {}", msg),
            ProviderError::Process(msg) => write!(f, "process failed: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "network",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::Postprocess(_) => "postprocess",
            ProviderError::Malformed(_) => "malformed",
            ProviderError::Process(_) => "process",
        }
    }

    /// Returns the inner message
    pub fn message(&self) -> &str {
        match self {
            ProviderError::Network(msg)
            | ProviderError::Timeout(msg)
            | ProviderError::Unavailable(msg)
            | ProviderError::Postprocess(msg)
            | ProviderError::Malformed(msg)
            | ProviderError::Process(msg) => msg,
        }
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::Timeout(_))
    }
}

impl From<ProcessError> for ProviderError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::TimedOut { .. } => ProviderError::Timeout(err.to_string()),
            ProcessError::Spawn { .. } => ProviderError::Process(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Network("connection reset".into());
        assert_eq!(err.to_string(), "network error: connection reset");
        assert_eq!(err.message(), "connection reset");
    }

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(ProviderError::Network("".into()).is_retryable());
        assert!(ProviderError::Timeout("".into()).is_retryable());
        assert!(!ProviderError::Unavailable("".into()).is_retryable());
        assert!(!ProviderError::Postprocess("".into()).is_retryable());
        assert!(!ProviderError::Malformed("".into()).is_retryable());
        assert!(!ProviderError::Process("".into()).is_retryable());
    }

    #[test]
    fn test_from_process_error() {
        let timed_out = ProcessError::TimedOut {
            program: "yt-dlp".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(ProviderError::from(timed_out).subcategory(), "timeout");

        let spawn = ProcessError::Spawn {
            program: "yt-dlp".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(ProviderError::from(spawn).subcategory(), "process");
    }
}
