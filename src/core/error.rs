use std::time::Duration;

use thiserror::Error;

use crate::core::types::{DeliveryOutcome, DeliveryStatus};

/// Errors surfaced at the pipeline boundary.
///
/// Every failure in a request ends up as exactly one of these and is turned
/// into one user-visible message plus one [`DeliveryOutcome`].
///
/// # Example
///
/// ```
/// use tunefetch::core::error::PipelineError;
/// use tunefetch::core::types::DeliveryStatus;
///
/// let err = PipelineError::TooLarge { size: 60 << 20, limit: 50 << 20 };
/// assert_eq!(err.status(), DeliveryStatus::RejectedTooLarge);
/// assert!(err.user_message().starts_with("❌"));
/// ```
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The user sent no search text
    #[error("empty query")]
    EmptyQuery,

    /// The provider returned nothing usable
    #[error("no usable candidate for '{query}'")]
    NotFound { query: String },

    /// Search itself failed (network, provider crash, timeout)
    #[error("search failed: {0}")]
    Resolver(String),

    /// Fetching the media stream failed after any retries
    #[error("download failed: {0}")]
    Download(String),

    /// Post-processing into the target codec failed
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// Fetch + transcode exceeded the configured ceiling
    #[error("fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Artifact exceeds the transport's attachment limit
    #[error("artifact too large: {size} bytes > {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The chat transport refused or failed the send
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Scratch storage could not be prepared
    #[error("scratch storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Type alias for Result with PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyQuery => "empty_query",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::Resolver(_) => "resolver",
            PipelineError::Download(_) => "download",
            PipelineError::Transcode(_) => "transcode",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::TooLarge { .. } => "too_large",
            PipelineError::Delivery(_) => "delivery",
            PipelineError::Storage(_) => "storage",
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        match self {
            PipelineError::NotFound { .. } => DeliveryStatus::NotFound,
            PipelineError::TooLarge { .. } => DeliveryStatus::RejectedTooLarge,
            _ => DeliveryStatus::Error,
        }
    }

    /// Text shown to the user. Only `EmptyQuery` asks for a song name.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::EmptyQuery => {
                "❌ Please send a song name.\n\nExample: /song Tarkan - Kuzu Kuzu".to_string()
            }
            PipelineError::NotFound { query } => {
                format!("❌ Nothing found for \"{}\".\n\nTry a different spelling or add the artist.", query)
            }
            PipelineError::Resolver(_) => "❌ Search is temporarily unavailable.\n\nTry again in a minute.".to_string(),
            PipelineError::Download(_) => "❌ Couldn't download this song.\n\nTry again later.".to_string(),
            PipelineError::Transcode(_) => "❌ Couldn't convert this song to MP3.".to_string(),
            PipelineError::Timeout(_) => "❌ The download took too long (timeout).\n\nTry another song.".to_string(),
            PipelineError::TooLarge { size, limit } => format!(
                "❌ The file is too large to send ({:.1} MB, limit {:.1} MB).",
                *size as f64 / (1024.0 * 1024.0),
                *limit as f64 / (1024.0 * 1024.0)
            ),
            PipelineError::Delivery(_) => "❌ Couldn't send the file.\n\nTry again later.".to_string(),
            PipelineError::Storage(_) => "❌ Something went wrong on our side.\n\nTry again later.".to_string(),
        }
    }

    pub fn to_outcome(&self) -> DeliveryOutcome {
        DeliveryOutcome {
            status: self.status(),
            detail: self.to_string(),
        }
    }
}
