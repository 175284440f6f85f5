//! Search, download and delivery

pub mod error;
pub mod gate;
pub mod pipeline;
pub mod resolver;
pub mod scratch;
pub mod source;
pub mod transport;
pub mod worker;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use error::ProviderError;
pub use gate::{DeliveryGate, GateDecision, OversizePolicy};
pub use pipeline::{Pipeline, PipelineSettings};
pub use source::{ytdlp::YtDlpSource, FetchRequest, MediaProvider};
pub use transport::{AudioAttachment, ChatTransport, DirectoryTransport, StatusHandle, TransportError};
