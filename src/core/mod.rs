//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod retry;
pub mod types;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use logging::init_logger;
