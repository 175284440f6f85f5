//! Telegram bot handler tree configuration
//!
//! The same schema is used by the polling and webhook runners.

mod commands;
mod schema;
mod types;

pub use schema::schema;
pub use types::{is_message_addressed_to_bot, strip_bot_mention, HandlerDeps, HandlerError};
