//! [`ChatTransport`] over the Telegram Bot API for a single chat.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId};
use teloxide::{ApiError, RequestError};

use crate::core::retry::{retry, RetryConfig, Retryable};
use crate::download::transport::{AudioAttachment, ChatTransport, StatusHandle, TransportError};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    chat_id: ChatId,
    retry: RetryConfig,
}

impl TelegramTransport {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            retry: RetryConfig::quick(),
        }
    }
}

fn message_id(handle: StatusHandle) -> MessageId {
    MessageId(i32::try_from(handle.0).unwrap_or(i32::MAX))
}

fn transport_error(err: RequestError) -> TransportError {
    match err {
        RequestError::Network(e) => TransportError::Network(e.to_string()),
        RequestError::Io(e) => TransportError::Io(std::io::Error::new(e.kind(), e.to_string())),
        other => TransportError::Rejected(other.to_string()),
    }
}

/// Failed upload. Only retried when Telegram cannot have accepted the file:
/// a rate limit, or a connection that was never established.
#[derive(Debug)]
struct UploadError(RequestError);

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Retryable for UploadError {
    fn is_retryable(&self) -> bool {
        match &self.0 {
            RequestError::RetryAfter(_) => true,
            RequestError::Network(e) => e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.0.retry_after()
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, text: &str) -> Result<StatusHandle, TransportError> {
        let message = retry(&self.retry, || self.bot.send_message(self.chat_id, text).send())
            .await
            .into_result()
            .map_err(transport_error)?;
        Ok(StatusHandle(i64::from(message.id.0)))
    }

    async fn edit_text(&self, handle: StatusHandle, text: &str) -> Result<(), TransportError> {
        let result = retry(&self.retry, || {
            self.bot
                .edit_message_text(self.chat_id, message_id(handle), text)
                .send()
        })
        .await
        .into_result();

        match result {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(transport_error(e)),
        }
    }

    async fn delete(&self, handle: StatusHandle) -> Result<(), TransportError> {
        self.bot
            .delete_message(self.chat_id, message_id(handle))
            .await
            .map(|_| ())
            .map_err(transport_error)
    }

    async fn send_audio(&self, audio: &AudioAttachment) -> Result<(), TransportError> {
        if let Err(e) = self.bot.send_chat_action(self.chat_id, ChatAction::UploadVoice).await {
            log::debug!("Failed to send chat action: {}", e);
        }

        log::info!(
            "Uploading {} ({} bytes) to chat {}",
            audio.file_name,
            audio.size_bytes,
            self.chat_id
        );

        let outcome = retry(&self.retry, || {
            let input = InputFile::file(audio.path.clone()).file_name(audio.file_name.clone());
            let mut request = self
                .bot
                .send_audio(self.chat_id, input)
                .title(audio.title.clone())
                .caption(audio.caption.clone());
            if let Some(performer) = &audio.performer {
                request = request.performer(performer.clone());
            }
            if let Some(duration) = audio.duration_secs {
                request = request.duration(duration);
            }
            let upload = request.send();
            async move { upload.await.map_err(UploadError) }
        })
        .await;

        if outcome.attempts > 1 {
            log::info!("Audio upload to {} took {} attempts", self.chat_id, outcome.attempts);
        }
        outcome
            .into_result()
            .map(|_| ())
            .map_err(|UploadError(e)| transport_error(e))
    }
}
