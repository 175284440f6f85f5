//! Chat transport that records every call

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use tunefetch::download::{AudioAttachment, ChatTransport, StatusHandle, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Text(String),
    Edit(i64, String),
    Delete(i64),
    Audio { file_name: String, title: String, size_bytes: u64 },
}

pub struct RecordingTransport {
    events: Mutex<Vec<Event>>,
    next_id: AtomicI64,
    fail_audio: bool,
    fail_text: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            fail_audio: false,
            fail_text: false,
        }
    }

    /// Transport whose uploads are always refused.
    pub fn rejecting_audio() -> Self {
        Self {
            fail_audio: true,
            ..Self::new()
        }
    }

    /// Transport where posting new text fails (edits still work).
    pub fn without_status() -> Self {
        Self {
            fail_text: true,
            ..Self::new()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn audio_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Audio { .. }))
            .count()
    }

    /// Messages the user would read as the end of a request: audio
    /// uploads and error texts.
    pub fn terminal_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| match e {
                Event::Audio { .. } => true,
                Event::Text(text) | Event::Edit(_, text) => text.starts_with('❌'),
                Event::Delete(_) => false,
            })
            .count()
    }

    /// Last error text shown, if any.
    pub fn last_error(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::Text(text) | Event::Edit(_, text) if text.starts_with('❌') => Some(text),
            _ => None,
        })
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, text: &str) -> Result<StatusHandle, TransportError> {
        if self.fail_text {
            return Err(TransportError::Network("send_text disabled".to_string()));
        }
        self.push(Event::Text(text.to_string()));
        Ok(StatusHandle(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_text(&self, handle: StatusHandle, text: &str) -> Result<(), TransportError> {
        self.push(Event::Edit(handle.0, text.to_string()));
        Ok(())
    }

    async fn delete(&self, handle: StatusHandle) -> Result<(), TransportError> {
        self.push(Event::Delete(handle.0));
        Ok(())
    }

    async fn send_audio(&self, audio: &AudioAttachment) -> Result<(), TransportError> {
        if self.fail_audio {
            return Err(TransportError::Rejected("Request Entity Too Large".to_string()));
        }
        assert!(audio.path.exists(), "artifact must exist while it is being sent");
        self.push(Event::Audio {
            file_name: audio.file_name.clone(),
            title: audio.title.clone(),
            size_bytes: audio.size_bytes,
        });
        Ok(())
    }
}
