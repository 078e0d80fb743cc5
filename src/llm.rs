//! Streaming chat abstraction
//!
//! The session core only needs a channel that accepts a prompt and yields a
//! finite stream of text chunks. Providers implement `ChatService`.

mod error;
mod gemini;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::{GeminiChannel, GeminiService};

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Text chunks of one exchange; finite and not restartable
pub type ChunkStream = BoxStream<'static, Result<String, LlmError>>;

/// Opens chat channels against a model provider
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Open a conversation primed with a system instruction
    async fn open(&self, system_instruction: &str) -> Result<Box<dyn ChatChannel>, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// One open conversation with the model
#[async_trait]
pub trait ChatChannel: Send {
    /// Send a message and stream back the reply
    async fn send(&mut self, text: &str) -> Result<ChunkStream, LlmError>;
}

#[async_trait]
impl<T: ChatService + ?Sized> ChatService for Arc<T> {
    async fn open(&self, system_instruction: &str) -> Result<Box<dyn ChatChannel>, LlmError> {
        (**self).open(system_instruction).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for chat services
pub struct LoggingService {
    inner: Arc<dyn ChatService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn ChatService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ChatService for LoggingService {
    async fn open(&self, system_instruction: &str) -> Result<Box<dyn ChatChannel>, LlmError> {
        match self.inner.open(system_instruction).await {
            Ok(channel) => {
                tracing::info!(
                    model = %self.model_id,
                    instruction_len = system_instruction.len(),
                    "Chat channel opened"
                );
                Ok(Box::new(LoggingChannel {
                    inner: channel,
                    model_id: self.model_id.clone(),
                }))
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    error = %e.message,
                    kind = ?e.kind,
                    "Failed to open chat channel"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

struct LoggingChannel {
    inner: Box<dyn ChatChannel>,
    model_id: String,
}

#[async_trait]
impl ChatChannel for LoggingChannel {
    async fn send(&mut self, text: &str) -> Result<ChunkStream, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(text).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    prompt_len = text.len(),
                    "Chat stream started"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    rate_limited = e.is_rate_limited(),
                    "Chat request failed"
                );
            }
        }

        result
    }
}
