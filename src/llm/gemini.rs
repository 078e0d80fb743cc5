//! Google Gemini streaming chat implementation
//!
//! Uses `streamGenerateContent` with server-sent events. The channel keeps
//! the running chat history so every send carries the earlier turns,
//! including replies that failed validation.

use super::{ChatChannel, ChatService, ChunkStream, LlmError};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::oneshot;


const DIRECT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: Option<String>,
    model_id: String,
    url: String,
}

impl GeminiService {
    /// Build a service for `model_id`. With a gateway the key may be absent;
    /// in direct mode a missing key surfaces when the channel is opened.
    pub fn new(
        api_key: Option<String>,
        model_id: impl Into<String>,
        gateway: Option<&str>,
    ) -> Result<Self, LlmError> {
        let model_id = model_id.into();
        let base_url = match gateway {
            Some(gw) => format!("{}/gemini/v1beta", gw.trim_end_matches('/')),
            None => DIRECT_BASE_URL.to_string(),
        };
        let url = format!("{base_url}/models/{model_id}:streamGenerateContent?alt=sse");

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        let api_key = if gateway.is_some() {
            api_key
        } else {
            api_key.filter(|key| !key.is_empty())
        };

        Ok(Self {
            client,
            api_key,
            model_id,
            url,
        })
    }

    fn direct_mode(&self) -> bool {
        self.url.starts_with(DIRECT_BASE_URL)
    }
}

#[async_trait]
impl ChatService for GeminiService {
    async fn open(&self, system_instruction: &str) -> Result<Box<dyn ChatChannel>, LlmError> {
        if self.direct_mode() && self.api_key.is_none() {
            return Err(LlmError::auth("API_KEY environment variable not set."));
        }
        Ok(Box::new(GeminiChannel {
            client: self.client.clone(),
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            system_instruction: GeminiContent::system(system_instruction),
            history: Vec::new(),
            pending_reply: None,
        }))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// An open Gemini chat
pub struct GeminiChannel {
    client: Client,
    url: String,
    api_key: Option<String>,
    system_instruction: GeminiContent,
    history: Vec<GeminiContent>,
    /// Full text of the previous reply, delivered when its stream ends
    pending_reply: Option<oneshot::Receiver<String>>,
}

impl GeminiChannel {
    /// Fold the previous reply into the history once its stream has ended.
    /// A reply that failed, was abandoned or came back empty takes its user
    /// turn with it, so roles keep alternating.
    fn collect_pending_reply(&mut self) {
        let Some(mut rx) = self.pending_reply.take() else {
            return;
        };
        match rx.try_recv() {
            Ok(reply) if !reply.is_empty() => {
                self.history.push(GeminiContent::turn("model", reply));
            }
            _ => {
                if self.history.last().is_some_and(GeminiContent::is_user) {
                    self.history.pop();
                }
            }
        }
    }
}

#[async_trait]
impl ChatChannel for GeminiChannel {
    async fn send(&mut self, text: &str) -> Result<ChunkStream, LlmError> {
        self.collect_pending_reply();
        self.history.push(GeminiContent::turn("user", text));

        let request = GeminiRequest {
            contents: &self.history,
            system_instruction: Some(&self.system_instruction),
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.history.pop();
                return Err(transport_error(&e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.history.pop();
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
            return Err(status_error(status, &body));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_reply = Some(reply_rx);
        Ok(reply_stream(response.bytes_stream(), reply_tx))
    }
}

fn transport_error(e: &reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::timeout(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        LlmError::network(format!("Connection failed: {e}"))
    } else {
        LlmError::unknown(format!("Request failed: {e}"))
    }
}

fn status_error(status: StatusCode, body: &str) -> LlmError {
    let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(body) else {
        return LlmError::unknown(format!("HTTP {status} error: {body}"));
    };
    let message = error_resp.error.message;
    match status.as_u16() {
        400 => LlmError::invalid_request(format!("Invalid request: {message}")),
        401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
        429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
        500..=599 => LlmError::server_error(format!("Server error: {message}")),
        _ => LlmError::unknown(format!("HTTP {status}: {message}")),
    }
}

// ============================================================================
// Server-sent event decoding
// ============================================================================

/// Splits a byte stream into lines, holding partial lines between chunks
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).trim_end().to_string())
    }
}

/// Text carried by one SSE line; `None` for non-data lines and chunks
/// without text parts
fn parse_event_line(line: &str) -> Result<Option<String>, LlmError> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }

    let chunk: GeminiStreamChunk = serde_json::from_str(payload)
        .map_err(|e| LlmError::unknown(format!("Malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(match error.code {
            Some(429) => LlmError::rate_limit(format!("Rate limit exceeded: {}", error.message)),
            Some(500..=599) => LlmError::server_error(format!("Server error: {}", error.message)),
            _ => LlmError::unknown(error.message),
        });
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .take(1)
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect();

    Ok((!text.is_empty()).then_some(text))
}

struct ReplyState<S> {
    bytes: Pin<Box<S>>,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    reply: String,
    reply_tx: Option<oneshot::Sender<String>>,
    finished: bool,
}

impl<S> ReplyState<S> {
    /// Queue the text of each decoded line, stopping at the first bad one
    fn absorb(&mut self, lines: Vec<String>) -> Result<(), LlmError> {
        for line in lines {
            if let Some(text) = parse_event_line(&line)? {
                self.reply.push_str(&text);
                self.pending.push_back(text);
            }
        }
        Ok(())
    }

    fn complete(&mut self) {
        self.finished = true;
        if let Some(tx) = self.reply_tx.take() {
            let _ = tx.send(std::mem::take(&mut self.reply));
        }
    }
}

/// Adapt an SSE byte stream into text chunks. The full reply is handed to
/// `reply_tx` only if the stream ends cleanly.
fn reply_stream<S, B>(bytes: S, reply_tx: oneshot::Sender<String>) -> ChunkStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = ReplyState {
        bytes: Box::pin(bytes),
        decoder: LineDecoder::default(),
        pending: VecDeque::new(),
        reply: String::new(),
        reply_tx: Some(reply_tx),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.decoder.push(chunk.as_ref());
                    if let Err(e) = st.absorb(lines) {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(LlmError::network(format!("Stream interrupted: {e}"))), st));
                }
                None => {
                    let tail: Vec<String> = st.decoder.finish().into_iter().collect();
                    if let Err(e) = st.absorb(tail) {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                    st.complete();
                }
            }
        }
    })
    .boxed()
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: &'a [GeminiContent],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<&'a GeminiContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![GeminiPart {
                text: Some(text.to_string()),
            }],
        }
    }

    fn is_user(&self) -> bool {
        self.role.as_deref() == Some("user")
    }

    fn turn(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![GeminiPart {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    code: Option<u16>,
}
