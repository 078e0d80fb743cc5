//! Session executor
//!
//! Drives the state machine: applies effects, runs exchanges against the
//! chat channel, and publishes state to observers. Chained effects (the
//! silent retry included) are processed iteratively, never recursively.

use super::SessionEvent;
use crate::config::SessionConfig;
use crate::llm::{ChatChannel, ChatService, LlmError, LlmErrorKind};
use crate::state_machine::{
    transition, ConvState, Effect, Event, Message, SessionState, TransitionError,
};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One conversation with the model
pub struct Session<S: ChatService> {
    service: S,
    config: SessionConfig,
    channel: Option<Box<dyn ChatChannel>>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    cancel_token: CancellationToken,
    /// Last loading value announced to subscribers
    loading_reported: bool,
    /// Raw text of the most recent exchange, kept for rejection logging
    last_reply: String,
}

impl<S: ChatService> Session<S> {
    pub fn new(service: S, config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        let (broadcast_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            config,
            channel: None,
            state: SessionState::default(),
            state_tx,
            broadcast_tx,
            cancel_token: CancellationToken::new(),
            loading_reported: false,
            last_reply: String::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Token that aborts the in-flight exchange and closes the session
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub(super) fn broadcaster(&self) -> broadcast::Sender<SessionEvent> {
        self.broadcast_tx.clone()
    }

    /// Open the chat channel. Does nothing once the session has been opened,
    /// has failed to open, or has been cancelled.
    pub async fn start_session(&mut self) -> Result<(), TransitionError> {
        if !matches!(self.state.phase(), ConvState::Closed) || self.cancel_token.is_cancelled() {
            return Ok(());
        }

        tracing::info!(model = %self.service.model_id(), "Starting session");
        match self.service.open(&self.config.system_instruction).await {
            Ok(channel) => {
                self.channel = Some(channel);
                self.process_event(Event::SessionStarted).await
            }
            Err(e) => {
                tracing::error!(error = %e.message, kind = ?e.kind, "Failed to open chat channel");
                self.process_event(Event::SessionFailed { message: e.message })
                    .await
            }
        }
    }

    pub async fn send_user_message(&mut self, text: impl Into<String>) -> Result<(), TransitionError> {
        self.process_event(Event::UserMessage { text: text.into() })
            .await
    }

    /// Answer the pending focus query. An empty answer only dismisses it.
    pub async fn answer_pending_focus_query(
        &mut self,
        answer: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.process_event(Event::FocusAnswer {
            answer: answer.into(),
        })
        .await
    }

    /// Cancel and close the session, dropping the channel
    pub async fn close(&mut self) {
        self.cancel_token.cancel();
        if !matches!(self.state.phase(), ConvState::Closed) {
            if let Err(e) = self.process_event(Event::Cancelled).await {
                tracing::warn!(error = %e, "Failed to close session");
            }
        }
        self.channel = None;
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        // Process events in a loop to handle chained effects
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            // Pure state transition
            let result = transition(&self.state, current_event)?;

            self.state.set_phase(result.new_state);
            if self.state.loading() {
                self.report_loading();
            }

            // Observers only see the new phase together with the effects
            // that belong to it
            for effect in result.effects {
                if matches!(effect, Effect::RequestExchange { .. }) {
                    self.publish();
                }
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }

            self.publish();
            self.report_loading();
        }

        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::AppendMessage(content) => {
                let message = Message::new(content);
                self.state.push_message(message.clone());
                let _ = self.broadcast_tx.send(SessionEvent::Message(message));
                None
            }

            Effect::SetError(error) => {
                if self.state.last_error() != error.as_deref() {
                    self.state.set_error(error.clone());
                    let _ = self.broadcast_tx.send(SessionEvent::Error(error));
                }
                None
            }

            Effect::SetFocusQuery(query) => {
                self.state.set_focus_query(query.clone());
                let _ = self.broadcast_tx.send(SessionEvent::FocusQuery(query));
                None
            }

            Effect::RequestExchange {
                prompt,
                attempt,
                retry_reason,
            } => {
                if let Some(reason) = retry_reason {
                    tracing::warn!(
                        attempt,
                        reason = %reason,
                        raw = %self.last_reply,
                        "Structured response rejected, retrying with amended prompt"
                    );
                }
                Some(self.run_exchange(&prompt, attempt).await)
            }

            Effect::NotifyTurnSettled => {
                self.report_loading();
                let _ = self.broadcast_tx.send(SessionEvent::TurnSettled);
                None
            }
        }
    }

    /// Send one prompt and pull its chunks until the stream ends, the
    /// exchange times out, or the session is cancelled
    async fn run_exchange(&mut self, prompt: &str, attempt: u32) -> Event {
        let cancel_token = self.cancel_token.clone();
        let limit = self.config.exchange_timeout;
        let Some(channel) = self.channel.as_mut() else {
            return Event::ExchangeFailed {
                kind: LlmErrorKind::Unknown,
                message: "Chat channel is not open".to_string(),
                rate_limited: false,
            };
        };

        tracing::info!(attempt, prompt_len = prompt.len(), "Starting exchange");

        // Race the exchange against cancellation
        let outcome = tokio::select! {
            biased;

            () = cancel_token.cancelled() => None,

            result = with_timeout(limit, collect_reply(channel.as_mut(), prompt)) => Some(result),
        };

        match outcome {
            None => {
                tracing::info!(attempt, "Exchange cancelled");
                self.channel = None;
                Event::Cancelled
            }
            Some(Ok(text)) => {
                tracing::info!(attempt, reply_len = text.len(), "Exchange complete");
                self.last_reply.clone_from(&text);
                Event::ExchangeComplete { text }
            }
            Some(Err(e)) => {
                let rate_limited = e.is_rate_limited();
                tracing::error!(
                    attempt,
                    error = %e.message,
                    kind = ?e.kind,
                    rate_limited,
                    "Exchange failed"
                );
                Event::ExchangeFailed {
                    kind: e.kind,
                    message: e.message,
                    rate_limited,
                }
            }
        }
    }

    fn report_loading(&mut self) {
        let loading = self.state.loading();
        if loading != self.loading_reported {
            self.loading_reported = loading;
            let _ = self.broadcast_tx.send(SessionEvent::Loading(loading));
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

/// Concatenate every chunk of one reply
async fn collect_reply(channel: &mut dyn ChatChannel, prompt: &str) -> Result<String, LlmError> {
    let mut stream = channel.send(prompt).await?;
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}

async fn with_timeout<F>(limit: Option<Duration>, exchange: F) -> Result<String, LlmError>
where
    F: Future<Output = Result<String, LlmError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .unwrap_or_else(|_| {
                Err(LlmError::timeout(format!(
                    "No complete reply within {}s",
                    limit.as_secs()
                )))
            }),
        None => exchange.await,
    }
}
