//! Actor handle for a session
//!
//! Commands from any task are queued on an mpsc channel and executed one at
//! a time, so a message sent while an exchange is in flight waits its turn
//! instead of being rejected.

use super::{Session, SessionEvent};
use crate::llm::ChatService;
use crate::state_machine::SessionState;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COMMAND_QUEUE_CAPACITY: usize = 32;

#[derive(Debug)]
enum Command {
    Start,
    Send(String),
    Answer(String),
}

/// The session task has stopped and accepts no more commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session has stopped")]
pub struct SessionClosed;

/// Handle to a session running on its own task
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SessionState>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Move `session` onto a spawned task
    pub fn spawn<S: ChatService + 'static>(session: Session<S>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let state_rx = session.watch_state();
        let broadcast_tx = session.broadcaster();
        let cancel_token = session.cancel_token();

        let task = tokio::spawn(run(session, command_rx, cancel_token.clone()));

        Self {
            command_tx,
            state_rx,
            broadcast_tx,
            cancel_token,
            task,
        }
    }

    pub async fn start_session(&self) -> Result<(), SessionClosed> {
        self.submit(Command::Start).await
    }

    pub async fn send_user_message(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.submit(Command::Send(text.into())).await
    }

    pub async fn answer_pending_focus_query(
        &self,
        answer: impl Into<String>,
    ) -> Result<(), SessionClosed> {
        self.submit(Command::Answer(answer.into())).await
    }

    /// Snapshot of the latest published state
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Abort the in-flight exchange and drop queued commands
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Cancel the session and wait for its task to finish
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        drop(self.command_tx);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Session task ended abnormally");
        }
    }

    async fn submit(&self, command: Command) -> Result<(), SessionClosed> {
        self.command_tx.send(command).await.map_err(|_| SessionClosed)
    }
}

async fn run<S: ChatService>(
    mut session: Session<S>,
    mut command_rx: mpsc::Receiver<Command>,
    cancel_token: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            biased;

            () = cancel_token.cancelled() => break,

            command = command_rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        tracing::debug!(?command, "Processing session command");
        let result = match command {
            Command::Start => session.start_session().await,
            Command::Send(text) => session.send_user_message(text).await,
            Command::Answer(answer) => session.answer_pending_focus_query(answer).await,
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "Session command rejected");
        }
    }

    session.close().await;
    tracing::info!("Session task stopped");
}
