//! Aether terminal driver
//!
//! Reads user lines from stdin and prints the conversation as it grows.
//! Logs go to stderr as JSON.

use aether::config::AetherConfig;
use aether::llm::{GeminiService, LoggingService};
use aether::runtime::{Session, SessionEvent, SessionHandle};
use aether::state_machine::{Message, Sender};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const QUIT_COMMAND: &str = "/quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aether=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AetherConfig::from_env()?;
    let gemini = GeminiService::new(
        config.api_key.clone(),
        config.model.clone(),
        config.gateway.as_deref(),
    )?;
    tracing::info!(
        model = %config.model,
        gateway = ?config.gateway,
        timeout_secs = ?config.exchange_timeout.map(|t| t.as_secs()),
        "Configuration loaded"
    );

    let service = LoggingService::new(Arc::new(gemini));
    let handle = SessionHandle::spawn(Session::new(service, config.session_config()));
    let printer = tokio::spawn(print_events(BroadcastStream::new(handle.subscribe())));

    handle.start_session().await?;
    println!("Aether is listening. Type {QUIT_COMMAND} to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == QUIT_COMMAND {
            break;
        }
        if handle.state().pending_focus_query().is_some() {
            handle.answer_pending_focus_query(line).await?;
        } else if !line.is_empty() {
            handle.send_user_message(line).await?;
        }
    }

    handle.shutdown().await;
    printer.abort();
    Ok(())
}

async fn print_events(mut events: BroadcastStream<SessionEvent>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(SessionEvent::Message(message)) => print_message(&message),
            Ok(SessionEvent::FocusQuery(Some(query))) => {
                println!("\n? {}", query.summary());
                println!("  (answer on the next line, or press enter to dismiss)");
            }
            Ok(SessionEvent::Error(Some(error))) => eprintln!("! {error}"),
            Ok(SessionEvent::Loading(true)) => println!("..."),
            Ok(_) => {}
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Display fell behind the session");
            }
        }
    }
}

fn print_message(message: &Message) {
    if message.sender() == Sender::User {
        return;
    }
    match message.action() {
        Some(action) => println!("\n[{}]\n{}\n", action.kind(), action.summary()),
        None => println!("\n{}\n", message.text()),
    }
}
