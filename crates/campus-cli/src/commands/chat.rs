//! Realtime chat command.
//!
//! Prints recent history for the dialog, then bridges stdin lines to
//! outbound frames and inbound frames to the terminal. Frames for other
//! dialogs are dropped here: routing is by dialog id, not arrival order.

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use campus_client::Session;
use campus_core::{ChatMessage, OutgoingMessage};

pub async fn run(session: &Session, dialog_id: i64) -> Result<()> {
    if session.current_user().await.is_none() {
        anyhow::bail!("Not logged in; run `campus login` first");
    }

    let history = session
        .messages(dialog_id, 0, 50)
        .await
        .context("Failed to fetch dialog history")?;
    for message in &history {
        print_message(message);
    }

    let mut channel = session.chat();
    let sender = channel.sender();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", "Connected. Type a message and press enter.".dimmed());

    loop {
        tokio::select! {
            inbound = channel.next() => match inbound {
                Some(Ok(message)) if message.dialog_id == dialog_id => {
                    print_message(&message);
                }
                Some(Ok(_)) => {
                    // Message for another dialog.
                }
                Some(Err(err)) => {
                    warn!(error = %err, "chat channel error");
                }
                None => {
                    println!("{}", "Chat channel closed.".yellow());
                    break;
                }
            },
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        sender
                            .send(OutgoingMessage::new(dialog_id, text))
                            .await
                            .context("Failed to send message")?;
                    }
                }
                None => break,
            },
        }
    }

    Ok(())
}

fn print_message(message: &ChatMessage) {
    let time = message
        .created_at
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();
    let sender = message
        .sender_id
        .map(|id| format!("user {}", id))
        .unwrap_or_else(|| "unknown".to_string());

    println!(
        "{} {} {}",
        time.dimmed(),
        format!("{}:", sender).cyan(),
        message.content
    );
}
