//! Realtime chat channel.
//!
//! Opens the `/ws/chat` WebSocket with the current access token as a
//! query parameter (the handshake cannot carry custom headers from a
//! browser client) and keeps it open: on drop it reconnects with capped
//! exponential backoff, re-reading the token from the credential store
//! on every attempt, and stops for good once the store holds no session.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use campus_core::{ApiUrl, ChatMessage, OutgoingMessage, Result, TransportError};

use crate::store::CredentialStore;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle for sending chat messages over the active connection.
#[derive(Debug, Clone)]
pub struct ChatSender {
    outbound: mpsc::Sender<OutgoingMessage>,
}

impl ChatSender {
    /// Queue a message for delivery.
    ///
    /// # Errors
    ///
    /// Fails if the channel has shut down (session ended or the
    /// [`ChatChannel`] was dropped).
    pub async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.outbound.send(message).await.map_err(|_| {
            TransportError::Connection {
                message: "chat channel closed".to_string(),
            }
            .into()
        })
    }
}

/// A live chat channel: a stream of inbound messages plus a sender.
///
/// Messages arrive in network order. Route them to a conversation by
/// [`ChatMessage::dialog_id`], never by arrival order.
#[derive(Debug)]
pub struct ChatChannel {
    inbound: mpsc::Receiver<Result<ChatMessage>>,
    outbound: mpsc::Sender<OutgoingMessage>,
}

impl ChatChannel {
    /// Open the channel, spawning the connection supervisor.
    ///
    /// The supervisor reads the access token from `store` before every
    /// connection attempt and exits once the store reports no session.
    pub fn connect(base: ApiUrl, store: Arc<CredentialStore>) -> Self {
        let (in_tx, in_rx) = mpsc::channel(100);
        let (out_tx, out_rx) = mpsc::channel(16);

        tokio::spawn(run_channel(base, store, in_tx, out_rx));

        Self {
            inbound: in_rx,
            outbound: out_tx,
        }
    }

    /// Receive the next inbound message, or `None` once the channel has
    /// shut down.
    pub async fn next(&mut self) -> Option<Result<ChatMessage>> {
        self.inbound.recv().await
    }

    /// Returns a cloneable sender for outbound messages.
    pub fn sender(&self) -> ChatSender {
        ChatSender {
            outbound: self.outbound.clone(),
        }
    }

    /// Convert the inbound side into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<ChatMessage>> + Send {
        ReceiverStream::new(self.inbound)
    }
}

/// Connection supervisor: connect, run, back off, repeat.
async fn run_channel(
    base: ApiUrl,
    store: Arc<CredentialStore>,
    events: mpsc::Sender<Result<ChatMessage>>,
    mut outbound: mpsc::Receiver<OutgoingMessage>,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        // Re-resolve the token each attempt; a refresh may have rotated
        // it, and a logout means there is nothing left to connect as.
        let Some(pair) = store.get() else {
            info!("no active session, closing chat channel");
            break;
        };

        let url = base.ws_chat_url(pair.access.as_str());
        match connect_async(&url).await {
            Ok((ws, _)) => {
                debug!("chat websocket connected");
                backoff = INITIAL_BACKOFF;
                if run_connection(ws, &events, &mut outbound).await.is_break() {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "chat connection failed");
            }
        }

        if events.is_closed() {
            break;
        }

        debug!(delay_ms = backoff.as_millis() as u64, "reconnecting after delay");
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

/// Pump one live connection. `Break` means the consumer is gone and the
/// supervisor should stop; `Continue` means the connection dropped and a
/// reconnect is in order.
async fn run_connection(
    ws: WsStream,
    events: &mpsc::Sender<Result<ChatMessage>>,
    outbound: &mut mpsc::Receiver<OutgoingMessage>,
) -> ControlFlow<()> {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ChatMessage>(&text) {
                        Ok(frame) => {
                            if events.send(Ok(frame)).await.is_err() {
                                return ControlFlow::Break(());
                            }
                        }
                        Err(err) => {
                            trace!(error = %err, "ignoring unparseable frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!("received ping");
                    if let Err(err) = write.send(Message::Pong(data)).await {
                        warn!(error = %err, "failed to send pong");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "chat websocket closed by server");
                    return ControlFlow::Continue(());
                }
                Some(Ok(_)) => {
                    // Binary, pong and raw frames are not part of the
                    // chat protocol.
                }
                Some(Err(err)) => {
                    warn!(error = %err, "chat websocket error");
                    return ControlFlow::Continue(());
                }
                None => return ControlFlow::Continue(()),
            },
            frame = outbound.recv() => match frame {
                Some(message) => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %err, "dropping unserializable outbound message");
                            continue;
                        }
                    };
                    if write.send(Message::Text(text.into())).await.is_err() {
                        return ControlFlow::Continue(());
                    }
                }
                None => return ControlFlow::Break(()),
            },
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
