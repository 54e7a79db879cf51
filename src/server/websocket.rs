//! Render loop for one viewer.
//!
//! While a reply is streaming the loop only ticks the session and pushes
//! each visible change; client frames are read again once the session is
//! idle, which is also when the viewer's input and rating controls are live.

use crate::dataset::DatasetStore;
use crate::history::ConversationLog;
use crate::llm::chat::ChatClient;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::{ ChatSession, RateOutcome, SessionSettings, TickOutcome };

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error, debug };
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };
use uuid::Uuid;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

type WsSink<S> = SplitSink<WebSocketStream<S>, Message>;

async fn send<S>(tx: &mut WsSink<S>, msg: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

async fn send_error<S>(tx: &mut WsSink<S>, message: impl Into<String>) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    send(tx, &(ServerMessage::Error { message: message.into() })).await
}

/// Pushes whatever a tick changed to the viewer.
async fn render_tick<S>(
    tx: &mut WsSink<S>,
    log: &ConversationLog,
    outcome: &TickOutcome
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    if outcome.changed_log() {
        if let Some(last) = log.last() {
            send(tx, &ServerMessage::from_chat(log.len() - 1, last)).await?;
        }
    }
    if let TickOutcome::Failed(e) = outcome {
        send_error(tx, format!("Response interrupted: {}", e)).await?;
    }
    if outcome.ended_stream() {
        send(tx, &(ServerMessage::Streaming { active: false })).await?;
    }
    Ok(())
}

async fn handle_client_message<S>(
    tx: &mut WsSink<S>,
    session: &mut ChatSession,
    message: ClientMessage
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    match message {
        ClientMessage::Chat { content } => {
            if content.trim().is_empty() {
                return send_error(tx, "Message is empty").await;
            }
            match session.submit(content) {
                Ok(index) => {
                    let log = session.chat_log();
                    for i in index..log.len() {
                        if let Some(message) = log.get(i) {
                            send(tx, &ServerMessage::from_chat(i, message)).await?;
                        }
                    }
                    send(tx, &(ServerMessage::Streaming { active: true })).await
                }
                Err(e) => send_error(tx, e.to_string()).await,
            }
        }
        ClientMessage::Rate { thumbs_up } => {
            match session.rate(thumbs_up).await {
                Ok(RateOutcome::Saved(path)) => {
                    let sample = Some(path.display().to_string());
                    send(tx, &(ServerMessage::Rated { thumbs_up, sample })).await
                }
                Ok(RateOutcome::AlreadyRated(existing)) => {
                    send(tx, &(ServerMessage::Rated { thumbs_up: existing, sample: None })).await
                }
                Ok(RateOutcome::NothingToSave) => send_error(tx, "Nothing to rate yet").await,
                Err(e) => {
                    error!("Rating failed: {}", e);
                    send_error(tx, e.to_string()).await
                }
            }
        }
        ClientMessage::ToggleCopy => {
            let visible = session.toggle_copy_view();
            let transcript = if visible { session.chat_log().transcript() } else { String::new() };
            send(tx, &(ServerMessage::CopyView { visible, transcript })).await
        }
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    client: Arc<dyn ChatClient>,
    dataset: Arc<dyn DatasetStore>,
    settings: SessionSettings
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);

    let (mut tx, mut rx) = websocket.split();
    let session_id = Uuid::new_v4().to_string();
    let mut session = ChatSession::new(client, dataset, settings);
    info!("Assigned session ID {} to {}", session_id, peer);

    loop {
        if session.is_streaming() {
            let outcome = session.tick().await;
            if let Err(e) = render_tick(&mut tx, session.chat_log(), &outcome).await {
                error!("Error rendering to {}: {}", peer, e);
                break;
            }
            continue;
        }

        let Some(msg) = rx.next().await else {
            break;
        };

        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            if send_error(&mut tx, "Message too large").await.is_err() {
                error!("Failed to send size limit error to {}", peer);
            }
            break;
        }

        let result = match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        debug!("Session {} received {:?}", session_id, client_msg);
                        handle_client_message(&mut tx, &mut session, client_msg).await
                    }
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        send_error(&mut tx, format!("Failed to parse message: {}", e)).await
                    }
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                tx.send(Message::Pong(ping_data)).await
                    .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)
            }
            Message::Pong(_) => Ok(()),
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
                Ok(())
            }
            Message::Frame(_) => Ok(()),
        };

        if let Err(e) = result {
            error!("Error sending to {}: {}", peer, e);
            break;
        }
    }
    info!("WebSocket connection closed for {} (Session ID: {})", peer, session_id);
}
