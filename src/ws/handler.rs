//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::session::Session;

/// Outbound messages buffered per connection
const OUTBOUND_CAPACITY: usize = 128;

/// How long the writer may keep flushing after the reader has stopped
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_CAPACITY);

    // Spawn writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    let mut session = Session::new(connection_id, state.rooms.clone(), outbound_tx.clone());
    let rate_limiter = ConnectionRateLimiter::new(state.config.rooms.input_rate_limit);

    let mut join_grace = JoinGrace::new(state.config.rooms.join_grace);

    // Reader loop: WebSocket -> session
    loop {
        tokio::select! {
            verdict = join_grace.elapsed(&session), if join_grace.is_armed() => {
                if let Some(msg) = verdict {
                    warn!(connection_id = %connection_id, "No room joined within grace window, closing");
                    let _ = outbound_tx.send(msg).await;
                    break;
                }
            }
            frame = ws_stream.next() => {
                let Some(result) = frame else {
                    break;
                };
                match result {
                    Ok(Message::Text(text)) => {
                        if !rate_limiter.check_input() {
                            warn!(connection_id = %connection_id, "Rate limited client message");
                            let _ = outbound_tx
                                .try_send(ServerMsg::error("rate_limited", "Too many messages"));
                            continue;
                        }

                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(client_msg) => session.handle(client_msg).await,
                            Err(e) => {
                                warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                                let _ = outbound_tx
                                    .send(ServerMsg::error("bad_message", e.to_string()))
                                    .await;
                            }
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        warn!(connection_id = %connection_id, "Received binary message, ignoring");
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        info!(connection_id = %connection_id, "Client initiated close");
                        break;
                    }
                    Err(e) => {
                        error!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    let last_room = state.rooms.room_of(session.id());

    // Same cleanup path as an explicit leave
    session.disconnect();
    drop(outbound_tx);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer_handle)
        .await
        .is_err()
    {
        debug!(connection_id = %connection_id, "Writer did not drain in time");
    }

    info!(connection_id = %connection_id, room = ?last_room, "WebSocket connection closed");
}

/// One-shot deadline for a fresh connection to enter a room
struct JoinGrace {
    deadline: Pin<Box<Sleep>>,
    armed: bool,
}

impl JoinGrace {
    fn new(window: Duration) -> Self {
        Self {
            deadline: Box::pin(tokio::time::sleep(window)),
            armed: true,
        }
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    /// Wait out the window, then disarm. Yields the close message if the
    /// session is still outside every room.
    async fn elapsed(&mut self, session: &Session) -> Option<ServerMsg> {
        (&mut self.deadline).await;
        self.armed = false;
        (!session.in_room()).then(|| ServerMsg::error("join_timeout", "No room joined in time"))
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
