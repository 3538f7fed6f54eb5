use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::activity::ActivityTracker;
use crate::error::RelayError;
use crate::participant::ParticipantId;
use crate::relay_loop::RelayCommand;
use proxcast_shared::protocol::{ClientMsg, ServerMsg};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub relay_tx: mpsc::Sender<RelayCommand>,
    pub activity: Arc<ActivityTracker>,
    pub connection_semaphore: Arc<Semaphore>,
    pub max_message_bytes: usize,
    pub max_parse_errors: u32,
    pub outbound_capacity: usize,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(app_state): State<AppState>,
) -> Response {
    let permit = match app_state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Connection limit reached, rejecting {}", addr);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    ws.max_message_size(app_state.max_message_bytes)
        .on_upgrade(move |socket| async move {
            handle_socket(socket, addr, app_state).await;
            drop(permit);
        })
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMsg>(app_state.outbound_capacity);

    let my_id = match join(&app_state, addr, outbound_tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Failed to register connection from {}: {}", addr, e);
            return;
        }
    };

    tracing::info!("Participant {} connected from {}", my_id, addr);

    let mut parse_errors: u32 = 0;

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        app_state.activity.touch(my_id);
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(ClientMsg::Ping) => {
                                if send_msg(&mut sink, &ServerMsg::Pong).await.is_err() {
                                    break;
                                }
                            }
                            Ok(client_msg) => {
                                let Some(cmd) = RelayCommand::from_client(my_id, client_msg) else {
                                    continue;
                                };
                                if app_state.relay_tx.send(cmd).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                parse_errors += 1;
                                tracing::debug!("Participant {} sent invalid message: {}", my_id, e);
                                if parse_errors >= app_state.max_parse_errors {
                                    tracing::warn!(
                                        "Participant {} sent {} invalid messages, closing",
                                        my_id,
                                        parse_errors
                                    );
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        // Also raised for messages over max_message_size
                        tracing::warn!("Participant {} socket error: {}", my_id, e);
                        break;
                    }
                    Some(Ok(_)) => app_state.activity.touch(my_id),
                }
            }

            // Server -> Client
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if let Err(e) = send_msg(&mut sink, &msg).await {
                            tracing::debug!("Participant {} send failed: {}", my_id, e);
                            break;
                        }
                    }
                    None => {
                        // Removed by the relay loop
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    // No-op if the relay loop already removed us
    let _ = app_state
        .relay_tx
        .send(RelayCommand::Leave { id: my_id })
        .await;
    // Late touches after teardown would otherwise leave a stale record
    app_state.activity.remove(my_id);
    tracing::info!("Participant {} disconnected", my_id);
}

async fn join(
    app_state: &AppState,
    addr: SocketAddr,
    outbound: mpsc::Sender<ServerMsg>,
) -> Result<ParticipantId, RelayError> {
    let (resp_tx, resp_rx) = oneshot::channel();
    app_state
        .relay_tx
        .send(RelayCommand::Join {
            addr,
            outbound,
            response: resp_tx,
        })
        .await
        .map_err(|_| RelayError::LoopClosed)?;
    resp_rx.await.map_err(|_| RelayError::LoopClosed)
}

async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), RelayError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}
