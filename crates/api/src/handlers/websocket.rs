use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use domain::errors::DomainError;
use websocket::draft_room::{RoomRequest, RoomHandle};
use websocket::lobby_session::{LobbyHandle, LobbyRequest};
use websocket::messages::draft::{DraftAction, DraftClientFrame, DraftQuery, DraftServerFrame};
use websocket::messages::lobby::{LobbyClientMessage, LobbyServerMessage};
use websocket::emitter::OUTBOUND_BUFFER;

use crate::state::AppState;

/// Frames larger than this close the connection.
const MAX_FRAME_BYTES: usize = 512 * 1024;
/// Read deadline, refreshed by any inbound frame (pongs included).
const READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Server ping cadence, safely inside the read deadline.
const PING_PERIOD: Duration = Duration::from_secs(54);
/// Per-frame write deadline.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a fresh connection has to send its join frame.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

/// `GET /ws/draft?token=<token>`: authenticate, upgrade, and require a
/// `COMMAND join_room` as the first frame.
pub async fn draft_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = match state.auth.verify(&query.token).await {
        Ok(user_id) => user_id,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_draft_socket(socket, state, user_id))
}

/// `GET /ws/lobby?token=<token>`: authenticate, upgrade, and require a
/// `join_lobby` message as the first frame.
pub async fn lobby_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = match state.auth.verify(&query.token).await {
        Ok(user_id) => user_id,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_lobby_socket(socket, state, user_id))
}

async fn handle_draft_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    let Some(first) = first_frame(&mut stream).await else {
        return;
    };
    let (room, requested_side) = match serde_json::from_str::<DraftClientFrame>(&first) {
        Ok(DraftClientFrame::Command {
            action: DraftAction::JoinRoom { room_id, side },
            ..
        }) => match state.hub.draft_room(room_id) {
            Ok(room) => (room, side),
            Err(e) => {
                send_raw(&mut sink, &DraftServerFrame::err(e.code(), e.to_string())).await;
                return;
            }
        },
        Ok(_) => {
            let e = DomainError::InvalidPayload("first frame must be join_room".to_string());
            send_raw(&mut sink, &DraftServerFrame::err(e.code(), e.to_string())).await;
            return;
        }
        Err(e) => {
            send_raw(
                &mut sink,
                &DraftServerFrame::err("INVALID_PAYLOAD", e.to_string()),
            )
            .await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let local = outbound_tx.clone();
    if let Err(e) = room
        .join(connection_id, user_id, requested_side, outbound_tx)
        .await
    {
        send_raw(&mut sink, &DraftServerFrame::err(e.code(), e.to_string())).await;
        return;
    }
    info!(room_id = %room.id, connection_id = %connection_id, user_id = %user_id, "draft client connected");

    let write_task = tokio::spawn(write_loop(sink, outbound_rx));

    loop {
        match timeout(READ_TIMEOUT, stream.next()).await {
            Err(_) => {
                debug!(connection_id = %connection_id, "read deadline exceeded");
                break;
            }
            Ok(None) | Ok(Some(Err(_))) => break,
            Ok(Some(Ok(Message::Text(text)))) => {
                dispatch_draft_frame(text.as_str(), connection_id, &room, &local).await;
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            // Protocol pings are answered by the transport; pongs refresh
            // the deadline by arriving at all.
            Ok(Some(Ok(_))) => {}
        }
    }

    room.request(RoomRequest::Leave { connection_id }).await;
    write_task.abort();
    info!(room_id = %room.id, connection_id = %connection_id, "draft client disconnected");
}

async fn dispatch_draft_frame(
    text: &str,
    connection_id: Uuid,
    room: &RoomHandle,
    local: &mpsc::Sender<String>,
) {
    let frame = match serde_json::from_str::<DraftClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            reply_local(
                local,
                &DraftServerFrame::err("INVALID_PAYLOAD", e.to_string()),
            );
            return;
        }
    };
    let request = match frame {
        DraftClientFrame::Command { action, .. } => match action {
            DraftAction::JoinRoom { .. } => {
                let e = DomainError::InvalidState("already joined".to_string());
                reply_local(local, &DraftServerFrame::err(e.code(), e.to_string()));
                return;
            }
            DraftAction::SelectChampion { champion_id } => RoomRequest::Select {
                connection_id,
                champion_id,
            },
            DraftAction::LockIn => RoomRequest::LockIn { connection_id },
            DraftAction::HoverChampion { champion_id } => RoomRequest::Hover {
                connection_id,
                champion_id,
            },
            DraftAction::SetReady { ready } => RoomRequest::SetReady {
                connection_id,
                ready,
            },
            DraftAction::StartDraft => RoomRequest::StartDraft { connection_id },
            DraftAction::PauseDraft => RoomRequest::Pause { connection_id },
            DraftAction::ResumeReady { ready } => RoomRequest::ResumeReady {
                connection_id,
                ready,
            },
            DraftAction::ProposeEdit { slot, champion_id } => RoomRequest::ProposeEdit {
                connection_id,
                slot,
                champion_id,
            },
            DraftAction::RespondEdit { accept } => RoomRequest::RespondEdit {
                connection_id,
                accept,
            },
        },
        DraftClientFrame::Query {
            query: DraftQuery::SyncState,
            ..
        } => RoomRequest::SyncState { connection_id },
    };
    room.request(request).await;
}

async fn handle_lobby_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    let Some(first) = first_frame(&mut stream).await else {
        return;
    };
    let lobby = match serde_json::from_str::<LobbyClientMessage>(&first) {
        Ok(LobbyClientMessage::JoinLobby { lobby_id }) => match state.hub.lobby(lobby_id) {
            Ok(lobby) => lobby,
            Err(e) => {
                send_raw(&mut sink, &LobbyServerMessage::error(e.code(), e.to_string())).await;
                return;
            }
        },
        Ok(_) => {
            let e = DomainError::InvalidPayload("first frame must be join_lobby".to_string());
            send_raw(&mut sink, &LobbyServerMessage::error(e.code(), e.to_string())).await;
            return;
        }
        Err(e) => {
            send_raw(
                &mut sink,
                &LobbyServerMessage::error("INVALID_PAYLOAD", e.to_string()),
            )
            .await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let local = outbound_tx.clone();
    if let Err(e) = lobby.join(connection_id, user_id, outbound_tx).await {
        send_raw(&mut sink, &LobbyServerMessage::error(e.code(), e.to_string())).await;
        return;
    }
    info!(lobby_id = %lobby.id, connection_id = %connection_id, user_id = %user_id, "lobby client connected");

    let write_task = tokio::spawn(write_loop(sink, outbound_rx));

    loop {
        match timeout(READ_TIMEOUT, stream.next()).await {
            Err(_) => {
                debug!(connection_id = %connection_id, "read deadline exceeded");
                break;
            }
            Ok(None) | Ok(Some(Err(_))) => break,
            Ok(Some(Ok(Message::Text(text)))) => {
                dispatch_lobby_frame(text.as_str(), connection_id, &lobby, &local).await;
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(_))) => {}
        }
    }

    lobby.request(LobbyRequest::Disconnect { connection_id }).await;
    write_task.abort();
    info!(lobby_id = %lobby.id, connection_id = %connection_id, "lobby client disconnected");
}

async fn dispatch_lobby_frame(
    text: &str,
    connection_id: Uuid,
    lobby: &LobbyHandle,
    local: &mpsc::Sender<String>,
) {
    let message = match serde_json::from_str::<LobbyClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            reply_local(
                local,
                &LobbyServerMessage::error("INVALID_PAYLOAD", e.to_string()),
            );
            return;
        }
    };
    let request = match message {
        LobbyClientMessage::JoinLobby { .. } => {
            let e = DomainError::InvalidState("already joined".to_string());
            reply_local(local, &LobbyServerMessage::error(e.code(), e.to_string()));
            return;
        }
        LobbyClientMessage::LeaveLobby => LobbyRequest::LeaveLobby { connection_id },
        LobbyClientMessage::SetReady { ready } => LobbyRequest::SetReady {
            connection_id,
            ready,
        },
        LobbyClientMessage::ToggleVote { option_number } => LobbyRequest::ToggleVote {
            connection_id,
            option_number,
        },
        LobbyClientMessage::EndVoting { force_option } => LobbyRequest::EndVoting {
            connection_id,
            force_option,
        },
        LobbyClientMessage::TakeCaptain => LobbyRequest::TakeCaptain { connection_id },
        LobbyClientMessage::PromoteCaptain { target_user_id } => LobbyRequest::PromoteCaptain {
            connection_id,
            target_user_id,
        },
        LobbyClientMessage::KickPlayer { target_user_id } => LobbyRequest::Kick {
            connection_id,
            target_user_id,
        },
        LobbyClientMessage::ProposeAction { action } => LobbyRequest::Propose {
            connection_id,
            proposal: action,
        },
        LobbyClientMessage::ApproveAction { action_id } => LobbyRequest::Approve {
            connection_id,
            action_id,
        },
        LobbyClientMessage::CancelAction { action_id } => LobbyRequest::Cancel {
            connection_id,
            action_id,
        },
        LobbyClientMessage::SyncState => LobbyRequest::SyncState { connection_id },
        LobbyClientMessage::Ping => LobbyRequest::Ping { connection_id },
    };
    lobby.request(request).await;
}

/// Drain the session's outbound buffer into the socket, interleaving the
/// keepalive pings. Ends when the session closes the channel or a write
/// fails or times out.
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<String>) {
    let mut ping = interval(PING_PERIOD);
    ping.tick().await;
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(json) = frame else { break };
                match timeout(WRITE_TIMEOUT, sink.send(Message::Text(json.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "write failed, closing");
                        break;
                    }
                    Err(_) => {
                        warn!("write deadline exceeded, closing");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match timeout(WRITE_TIMEOUT, sink.send(Message::Ping(Default::default()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }
    let _ = sink.close().await;
}

/// Wait for the first text frame of a fresh connection.
async fn first_frame(stream: &mut SplitStream<WebSocket>) -> Option<String> {
    match timeout(FIRST_FRAME_TIMEOUT, async {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    })
    .await
    {
        Ok(first) => first,
        Err(_) => None,
    }
}

/// Direct send for pre-admission errors, before the write loop exists.
async fn send_raw<T: serde::Serialize>(sink: &mut SplitSink<WebSocket, Message>, frame: &T) {
    let json = serde_json::to_string(frame).unwrap_or_else(|_| {
        json!({"type": "error", "code": "INTERNAL", "message": "serialization failed"}).to_string()
    });
    let _ = sink.send(Message::Text(json.into())).await;
}

/// Best-effort local error reply through the client's own outbound buffer.
fn reply_local<T: serde::Serialize>(local: &mpsc::Sender<String>, frame: &T) {
    if let Ok(json) = serde_json::to_string(frame) {
        let _ = local.try_send(json);
    }
}
