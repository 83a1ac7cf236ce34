//! WebSocket handler for the realtime lifecycle channel.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::handlers::AppState;
use super::types::WsClientMessage;
use crate::notify::{self, challenge_to_data_url, BridgeEvent, SessionEntry};

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_event(sink: &mut SplitSink<WebSocket, Message>, event: &BridgeEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "failed to serialize event");
            true
        }
    }
}

/// Handle one realtime subscriber.
///
/// The subscriber gets a snapshot of all known sessions on join, then
/// every broadcast event, interleaved with responses to its own commands.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before the snapshot so no event between the two is lost.
    let mut events = state.bus.subscribe();

    let snapshot = BridgeEvent::Sessions {
        sessions: state
            .registry
            .list()
            .into_iter()
            .map(|view| SessionEntry {
                session_id: view.session_id,
                user: view.identity,
            })
            .collect(),
    };
    if !send_event(&mut sink, &snapshot).await {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !send_event(&mut sink, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(&text, &mut sink, &state).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket receive error");
                    break;
                }
            },
        }
    }
}

async fn handle_client_message(
    text: &str,
    sink: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
) {
    let message: WsClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            let log = BridgeEvent::Log {
                message: format!("unrecognized command: {e}"),
            };
            send_event(sink, &log).await;
            return;
        }
    };

    match message {
        WsClientMessage::StartSession { session_id } => {
            if !state.supervisor.start(&session_id) {
                debug!(session_id, "start-session ignored, attempt already active");
            }
        }
        WsClientMessage::GetQr { session_id } => {
            let challenge = state
                .registry
                .get(&session_id)
                .and_then(|view| view.last_qr);
            match challenge {
                Some(challenge) => match challenge_to_data_url(&challenge) {
                    Ok(url) => {
                        send_event(sink, &BridgeEvent::Qr {
                            session_id: session_id.clone(),
                            url,
                        })
                        .await;
                        send_event(sink, &BridgeEvent::Log {
                            message: format!(
                                "QR received for session {session_id}, scan to authenticate"
                            ),
                        })
                        .await;
                    }
                    Err(e) => warn!(session_id, error = %e, "failed to render QR challenge"),
                },
                None => {
                    send_event(sink, &BridgeEvent::Log {
                        message: "waiting for QR generation...".into(),
                    })
                    .await;
                }
            }
        }
        WsClientMessage::CheckStatus { session_id } => {
            if state.registry.is_live(&session_id) {
                send_event(sink, &BridgeEvent::QrStatus {
                    session_id: session_id.clone(),
                    status: notify::QR_STATUS_CONNECTED.into(),
                })
                .await;
                if let Some(identity) =
                    state.registry.get(&session_id).and_then(|view| view.identity)
                {
                    send_event(sink, &BridgeEvent::User {
                        session_id,
                        user: identity,
                    })
                    .await;
                }
            } else if let Some(challenge) = state
                .registry
                .get(&session_id)
                .and_then(|view| view.last_qr)
            {
                if let Ok(url) = challenge_to_data_url(&challenge) {
                    send_event(sink, &BridgeEvent::Qr { session_id, url }).await;
                }
            } else {
                send_event(sink, &BridgeEvent::QrStatus {
                    session_id,
                    status: notify::QR_STATUS_LOADING.into(),
                })
                .await;
            }
        }
    }
}
