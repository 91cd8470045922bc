//! WebSocket upgrade handler - live race feed

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::verify_token;
use crate::race::ParticipantId;
use crate::util::rate_limit::{create_limiter, FEED_MESSAGE_RATE_LIMIT};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer token for authentication
    pub token: String,
    /// Only forward updates for this match
    #[serde(default)]
    pub match_id: Option<Uuid>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify token before upgrading
    match verify_token(&query.token, &state.config.token_secret) {
        Ok(claims) => {
            info!(participant = %claims.sub, match_id = ?query.match_id, "WebSocket upgrade for authenticated participant");
            ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, query.match_id, state))
        }
        Err(e) => {
            warn!(error = %e, "WebSocket auth failed");
            e.into_response()
        }
    }
}

/// Forward feed updates that pass the current filter
fn wanted(filter: Option<Uuid>, msg: &ServerMsg) -> bool {
    match (filter, msg.match_id()) {
        (Some(wanted), Some(id)) => wanted == id,
        _ => true,
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, participant: ParticipantId, filter: Option<Uuid>, state: AppState) {
    info!(participant = %participant, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        participant,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(participant = %participant, error = %e, "Failed to send welcome");
        return;
    }

    let mut feed_rx = state.feed.subscribe();
    let rate_limiter = create_limiter(FEED_MESSAGE_RATE_LIMIT);
    let mut filter = filter;

    loop {
        tokio::select! {
            update = feed_rx.recv() => match update {
                Ok(msg) => {
                    if !wanted(filter, &msg) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(participant = %participant, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(participant = %participant, lagged_count = n, "Client lagged, skipping {} updates", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(participant = %participant, "Feed closed");
                    break;
                }
            },
            incoming = ws_stream.next() => {
                let reply = match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if rate_limiter.check().is_err() {
                            warn!(participant = %participant, "Rate limited feed message");
                            continue;
                        }
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(ClientMsg::Watch { match_id }) => {
                                debug!(participant = %participant, match_id = ?match_id, "Feed filter changed");
                                filter = match_id;
                                None
                            }
                            Ok(ClientMsg::Ping { t }) => Some(ServerMsg::Pong { t }),
                            Err(e) => {
                                warn!(participant = %participant, error = %e, "Failed to parse client message");
                                Some(ServerMsg::Error {
                                    code: "bad_message".to_string(),
                                    message: e.to_string(),
                                })
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(participant = %participant, "Received binary message, ignoring");
                        None
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => None,
                    Some(Ok(Message::Close(_))) | None => {
                        info!(participant = %participant, "Client initiated close");
                        break;
                    }
                    Some(Err(e)) => {
                        error!(participant = %participant, error = %e, "WebSocket error");
                        break;
                    }
                };

                if let Some(reply) = reply {
                    if let Err(e) = send_msg(&mut ws_sink, &reply).await {
                        debug!(participant = %participant, error = %e, "WebSocket send failed");
                        break;
                    }
                }
            }
        }
    }

    info!(participant = %participant, "WebSocket connection closed");
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_only_narrows_race_updates() {
        let id = Uuid::new_v4();
        let pong = ServerMsg::Pong { t: 1 };
        assert!(wanted(Some(id), &pong));
        assert!(wanted(None, &pong));

        let update = ServerMsg::RaceUpdate {
            match_id: Uuid::new_v4(),
            tick: 1,
            participants: [
                crate::store::ParticipantLabel::placeholder(ParticipantId(1)),
                crate::store::ParticipantLabel::placeholder(ParticipantId(2)),
            ],
            events: Vec::new(),
            lines: Vec::new(),
            emitted_at: chrono::Utc::now(),
        };
        assert!(!wanted(Some(id), &update));
        assert!(wanted(None, &update));
        assert!(wanted(update.match_id(), &update));
    }
}
