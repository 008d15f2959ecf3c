//! WebSocket upgrade handler for conversation sessions

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::{ClientMsg, ServerMsg};
use super::{run_accepted_turn, ConversationStatus, TurnContext};
use crate::app::AppState;
use crate::http::error::AppError;
use crate::http::middleware::verify_jwt;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
}

/// WebSocket upgrade handler
pub async fn conversation_ws_handler(
    ws: WebSocketUpgrade,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    let claims = match verify_jwt(&query.token, &state.config.supabase_jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            return AppError::Unauthorized.into_response();
        }
    };

    let user_id = claims.sub;
    let Some(session) = state.conversations.get(conversation_id, user_id) else {
        return AppError::NotFound("Conversation not found".to_string()).into_response();
    };

    info!(user_id = %user_id, conversation_id = %conversation_id, "WebSocket upgrade for conversation");
    let ctx = state.turn_context();
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, conversation_id, session.avatar_id, ctx))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    user_id: Uuid,
    conversation_id: Uuid,
    avatar_id: Uuid,
    ctx: TurnContext,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(32);

    let welcome = ServerMsg::Welcome {
        conversation_id,
        avatar_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    // Writer task: outgoing frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conversation_id = %conversation_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: WebSocket -> conversation turns
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(user_id = %user_id, "Rate limited conversation message");
                    let _ = out_tx
                        .send(ServerMsg::Error {
                            message: "Too many messages, slow down".to_string(),
                        })
                        .await;
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::UserMessage { text, voice }) => {
                        start_turn(&ctx, user_id, conversation_id, text, voice, out_tx.clone()).await;
                    }
                    Ok(ClientMsg::Ping { t }) => {
                        let _ = out_tx
                            .send(ServerMsg::Pong {
                                t,
                                server_time: unix_millis(),
                            })
                            .await;
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    drop(out_tx);
    let _ = writer_handle.await;

    info!(user_id = %user_id, conversation_id = %conversation_id, "WebSocket connection closed");
}

/// Accept a turn and run it in the background, streaming status frames
async fn start_turn(
    ctx: &TurnContext,
    user_id: Uuid,
    conversation_id: Uuid,
    text: String,
    voice: bool,
    out_tx: mpsc::Sender<ServerMsg>,
) {
    if !ctx.chat_limiter.check(user_id) {
        warn!(user_id = %user_id, conversation_id = %conversation_id, "Chat rate limit exceeded");
        let _ = out_tx
            .send(ServerMsg::Error {
                message: "Too many requests, try again shortly".to_string(),
            })
            .await;
        return;
    }

    let turn = match ctx.conversations.begin_turn(conversation_id, user_id) {
        Ok(turn) => turn,
        Err(e) => {
            let _ = out_tx.send(ServerMsg::Error { message: e.to_string() }).await;
            return;
        }
    };

    let _ = out_tx
        .send(ServerMsg::Status {
            status: ConversationStatus::Processing,
        })
        .await;

    let ctx = ctx.clone();
    tokio::spawn(async move {
        match run_accepted_turn(&ctx, user_id, turn, &text, voice).await {
            Ok(outcome) => {
                let _ = out_tx
                    .send(ServerMsg::Reply {
                        text: outcome.reply,
                        audio_base64: outcome.audio_base64,
                        memories_used: outcome.memories_used,
                    })
                    .await;
                let _ = out_tx
                    .send(ServerMsg::Status {
                        status: ConversationStatus::Idle,
                    })
                    .await;
            }
            Err(e) => {
                let _ = out_tx.send(ServerMsg::Error { message: e.to_string() }).await;
                let _ = out_tx
                    .send(ServerMsg::Status {
                        status: ConversationStatus::Error,
                    })
                    .await;
            }
        }
    });
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
