use axum::{
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket},
    },
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;

use crate::{
    common::state::AppState,
    errors::{Error, Result},
    models::{auth::authenticate_token, submission::SubmissionStatus},
};

/// Close code sent when the token is missing or invalid.
const AUTH_FAILURE_CODE: u16 = 4001;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Live status stream for one submission.
///
/// The snapshot is delivered first so a late-joining viewer catches up, then
/// channel messages are forwarded until a terminal status goes by.
pub async fn submission_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(submission_id): Path<i64>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, submission_id, query.token))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, submission_id: i64, token: String) {
    if authenticate_token(&token, &state.config.jwt_keys.decoding).is_err() {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: AUTH_FAILURE_CODE,
                reason: "invalid token".into(),
            })))
            .await;
        return;
    }

    if let Err(e) = stream_status(&mut socket, &state, submission_id).await {
        tracing::debug!(submission_id, error = %e, "Viewer stream ended with error");
    }

    let _ = socket.send(Message::Close(None)).await;
}

async fn stream_status(
    socket: &mut WebSocket,
    state: &AppState,
    submission_id: i64,
) -> Result<()> {
    // Cached snapshot first, so viewers joining mid-judge see the latest
    // state before live messages start flowing.
    if let Some(snapshot) = state.status_channel.snapshot(submission_id).await? {
        let terminal = is_terminal_payload(&snapshot);
        socket
            .send(Message::Text(snapshot.into()))
            .await
            .map_err(|_| Error::InternalError)?;
        if terminal {
            return Ok(());
        }
    }

    let mut updates = state.status_channel.subscribe(submission_id).await?;

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(payload) = update else { break };
                let terminal = is_terminal_payload(&payload);
                socket
                    .send(Message::Text(payload.into()))
                    .await
                    .map_err(|_| Error::InternalError)?;
                // Nothing follows a terminal status on this channel.
                if terminal {
                    break;
                }
            }
            incoming = socket.recv() => {
                // Client went away: drop the subscription promptly. Judging
                // is unaffected.
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    Ok(())
}

/// True when a published payload carries a terminal submission status.
fn is_terminal_payload(payload: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| {
            v.get("status")
                .and_then(|s| s.as_str())
                .map(SubmissionStatus::is_terminal_name)
        })
        .unwrap_or(false)
}
