use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

use super::relay;
use crate::{
    error::{ProxyError, Result},
    proxy::{AccessToken, ProxyState},
    session::{ClientSession, SessionError, UpstreamResponse},
};

#[derive(Debug, Deserialize)]
pub struct SendPath {
    pub room_id: String,
    pub event_type: String,
    pub txnid: String,
}

pub async fn send_message(
    path: web::Path<SendPath>,
    body: web::Bytes,
    token: AccessToken,
    state: web::Data<ProxyState>,
) -> Result<HttpResponse> {
    let entry = state.authorized_session(&token)?;
    let content: Value = serde_json::from_slice(&body).map_err(|_| ProxyError::NotJson)?;

    let _guard = entry.lock().await;
    let response = send_with_recovery(
        entry.session(),
        &path.room_id,
        &path.event_type,
        &content,
        &path.txnid,
    )
    .await?;

    Ok(relay(response))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendStep {
    /// `recovered` is set once a group session has been shared for this send.
    Sending { recovered: bool },
    Establishing,
}

/// Sends the event, sharing a group session and retrying once if the room
/// has none. A second failure of any kind is returned as-is.
pub async fn send_with_recovery(
    session: &dyn ClientSession,
    room_id: &str,
    event_type: &str,
    content: &Value,
    txn_id: &str,
) -> std::result::Result<UpstreamResponse, SessionError> {
    let mut step = SendStep::Sending { recovered: false };

    loop {
        step = match step {
            SendStep::Sending { recovered } => {
                match session.send(room_id, event_type, content, txn_id).await {
                    Ok(response) => return Ok(response),
                    Err(SessionError::NoGroupSession { .. }) if !recovered => {
                        SendStep::Establishing
                    }
                    Err(err) => return Err(err),
                }
            }
            SendStep::Establishing => {
                log::info!("Sharing a new group session for room {}", room_id);
                session.share_group_session(room_id).await?;
                SendStep::Sending { recovered: true }
            }
        };
    }
}
