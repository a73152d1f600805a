use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use skillswap_rules::chat::room_key;
use skillswap_types::api::{ChatHistoryResponse, Claims, SendMessageRequest};
use skillswap_types::events::GatewayEvent;
use skillswap_types::models::ChatMessage;

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};

const MAX_MESSAGE_LEN: usize = 2000;

/// GET /chats/{peer_id}/messages: the shared room's history, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<Uuid>,
) -> ApiResult<Json<ChatHistoryResponse>> {
    let key = resolve_room(&state, claims.sub, peer_id).await?;

    let lookup = key.clone();
    let rows = state.blocking(move |db| db.get_messages(&lookup)).await?;

    Ok(Json(ChatHistoryResponse {
        room_key: key,
        messages: rows.into_iter().map(convert::message).collect(),
    }))
}

/// POST /chats/{peer_id}/messages: append to the shared room and push it
/// to subscribers of that room.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::validation("Message is empty"));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation(format!(
            "Message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }

    let key = resolve_room(&state, claims.sub, peer_id).await?;

    let message_id = Uuid::new_v4();
    let now = chrono::Utc::now().timestamp_micros();
    let (mid, room, sender, body) = (
        message_id.to_string(),
        key.clone(),
        claims.sub.to_string(),
        text.clone(),
    );
    let stamped = state
        .blocking(move |db| db.insert_message(&mid, &room, &sender, &body, now))
        .await?;

    let message = ChatMessage {
        id: message_id,
        room_key: key,
        sender_id: claims.sub,
        text,
        timestamp: convert::micros_timestamp(stamped),
    };

    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        message: message.clone(),
    });

    Ok((StatusCode::CREATED, Json(message)))
}

/// Room key for `me` and `peer`, after checking the peer is a real user
/// other than `me`.
async fn resolve_room(state: &AppState, me: Uuid, peer: Uuid) -> ApiResult<String> {
    if me == peer {
        return Err(ApiError::validation("You cannot message yourself"));
    }

    let id = peer.to_string();
    let exists = state
        .blocking(move |db| Ok(db.get_user_by_id(&id)?.is_some()))
        .await?;
    if !exists {
        return Err(ApiError::NotFound("user"));
    }

    Ok(room_key(&me.to_string(), &peer.to_string()))
}
