use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use skillswap_rules::chat::{is_participant, room_key};
use skillswap_types::api::Claims;
use skillswap_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket may take to send `Identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type RoomSet = Arc<RwLock<HashSet<String>>>;

/// Receivers registered for one identified connection.
struct Channels {
    conn_id: Uuid,
    user_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    broadcast_rx: broadcast::Receiver<GatewayEvent>,
}

/// Handle a single WebSocket connection: Identify handshake, Ready, then
/// the event loop until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let Some((user_id, email)) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };

    info!("{} ({}) connected to gateway", email, user_id);

    // Listen before Ready goes out so nothing published after it is missed.
    let (conn_id, user_rx) = dispatcher.register_user_channel(user_id).await;
    let broadcast_rx = dispatcher.subscribe();

    let ready = GatewayEvent::Ready {
        user_id,
        email: email.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        dispatcher.unregister_user_channel(user_id, conn_id).await;
        return;
    }

    let channels = Channels {
        conn_id,
        user_rx,
        broadcast_rx,
    };
    run_connection_loop(sender, receiver, dispatcher, user_id, channels).await;
    info!("{} ({}) disconnected from gateway", email, user_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    user_id: Uuid,
    channels: Channels,
) {
    let Channels {
        conn_id,
        mut user_rx,
        mut broadcast_rx,
    } = channels;

    // Chat rooms this connection follows (shared between send and recv tasks).
    let rooms: RoomSet = Arc::new(RwLock::new(HashSet::new()));
    let send_rooms = rooms.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let me = user_id.to_string();

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if let Some(key) = event.room_key() {
                        if !is_participant(key, &me) || !send_rooms.read().await.contains(key) {
                            continue;
                        }
                    }

                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let Some(event) = result else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&dispatcher_recv, user_id, cmd, &rooms).await,
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        dispatcher_recv
                            .send_to_user(user_id, GatewayEvent::Error {
                                message: format!("unrecognised command: {e}"),
                            })
                            .await;
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_user_channel(user_id, conn_id).await;
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let claims = verify_token(&token, jwt_secret)?;
                    return Some((claims.sub, claims.email));
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

fn verify_token(token: &str, jwt_secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

async fn handle_command(dispatcher: &Dispatcher, user_id: Uuid, cmd: GatewayCommand, rooms: &RoomSet) {
    match cmd {
        GatewayCommand::Identify { .. } => {
            dispatcher
                .send_to_user(user_id, GatewayEvent::Error {
                    message: "already identified".into(),
                })
                .await;
        }

        GatewayCommand::Subscribe { peer_ids } => {
            let keys = room_keys_for(user_id, &peer_ids);
            debug!("{} following {} rooms", user_id, keys.len());
            rooms.write().await.extend(keys);
        }

        GatewayCommand::Unsubscribe { peer_ids } => {
            let keys = room_keys_for(user_id, &peer_ids);
            let mut rooms = rooms.write().await;
            for key in &keys {
                rooms.remove(key);
            }
        }
    }
}

/// Rooms are derived from the caller's own id, so a connection can only
/// ever follow rooms it participates in.
fn room_keys_for(user_id: Uuid, peer_ids: &[Uuid]) -> Vec<String> {
    let me = user_id.to_string();
    peer_ids
        .iter()
        .filter(|peer| **peer != user_id)
        .map(|peer| room_key(&me, &peer.to_string()))
        .collect()
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
