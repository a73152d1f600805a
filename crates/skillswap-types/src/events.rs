use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::SkillSummary;
use crate::models::ChatMessage;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, email: String },

    /// A message was appended to a chat room
    MessageCreate { message: ChatMessage },

    /// A skill was saved with `published = true`
    SkillPublished { skill: SkillSummary },

    /// The receiving user's credit balance changed
    CreditsUpdate { user_id: Uuid, balance: i64 },

    /// A command was rejected; the connection stays open
    Error { message: String },
}

impl GatewayEvent {
    /// Returns the chat room key if this event is scoped to a room.
    /// Events that return `None` are delivered to every connection.
    pub fn room_key(&self) -> Option<&str> {
        match self {
            Self::MessageCreate { message } => Some(&message.room_key),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Follow the chat rooms shared with these peers
    Subscribe { peer_ids: Vec<Uuid> },

    /// Stop following the chat rooms shared with these peers
    Unsubscribe { peer_ids: Vec<Uuid> },
}
