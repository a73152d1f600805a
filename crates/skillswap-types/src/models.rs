use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Own profile, including private fields (email, balance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: String,
    pub avatar: Option<String>,
    pub credits: i64,
    pub has_profile: bool,
}

/// What other users get to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub bio: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LectureKind {
    Video,
    Text,
}

impl LectureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Self::Video),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Persisted lecture content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LectureContent {
    Video { url: String },
    Text { body: String },
}

impl LectureContent {
    pub fn kind(&self) -> LectureKind {
        match self {
            Self::Video { .. } => LectureKind::Video,
            Self::Text { .. } => LectureKind::Text,
        }
    }

    /// Raw string stored alongside the kind column.
    pub fn value(&self) -> &str {
        match self {
            Self::Video { url } => url,
            Self::Text { body } => body,
        }
    }

    pub fn from_parts(kind: LectureKind, value: String) -> Self {
        match kind {
            LectureKind::Video => Self::Video { url: value },
            LectureKind::Text => Self::Text { body: value },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub title: String,
    pub content: LectureContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub lectures: Vec<Lecture>,
    pub credits_required: i64,
    pub published: bool,
    pub author_id: Uuid,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// A chat message. Rooms are append-only so there is no edit/delete state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_key: String,
    pub sender_id: Uuid,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
