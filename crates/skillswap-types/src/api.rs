use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, LectureKind, Skill};

// -- JWT Claims --

/// JWT claims shared across skillswap-api (REST middleware) and
/// skillswap-gateway (WebSocket authentication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// Body of `GET /api/profile`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountInfo {
    pub uid: Uuid,
    pub email: String,
}

// -- Profile --

/// Merge update: `None` leaves the stored value untouched.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AvatarUploadRequest {
    /// `data:image/<ext>;base64,<payload>`
    pub data_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreditsResponse {
    pub balance: i64,
}

// -- Skills --

/// Lecture content as submitted by the author. `Recording` points at a
/// staged upload that gets promoted when the skill is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DraftContent {
    Video { url: String },
    Text { body: String },
    Recording { upload_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LectureDraft {
    #[serde(default)]
    pub title: String,
    pub content: DraftContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSkillRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub lectures: Vec<LectureDraft>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSkillResponse {
    pub skill: Skill,
    pub credits_awarded: i64,
}

/// Catalog entry without lecture content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub credits_required: i64,
    pub published: bool,
    pub author_id: Uuid,
    pub author_name: String,
    pub lecture_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Skill> for SkillSummary {
    fn from(skill: &Skill) -> Self {
        Self {
            id: skill.id,
            name: skill.name.clone(),
            description: skill.description.clone(),
            category: skill.category.clone(),
            credits_required: skill.credits_required,
            published: skill.published,
            author_id: skill.author_id,
            author_name: skill.author_name.clone(),
            lecture_count: skill.lectures.len(),
            created_at: skill.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureOutline {
    pub title: String,
    pub kind: LectureKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub granted: bool,
    pub balance: i64,
    pub required: i64,
    /// Zero when granted.
    pub shortfall: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SkillDetailResponse {
    pub skill: SkillSummary,
    pub lectures: Vec<LectureOutline>,
    pub access: Access,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkillQuery {
    #[serde(default)]
    pub q: Option<String>,
}

// -- Chats --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub room_key: String,
    pub messages: Vec<ChatMessage>,
}

// -- Uploads --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub id: Uuid,
    pub bytes_received: u64,
}

#[derive(Debug, Deserialize)]
pub struct UploadOffsetQuery {
    #[serde(default)]
    pub offset: u64,
}
