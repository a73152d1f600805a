//! Row -> API model conversions. Corrupt values are logged and replaced
//! with defaults rather than failing the whole listing.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use skillswap_db::models::{LectureRow, MessageRow, SkillRow, UserRow};
use skillswap_types::api::{LectureOutline, SkillSummary};
use skillswap_types::models::{
    ChatMessage, Lecture, LectureContent, LectureKind, Profile, PublicProfile, Skill,
};

pub fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without timezone.
pub fn sqlite_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn micros_timestamp(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(|| {
        warn!("Out of range message timestamp {}", micros);
        DateTime::default()
    })
}

pub fn has_profile(row: &UserRow) -> bool {
    !row.username.trim().is_empty()
}

pub fn profile(row: UserRow, credits: i64) -> Profile {
    Profile {
        id: uuid(&row.id, "user id"),
        has_profile: has_profile(&row),
        email: row.email,
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        avatar: row.avatar,
        credits,
    }
}

pub fn public_profile(row: UserRow) -> PublicProfile {
    PublicProfile {
        id: uuid(&row.id, "user id"),
        username: row.username,
        bio: row.bio,
        avatar: row.avatar,
    }
}

/// Name shown on a skill card: display name, else username, else "Anonymous".
pub fn author_name(row: &UserRow) -> String {
    row.display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or_else(|| Some(row.username.trim()).filter(|name| !name.is_empty()))
        .unwrap_or("Anonymous")
        .to_string()
}

pub fn skill_summary(row: SkillRow) -> SkillSummary {
    SkillSummary {
        id: uuid(&row.id, "skill id"),
        author_id: uuid(&row.author_id, "author id"),
        created_at: sqlite_timestamp(&row.created_at),
        lecture_count: row.lecture_count.max(0) as usize,
        name: row.name,
        description: row.description,
        category: row.category,
        credits_required: row.credits_required,
        published: row.published,
        author_name: row.author_name,
    }
}

pub fn lecture_kind(row: &LectureRow) -> LectureKind {
    LectureKind::parse(&row.kind).unwrap_or_else(|| {
        warn!("Unknown lecture kind '{}', treating as text", row.kind);
        LectureKind::Text
    })
}

pub fn lecture(row: LectureRow) -> Lecture {
    let kind = lecture_kind(&row);
    Lecture {
        title: row.title,
        content: LectureContent::from_parts(kind, row.content),
    }
}

pub fn lecture_outline(row: &LectureRow) -> LectureOutline {
    LectureOutline {
        title: row.title.clone(),
        kind: lecture_kind(row),
    }
}

pub fn skill(row: SkillRow, lectures: Vec<LectureRow>) -> Skill {
    let summary = skill_summary(row);
    Skill {
        id: summary.id,
        name: summary.name,
        description: summary.description,
        category: summary.category,
        lectures: lectures.into_iter().map(lecture).collect(),
        credits_required: summary.credits_required,
        published: summary.published,
        author_id: summary.author_id,
        author_name: summary.author_name,
        created_at: summary.created_at,
    }
}

pub fn message(row: MessageRow) -> ChatMessage {
    ChatMessage {
        id: uuid(&row.id, "message id"),
        sender_id: uuid(&row.sender_id, "sender id"),
        timestamp: micros_timestamp(row.created_at),
        room_key: row.room_key,
        text: row.text,
    }
}
