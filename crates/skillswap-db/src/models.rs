/// Database row types, mapped directly from SQLite rows.
/// Distinct from skillswap-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub username: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub created_at: String,
}

pub struct SkillRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub credits_required: i64,
    pub published: bool,
    pub author_id: String,
    pub author_name: String,
    pub lecture_count: i64,
    pub created_at: String,
}

pub struct LectureRow {
    pub position: i64,
    pub title: String,
    pub kind: String,
    pub content: String,
}

pub struct MessageRow {
    pub id: String,
    pub room_key: String,
    pub sender_id: String,
    pub text: String,
    /// Microseconds since the Unix epoch.
    pub created_at: i64,
}

/// Input for [`crate::Database::create_skill`].
pub struct NewSkill<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub credits_required: i64,
    pub published: bool,
    pub author_id: &'a str,
    pub author_name: &'a str,
}

pub struct NewLecture<'a> {
    pub title: &'a str,
    pub kind: &'a str,
    pub content: &'a str,
}
