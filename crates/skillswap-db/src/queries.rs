use crate::Database;
use crate::models::{LectureRow, MessageRow, NewLecture, NewSkill, SkillRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str =
    "id, email, password, display_name, username, bio, avatar, created_at";

const SKILL_COLUMNS: &str = "s.id, s.name, s.description, s.category, s.credits_required, \
     s.published, s.author_id, s.author_name, \
     (SELECT COUNT(*) FROM lectures l WHERE l.skill_id = s.id), s.created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, display_name) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, display_name),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Merge-style profile save: `None` keeps the stored column.
    /// Returns false when the user does not exist.
    pub fn update_profile(
        &self,
        id: &str,
        username: Option<&str>,
        bio: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    bio = COALESCE(?3, bio),
                    avatar = COALESCE(?4, avatar),
                    updated_at = datetime('now')
                 WHERE id = ?1",
                (id, username, bio, avatar),
            )?;
            Ok(changed > 0)
        })
    }

    /// Everyone except `id` who has picked a username.
    pub fn list_users_with_profile(&self, except_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE id != ?1 AND username != ''
                 ORDER BY username COLLATE NOCASE"
            ))?;
            let rows = stmt
                .query_map([except_id], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Credits --

    /// Current balance; users without a ledger row have zero.
    pub fn get_balance(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| query_balance(conn, user_id))
    }

    // -- Skills --

    /// Inserts a skill and its lectures in one transaction. When `award` is
    /// set the author's balance is credited in the same transaction and the
    /// new balance returned.
    pub fn create_skill(
        &self,
        skill: &NewSkill<'_>,
        lectures: &[NewLecture<'_>],
        award: Option<i64>,
    ) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            tx.execute(
                "INSERT INTO skills
                    (id, name, description, category, credits_required, published, author_id, author_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    skill.id,
                    skill.name,
                    skill.description,
                    skill.category,
                    skill.credits_required,
                    skill.published,
                    skill.author_id,
                    skill.author_name,
                ],
            )?;

            for (position, lecture) in lectures.iter().enumerate() {
                tx.execute(
                    "INSERT INTO lectures (skill_id, position, title, kind, content)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        skill.id,
                        position as i64,
                        lecture.title,
                        lecture.kind,
                        lecture.content,
                    ],
                )?;
            }

            let balance = match award {
                Some(amount) => Some(credit(&tx, skill.author_id, amount)?),
                None => None,
            };

            tx.commit()?;
            Ok(balance)
        })
    }

    pub fn get_skill(&self, id: &str) -> Result<Option<SkillRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SKILL_COLUMNS} FROM skills s WHERE s.id = ?1"))?;
            let row = stmt.query_row([id], map_skill).optional()?;
            Ok(row)
        })
    }

    pub fn get_lectures(&self, skill_id: &str) -> Result<Vec<LectureRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT position, title, kind, content FROM lectures
                 WHERE skill_id = ?1 ORDER BY position",
            )?;
            let rows = stmt
                .query_map([skill_id], |row| {
                    Ok(LectureRow {
                        position: row.get(0)?,
                        title: row.get(1)?,
                        kind: row.get(2)?,
                        content: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Published catalog in creation order.
    pub fn list_published_skills(&self) -> Result<Vec<SkillRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SKILL_COLUMNS} FROM skills s
                 WHERE s.published = 1
                 ORDER BY s.created_at, s.rowid"
            ))?;
            let rows = stmt
                .query_map([], map_skill)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All skills by one author, drafts included.
    pub fn list_skills_by_author(&self, author_id: &str) -> Result<Vec<SkillRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SKILL_COLUMNS} FROM skills s
                 WHERE s.author_id = ?1
                 ORDER BY s.created_at, s.rowid"
            ))?;
            let rows = stmt
                .query_map([author_id], map_skill)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Chat --

    /// Appends a message and returns the timestamp it was stamped with.
    /// The stamp is taken under the connection lock, so it is strictly
    /// greater than every earlier stamp in the same room.
    pub fn insert_message(
        &self,
        id: &str,
        room_key: &str,
        sender_id: &str,
        text: &str,
        now_micros: i64,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let last: Option<i64> = conn.query_row(
                "SELECT MAX(created_at) FROM chat_messages WHERE room_key = ?1",
                [room_key],
                |row| row.get(0),
            )?;
            let created_at = skillswap_rules::chat::next_timestamp(last, now_micros);

            conn.execute(
                "INSERT INTO chat_messages (id, room_key, sender_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, room_key, sender_id, text, created_at],
            )?;
            Ok(created_at)
        })
    }

    /// Full room history, oldest first.
    pub fn get_messages(&self, room_key: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_key, sender_id, text, created_at FROM chat_messages
                 WHERE room_key = ?1
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([room_key], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        room_key: row.get(1)?,
                        sender_id: row.get(2)?,
                        text: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn query_balance(conn: &Connection, user_id: &str) -> Result<i64> {
    let balance = conn
        .query_row(
            "SELECT balance FROM credit_balances WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(balance.unwrap_or(0))
}

fn credit(conn: &Connection, user_id: &str, amount: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO credit_balances (user_id, balance) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET balance = balance + excluded.balance",
        rusqlite::params![user_id, amount],
    )?;
    query_balance(conn, user_id)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        display_name: row.get(3)?,
        username: row.get(4)?,
        bio: row.get(5)?,
        avatar: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_skill(row: &Row<'_>) -> rusqlite::Result<SkillRow> {
    Ok(SkillRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        credits_required: row.get(4)?,
        published: row.get(5)?,
        author_id: row.get(6)?,
        author_name: row.get(7)?,
        lecture_count: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
