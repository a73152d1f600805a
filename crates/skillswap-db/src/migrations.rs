use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                display_name  TEXT,
                username      TEXT NOT NULL DEFAULT '',
                bio           TEXT NOT NULL DEFAULT '',
                avatar        TEXT,
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE credit_balances (
                user_id     TEXT PRIMARY KEY REFERENCES users(id),
                balance     INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE skills (
                id                TEXT PRIMARY KEY,
                name              TEXT NOT NULL,
                description       TEXT NOT NULL DEFAULT '',
                category          TEXT NOT NULL DEFAULT '',
                credits_required  INTEGER NOT NULL,
                published         INTEGER NOT NULL DEFAULT 0,
                author_id         TEXT NOT NULL REFERENCES users(id),
                author_name       TEXT NOT NULL,
                created_at        TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_skills_published ON skills(published, created_at);
            CREATE INDEX idx_skills_author ON skills(author_id);

            CREATE TABLE lectures (
                skill_id    TEXT NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                title       TEXT NOT NULL,
                kind        TEXT NOT NULL CHECK (kind IN ('video', 'text')),
                content     TEXT NOT NULL,
                PRIMARY KEY (skill_id, position)
            );

            -- created_at is microseconds since the epoch, strictly increasing per room
            CREATE TABLE chat_messages (
                id          TEXT PRIMARY KEY,
                room_key    TEXT NOT NULL,
                sender_id   TEXT NOT NULL REFERENCES users(id),
                text        TEXT NOT NULL,
                created_at  INTEGER NOT NULL,
                UNIQUE (room_key, created_at)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
