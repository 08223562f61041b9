use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `subagent_tasks` table (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS subagent_tasks (
            id                TEXT NOT NULL PRIMARY KEY,
            task_type         TEXT NOT NULL,
            status            TEXT NOT NULL DEFAULT 'pending',
            prompt            TEXT NOT NULL,
            description       TEXT NOT NULL,
            parent_session_id TEXT,
            metadata          TEXT NOT NULL DEFAULT '{}',
            result            TEXT,
            error             TEXT,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            completed_at      TEXT
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_subagent_tasks_status
            ON subagent_tasks (status);
        ",
    )?;
    Ok(())
}
