use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `jobs` table (idempotent) and an index on `(status,
/// scheduled_at)` so the dispatcher's due-job poll stays cheap regardless of
/// how many completed/cancelled jobs have accumulated.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id            TEXT    NOT NULL PRIMARY KEY,
            job_type      TEXT    NOT NULL,
            status        TEXT    NOT NULL DEFAULT 'pending',
            prompt        TEXT    NOT NULL,
            scheduled_at  TEXT    NOT NULL,
            cron_expr     TEXT,
            metadata      TEXT    NOT NULL DEFAULT '{}',
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL,
            last_fired_at TEXT,
            last_error    TEXT
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_jobs_status_scheduled_at
            ON jobs (status, scheduled_at);
        ",
    )?;
    Ok(())
}
