use rusqlite::Connection;

use crate::error::Result;

/// Initialise the memory schema. Safe to call on every startup (idempotent).
///
/// Vectors are stored as little-endian `f32` blobs (see `embed::{serialize,
/// deserialize}`) — no sqlite-vec extension is assumed, so similarity search
/// is a brute-force scan over these blobs at query time.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS persistent_memories (
            id          TEXT    NOT NULL PRIMARY KEY,
            memory_type TEXT    NOT NULL,
            content     TEXT    NOT NULL,
            tags_json   TEXT    NOT NULL DEFAULT '[]',
            embedding   BLOB    NOT NULL,
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS memory_chunks (
            id                 TEXT    NOT NULL PRIMARY KEY,
            thread_id          TEXT    NOT NULL,
            backend_session_id TEXT    NOT NULL,
            summary            TEXT    NOT NULL,
            messages_json      TEXT    NOT NULL,
            token_count        INTEGER NOT NULL,
            message_count      INTEGER NOT NULL,
            first_message_id   TEXT    NOT NULL,
            last_message_id    TEXT    NOT NULL,
            summary_embedding  BLOB    NOT NULL,
            created_at         TEXT    NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_chunks_thread ON memory_chunks (thread_id);

        CREATE TABLE IF NOT EXISTS archival_watermarks (
            thread_id             TEXT NOT NULL PRIMARY KEY,
            last_archived_message_id TEXT NOT NULL,
            last_archived_at      TEXT NOT NULL
        ) STRICT;

        -- Standalone (non external-content) FTS5 index: manually synced on
        -- every write, same idiom as the teacher's user_memory_fts table.
        -- ref_id/source/thread_id are UNINDEXED — plain stored columns used
        -- to map a match back to its row and to scope chunk hits by thread.
        CREATE VIRTUAL TABLE IF NOT EXISTS memory_search_fts USING fts5(
            ref_id UNINDEXED,
            source UNINDEXED,
            thread_id UNINDEXED,
            text
        );
        ",
    )?;
    Ok(())
}
