use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use fern_backend::{AgentCoordinator, ArchivalHook, BackendMessage, LlmBackend, RunTurnInput};
use fern_core::ids::{ChunkId, MemoryId};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, instrument, warn};

use crate::embed::{cosine_similarity, deserialize_vector, serialize_vector, Embedder};
use crate::error::{MemoryError, Result};
use crate::types::{
    MemoryChunk, MemorySourceKind, MemoryType, PersistentMemory, SearchResult, WriteMemoryInput,
};

/// Below this many estimated tokens of new history, archival does nothing —
/// wait for more context to accumulate.
const CHUNK_TOKEN_MIN: usize = 15_000;
/// Target chunk size.
const CHUNK_TOKEN_THRESHOLD: usize = 25_000;
/// Hard ceiling a single chunk's accumulated messages must never cross,
/// except when one message alone exceeds it.
const CHUNK_TOKEN_MAX: usize = 40_000;
/// Soft cap communicated to the summarizer; not mechanically enforced since
/// this crate doesn't control the backend's output length.
const MAX_SUMMARY_TOKENS: usize = 1024;
/// Default result count for `search`.
const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Hybrid scoring weights.
const VECTOR_WEIGHT: f32 = 0.7;
const KEYWORD_WEIGHT: f32 = 0.3;

/// Archives completed turns into summarized, embedded chunks and serves
/// hybrid vector + keyword retrieval over both chunks and standalone
/// persistent memories.
///
/// Implements [`ArchivalHook`] so it can be registered directly with
/// [`AgentCoordinator::set_archival_hook`] — archival runs fire-and-forget
/// after every turn, never blocking or failing it.
pub struct MemoryStore {
    db: Arc<AsyncMutex<Connection>>,
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn LlmBackend>,
    coordinator: Arc<AgentCoordinator>,
    /// One lock per thread so concurrent turn completions on the same
    /// thread never interleave messages into the same chunk window.
    archival_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl MemoryStore {
    pub fn new(
        conn: Connection,
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn LlmBackend>,
        coordinator: Arc<AgentCoordinator>,
    ) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Arc::new(AsyncMutex::new(conn)),
            embedder,
            backend,
            coordinator,
            archival_locks: DashMap::new(),
        })
    }

    // --- persistent memory writes -------------------------------------

    #[instrument(skip(self, input))]
    pub async fn write_memory(&self, input: WriteMemoryInput) -> Result<PersistentMemory> {
        if input.content.trim().is_empty() {
            return Err(MemoryError::Validation("content must not be empty".into()));
        }

        let embedding = self.embedder.embed(&input.content);
        let id = MemoryId::new();
        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(&input.tags)?;

        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO persistent_memories
             (id, memory_type, content, tags_json, embedding, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?6)",
            params![
                id.as_str(),
                input.memory_type.to_string(),
                input.content,
                tags_json,
                serialize_vector(&embedding),
                now,
            ],
        )?;
        conn.execute(
            "INSERT INTO memory_search_fts(ref_id, source, thread_id, text) VALUES (?1,'memory',NULL,?2)",
            params![id.as_str(), input.content],
        )?;
        info!(memory_id = %id, "memory written");
        drop(conn);

        self.get_memory(id.as_str()).await
    }

    /// Irreversible. Returns `false` if no row matched.
    #[instrument(skip(self))]
    pub async fn delete_memory(&self, id: &str) -> Result<bool> {
        let conn = self.db.lock().await;
        let n = conn.execute("DELETE FROM persistent_memories WHERE id = ?1", [id])?;
        conn.execute(
            "DELETE FROM memory_search_fts WHERE ref_id = ?1 AND source = 'memory'",
            [id],
        )?;
        if n > 0 {
            info!(memory_id = id, "memory deleted");
        }
        Ok(n > 0)
    }

    async fn get_memory(&self, id: &str) -> Result<PersistentMemory> {
        let conn = self.db.lock().await;
        conn.query_row(
            "SELECT id, memory_type, content, tags_json, created_at, updated_at
             FROM persistent_memories WHERE id = ?1",
            [id],
            row_to_memory,
        )
        .optional()?
        .ok_or_else(|| MemoryError::NotFound { id: id.to_string() })
    }

    /// Full raw message list for a chunk, or `None` if absent or the chunk
    /// belongs to a different thread.
    #[instrument(skip(self))]
    pub async fn read_chunk(&self, thread_id: &str, chunk_id: &str) -> Result<Option<MemoryChunk>> {
        let conn = self.db.lock().await;
        let chunk = conn
            .query_row(
                "SELECT id, thread_id, backend_session_id, summary, messages_json,
                        token_count, message_count, first_message_id, last_message_id, created_at
                 FROM memory_chunks WHERE id = ?1 AND thread_id = ?2",
                params![chunk_id, thread_id],
                row_to_chunk,
            )
            .optional()?;
        Ok(chunk)
    }

    // --- hybrid retrieval ------------------------------------------------

    #[instrument(skip(self, query))]
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        thread_id: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let query_vector = self.embedder.embed(query);
        let conn = self.db.lock().await;

        // Vector candidates.
        let mut vector_scores: HashMap<String, (MemorySourceKind, String, f32)> = HashMap::new();

        let mut mem_stmt =
            conn.prepare("SELECT id, content, embedding FROM persistent_memories")?;
        let mem_rows = mem_stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;
        for row in mem_rows.filter_map(|r| r.ok()) {
            let (id, content, blob) = row;
            let score = cosine_similarity(&query_vector, &deserialize_vector(&blob));
            vector_scores.insert(id, (MemorySourceKind::Memory, content, score));
        }
        drop(mem_stmt);

        let chunk_sql = if thread_id.is_some() {
            "SELECT id, summary, summary_embedding FROM memory_chunks WHERE thread_id = ?1"
        } else {
            "SELECT id, summary, summary_embedding FROM memory_chunks"
        };
        let mut chunk_stmt = conn.prepare(chunk_sql)?;
        let chunk_rows: Vec<(String, String, Vec<u8>)> = if let Some(t) = thread_id {
            chunk_stmt
                .query_map([t], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })?
                .filter_map(|r| r.ok())
                .collect()
        } else {
            chunk_stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })?
                .filter_map(|r| r.ok())
                .collect()
        };
        drop(chunk_stmt);
        for (id, summary, blob) in chunk_rows {
            let score = cosine_similarity(&query_vector, &deserialize_vector(&blob));
            vector_scores.insert(id, (MemorySourceKind::Chunk, summary, score));
        }

        // Keyword candidates via FTS5. bm25() is negative and lower-is-better;
        // negate so higher is better, matching the vector score convention.
        let mut keyword_scores: HashMap<String, f32> = HashMap::new();
        let fts_result = conn
            .prepare(
                "SELECT ref_id, -bm25(memory_search_fts) as rank
                 FROM memory_search_fts
                 WHERE memory_search_fts MATCH ?1
                   AND (source = 'memory' OR ?2 IS NULL OR thread_id = ?2)",
            )
            .and_then(|mut stmt| {
                let rows = stmt.query_map(params![query, thread_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)? as f32))
                })?;
                Ok(rows.filter_map(|r| r.ok()).collect::<Vec<_>>())
            });
        match fts_result {
            Ok(rows) => {
                for (id, rank) in rows {
                    keyword_scores.insert(id, rank);
                }
            }
            Err(e) => {
                // A malformed FTS query string (e.g. bare punctuation) should
                // degrade to vector-only results, not fail the whole search.
                warn!(error = %e, "keyword search query failed; continuing with vector scores only");
            }
        }
        drop(conn);

        let vec_values: Vec<f32> = vector_scores.values().map(|(_, _, s)| *s).collect();
        let (vec_min, vec_max) = min_max(&vec_values);
        let kw_values: Vec<f32> = keyword_scores.values().copied().collect();
        let (kw_min, kw_max) = min_max(&kw_values);

        let mut combined: Vec<SearchResult> = vector_scores
            .into_iter()
            .map(|(id, (source, text, raw_vec))| {
                let vec_norm = normalize(raw_vec, vec_min, vec_max);
                let kw_norm = keyword_scores
                    .get(&id)
                    .map(|raw| normalize(*raw, kw_min, kw_max))
                    .unwrap_or(0.0);
                SearchResult {
                    id,
                    source,
                    text,
                    relevance_score: VECTOR_WEIGHT * vec_norm + KEYWORD_WEIGHT * kw_norm,
                }
            })
            .collect();

        combined.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        combined.truncate(limit);
        Ok(combined)
    }

    // --- archival ---------------------------------------------------------

    /// Runs the archival pipeline for one thread. Public so callers (and
    /// tests) can trigger it directly instead of only through the
    /// fire-and-forget `ArchivalHook` path.
    #[instrument(skip(self))]
    pub async fn archive_thread(&self, thread_id: &str, backend_session_id: &str) -> Result<()> {
        let lock = self
            .archival_locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let messages = self.backend.session_messages(backend_session_id).await?;
        let watermark = self.load_watermark(thread_id).await?;
        let new_messages: Vec<BackendMessage> = match watermark {
            Some(last_id) => match messages.iter().position(|m| m.id == last_id) {
                Some(idx) => messages[idx + 1..].to_vec(),
                // Watermark id no longer present (e.g. history reset) —
                // treat everything available as new rather than losing it.
                None => messages,
            },
            None => messages,
        };

        if new_messages.is_empty() {
            return Ok(());
        }

        let total_tokens: usize = new_messages.iter().map(|m| estimate_tokens(&m.text)).sum();
        if total_tokens < CHUNK_TOKEN_MIN {
            return Ok(());
        }

        let last_message_id = new_messages.last().map(|m| m.id.clone());
        for chunk in chunk_messages(new_messages) {
            self.archive_chunk(thread_id, backend_session_id, chunk).await?;
        }

        if let Some(last_id) = last_message_id {
            self.advance_watermark(thread_id, &last_id).await?;
        }
        Ok(())
    }

    async fn archive_chunk(
        &self,
        thread_id: &str,
        backend_session_id: &str,
        chunk: Vec<BackendMessage>,
    ) -> Result<()> {
        let token_count: usize = chunk.iter().map(|m| estimate_tokens(&m.text)).sum();
        let message_count = chunk.len();
        let first_message_id = chunk.first().map(|m| m.id.clone()).unwrap_or_default();
        let last_message_id = chunk.last().map(|m| m.id.clone()).unwrap_or_default();

        let id = ChunkId::new();
        let summary = self.summarize(thread_id, &id, &chunk).await?;
        let embedding = self.embedder.embed(&summary);
        let messages_json = serde_json::to_string(&chunk)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO memory_chunks
             (id, thread_id, backend_session_id, summary, messages_json, token_count,
              message_count, first_message_id, last_message_id, summary_embedding, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                id.as_str(),
                thread_id,
                backend_session_id,
                summary,
                messages_json,
                token_count as i64,
                message_count as i64,
                first_message_id,
                last_message_id,
                serialize_vector(&embedding),
                now,
            ],
        )?;
        conn.execute(
            "INSERT INTO memory_search_fts(ref_id, source, thread_id, text) VALUES (?1,'chunk',?2,?3)",
            params![id.as_str(), thread_id, summary],
        )?;
        info!(chunk_id = %id, thread_id, message_count, "chunk archived");
        Ok(())
    }

    /// Summarizes a chunk of raw messages through the same turn coordinator
    /// the main session path uses, on a synthetic thread keyed by chunk id
    /// so concurrent summarizations never collide.
    async fn summarize(&self, thread_id: &str, chunk_id: &ChunkId, chunk: &[BackendMessage]) -> Result<String> {
        let transcript: String = chunk
            .iter()
            .map(|m| format!("{}: {}\n", m.role, m.text))
            .collect();
        let message = format!(
            "Summarize the following conversation excerpt in at most {MAX_SUMMARY_TOKENS} tokens. \
             Capture decisions, facts, and open threads; omit pleasantries.\n\n{transcript}"
        );

        let output = self
            .coordinator
            .run_turn(RunTurnInput {
                thread_id: format!("memory_summary_{chunk_id}"),
                message,
                channel: Some("memory".to_string()),
                channel_user_id: None,
                attachments: Vec::new(),
                agent_type: None,
            })
            .await;

        if output.response.trim().is_empty() {
            warn!(thread_id, %chunk_id, "summarization produced empty output");
        }
        Ok(output.response)
    }

    async fn load_watermark(&self, thread_id: &str) -> Result<Option<String>> {
        let conn = self.db.lock().await;
        let last_id = conn
            .query_row(
                "SELECT last_archived_message_id FROM archival_watermarks WHERE thread_id = ?1",
                [thread_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(last_id)
    }

    async fn advance_watermark(&self, thread_id: &str, last_message_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO archival_watermarks (thread_id, last_archived_message_id, last_archived_at)
             VALUES (?1,?2,?3)
             ON CONFLICT(thread_id) DO UPDATE SET
                last_archived_message_id = excluded.last_archived_message_id,
                last_archived_at = excluded.last_archived_at",
            params![thread_id, last_message_id, now],
        )?;
        Ok(())
    }
}

impl ArchivalHook for MemoryStore {
    /// Fire-and-forget: spawns the archival run and returns immediately.
    /// A failure here is logged, never propagated — the turn that triggered
    /// it has already completed.
    fn on_turn_complete(&self, thread_id: String, backend_session_id: String) {
        let lock = self
            .archival_locks
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let db = Arc::clone(&self.db);
        let embedder = Arc::clone(&self.embedder);
        let backend = Arc::clone(&self.backend);
        let coordinator = Arc::clone(&self.coordinator);

        // A fresh, lock-holding MemoryStore view for the spawned task. This
        // avoids requiring callers to hold the store behind an `Arc` just to
        // satisfy the hook signature's `&self`.
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            let store = MemoryStore {
                db,
                embedder,
                backend,
                coordinator,
                archival_locks: DashMap::new(),
            };
            if let Err(e) = store.archive_thread_locked(&thread_id, &backend_session_id).await {
                error!(thread_id, error = %e, "archival pipeline failed");
            }
        });
    }
}

impl MemoryStore {
    /// Same body as `archive_thread` but assumes the per-thread lock is
    /// already held by the caller (used by the `ArchivalHook` path, which
    /// takes the lock before constructing this scratch view).
    async fn archive_thread_locked(&self, thread_id: &str, backend_session_id: &str) -> Result<()> {
        let messages = self.backend.session_messages(backend_session_id).await?;
        let watermark = self.load_watermark(thread_id).await?;
        let new_messages: Vec<BackendMessage> = match watermark {
            Some(last_id) => match messages.iter().position(|m| m.id == last_id) {
                Some(idx) => messages[idx + 1..].to_vec(),
                None => messages,
            },
            None => messages,
        };

        if new_messages.is_empty() {
            return Ok(());
        }

        let total_tokens: usize = new_messages.iter().map(|m| estimate_tokens(&m.text)).sum();
        if total_tokens < CHUNK_TOKEN_MIN {
            return Ok(());
        }

        let last_message_id = new_messages.last().map(|m| m.id.clone());
        for chunk in chunk_messages(new_messages) {
            self.archive_chunk(thread_id, backend_session_id, chunk).await?;
        }

        if let Some(last_id) = last_message_id {
            self.advance_watermark(thread_id, &last_id).await?;
        }
        Ok(())
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Greedily slice messages into chunks targeting `CHUNK_TOKEN_THRESHOLD`,
/// never letting a chunk straddle `CHUNK_TOKEN_MAX` — unless a single
/// message alone exceeds it, in which case it becomes its own oversize
/// chunk rather than being split mid-message.
fn chunk_messages(messages: Vec<BackendMessage>) -> Vec<Vec<BackendMessage>> {
    let mut chunks = Vec::new();
    let mut current: Vec<BackendMessage> = Vec::new();
    let mut current_tokens = 0usize;

    for msg in messages {
        let msg_tokens = estimate_tokens(&msg.text);
        if !current.is_empty() && current_tokens + msg_tokens > CHUNK_TOKEN_MAX {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current_tokens += msg_tokens;
        current.push(msg);
        if current_tokens >= CHUNK_TOKEN_THRESHOLD {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn min_max(values: &[f32]) -> (f32, f32) {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    (min, max)
}

fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f32::EPSILON {
        if value.is_finite() && value != 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (value - min) / (max - min)
    }
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<PersistentMemory> {
    let memory_type: String = row.get(1)?;
    let tags_json: String = row.get(3)?;
    Ok(PersistentMemory {
        id: MemoryId::from(row.get::<_, String>(0)?),
        memory_type: memory_type.parse().unwrap_or(MemoryType::Fact),
        content: row.get(2)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<MemoryChunk> {
    let messages_json: String = row.get(4)?;
    Ok(MemoryChunk {
        id: ChunkId::from(row.get::<_, String>(0)?),
        thread_id: row.get(1)?,
        backend_session_id: row.get(2)?,
        summary: row.get(3)?,
        messages: serde_json::from_str(&messages_json).unwrap_or_default(),
        token_count: row.get::<_, i64>(5)? as usize,
        message_count: row.get::<_, i64>(6)? as usize,
        first_message_id: row.get(7)?,
        last_message_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fern_backend::{AgentCoordinator, MockBackend, PromptBuilder};
    use fern_sessions::ThreadSessionRegistry;
    use rusqlite::Connection;

    use super::*;
    use crate::embed::HashEmbedder;

    fn store_with(backend: Arc<MockBackend>, reply: &str) -> MemoryStore {
        let coordinator = Arc::new(AgentCoordinator::new(
            MockBackend::with_reply(reply.to_string()),
            Arc::new(ThreadSessionRegistry::new()),
            PromptBuilder::load(None),
            "fern",
        ));
        let conn = Connection::open_in_memory().unwrap();
        MemoryStore::new(conn, Arc::new(HashEmbedder), backend, coordinator).unwrap()
    }

    #[tokio::test]
    async fn write_then_search_finds_the_memory() {
        let backend = MockBackend::new();
        let store = store_with(backend, "summary");
        store
            .write_memory(WriteMemoryInput {
                memory_type: MemoryType::Fact,
                content: "User prefers TypeScript for new projects".to_string(),
                tags: vec!["tech".to_string()],
            })
            .await
            .unwrap();

        let results = store.search("typescript preference", None, None).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].source, MemorySourceKind::Memory);
        assert!(results[0].relevance_score > 0.0);
    }

    #[tokio::test]
    async fn write_rejects_empty_content() {
        let backend = MockBackend::new();
        let store = store_with(backend, "summary");
        let err = store
            .write_memory(WriteMemoryInput {
                memory_type: MemoryType::Fact,
                content: "   ".to_string(),
                tags: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_memory_removes_it_from_search() {
        let backend = MockBackend::new();
        let store = store_with(backend, "summary");
        let memory = store
            .write_memory(WriteMemoryInput {
                memory_type: MemoryType::Preference,
                content: "likes dark mode".to_string(),
                tags: vec![],
            })
            .await
            .unwrap();

        assert!(store.delete_memory(memory.id.as_str()).await.unwrap());
        assert!(!store.delete_memory(memory.id.as_str()).await.unwrap());
        let results = store.search("dark mode", None, None).await.unwrap();
        assert!(results.iter().all(|r| r.id != memory.id.as_str()));
    }

    #[tokio::test]
    async fn short_history_does_not_archive() {
        let backend = MockBackend::new();
        let session_id = backend.create_session("t").await.unwrap();
        backend
            .prompt(&session_id, &[fern_backend::PromptPart::Text { text: "hi".into() }], "", "fern")
            .await
            .unwrap();
        let store = store_with(backend, "summary");

        store.archive_thread("thread-1", &session_id).await.unwrap();
        let chunk = store.read_chunk("thread-1", "chunk_nonexistent").await.unwrap();
        assert!(chunk.is_none());
    }

    #[tokio::test]
    async fn long_history_archives_into_a_chunk_and_advances_watermark() {
        let backend = MockBackend::new();
        let session_id = backend.create_session("t").await.unwrap();
        let long_text = "word ".repeat(20_000); // ~20000 tokens at chars/4
        backend
            .prompt(&session_id, &[fern_backend::PromptPart::Text { text: long_text }], "", "fern")
            .await
            .unwrap();
        let store = store_with(backend, "a concise summary");

        store.archive_thread("thread-2", &session_id).await.unwrap();

        let results = store.search("word", None, Some("thread-2")).await.unwrap();
        assert!(results.iter().any(|r| r.source == MemorySourceKind::Chunk));
    }

    #[test]
    fn chunking_never_lets_a_chunk_cross_the_hard_max() {
        let messages: Vec<BackendMessage> = (0..50)
            .map(|i| BackendMessage {
                id: format!("m{i}"),
                role: "user".to_string(),
                text: "word ".repeat(400), // ~500 tokens each
                created_at: "t".to_string(),
            })
            .collect();
        let chunks = chunk_messages(messages);
        for chunk in &chunks {
            let tokens: usize = chunk.iter().map(|m| estimate_tokens(&m.text)).sum();
            assert!(tokens <= CHUNK_TOKEN_MAX || chunk.len() == 1);
        }
    }
}
