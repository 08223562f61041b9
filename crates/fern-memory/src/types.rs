use fern_core::ids::{ChunkId, MemoryId};
use serde::{Deserialize, Serialize};

/// Kind of a standalone, thread-independent memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Preference,
    Learning,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryType::Fact => "fact",
            MemoryType::Preference => "preference",
            MemoryType::Learning => "learning",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fact" => Ok(MemoryType::Fact),
            "preference" => Ok(MemoryType::Preference),
            "learning" => Ok(MemoryType::Learning),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// A standalone fact/preference/learning, independent of any one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentMemory {
    pub id: MemoryId,
    pub memory_type: MemoryType,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input to `write_memory`.
#[derive(Debug, Clone)]
pub struct WriteMemoryInput {
    pub memory_type: MemoryType,
    pub content: String,
    pub tags: Vec<String>,
}

/// A summarized, embedded slice of a thread's message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryChunk {
    pub id: ChunkId,
    pub thread_id: String,
    pub backend_session_id: String,
    pub summary: String,
    pub messages: Vec<fern_backend::BackendMessage>,
    pub token_count: usize,
    pub message_count: usize,
    pub first_message_id: String,
    pub last_message_id: String,
    pub created_at: String,
}

/// Per-thread archival progress marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivalWatermark {
    pub thread_id: String,
    pub last_archived_message_id: String,
    pub last_archived_at: String,
}

/// Which table a search hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySourceKind {
    Chunk,
    Memory,
}

impl std::fmt::Display for MemorySourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemorySourceKind::Chunk => "chunk",
            MemorySourceKind::Memory => "memory",
        };
        write!(f, "{s}")
    }
}

/// One hybrid-search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub source: MemorySourceKind,
    pub text: String,
    pub relevance_score: f32,
}
