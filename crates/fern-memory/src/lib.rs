//! Archival and retrieval for conversation history and standalone facts.
//!
//! Two kinds of record live here:
//!
//! - [`types::PersistentMemory`]: a standalone fact/preference/learning a
//!   user or agent explicitly asked to remember, independent of any thread.
//! - [`types::MemoryChunk`]: a summarized, embedded slice of a thread's raw
//!   message history, produced automatically once enough new history has
//!   accumulated (see [`manager`]'s archival pipeline).
//!
//! [`manager::MemoryStore::search`] retrieves across both with a hybrid
//! score: `0.7 * cosine_similarity + 0.3 * fts5_rank`, each normalized to
//! `[0, 1]` independently before the weights are applied. There is no
//! sqlite-vec style native vector column here; embeddings are stored as
//! little-endian `f32` blobs and scored with a brute-force scan, the
//! portable alternative for a store that otherwise stays plain SQLite.

pub mod db;
pub mod embed;
pub mod error;
pub mod manager;
pub mod types;

pub use embed::{cosine_similarity, Embedder, HashEmbedder, EMBEDDING_DIM};
pub use error::{MemoryError, Result};
pub use manager::MemoryStore;
pub use types::{
    ArchivalWatermark, MemoryChunk, MemorySourceKind, MemoryType, PersistentMemory, SearchResult,
    WriteMemoryInput,
};
