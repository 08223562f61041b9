//! Prefixed, sortable identifiers for persisted entities.
//!
//! Every id is `{prefix}_{uuidv7}` — the v7 timestamp makes ids sortable by
//! creation order, which is convenient for `ORDER BY id` fallbacks and log
//! correlation, matching the convention the rest of the store already uses
//! for `UserId`.

use std::fmt;
use uuid::Uuid;

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

prefixed_id!(JobId, "job");
prefixed_id!(TaskId, "task");
prefixed_id!(TodoId, "task");
prefixed_id!(MemoryId, "mem");
prefixed_id!(ChunkId, "chunk");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        assert!(JobId::new().as_str().starts_with("job_"));
        assert!(TaskId::new().as_str().starts_with("task_"));
        assert!(MemoryId::new().as_str().starts_with("mem_"));
        assert!(ChunkId::new().as_str().starts_with("chunk_"));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }
}
