use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::types::ThreadSession;

/// At most one hour old before a `ThreadSession` is considered stale and
/// purged on next access — matches the spec's "entries older than 1 hour
/// are lazily purged" invariant exactly.
const SESSION_TTL_SECS: u64 = 60 * 60;

/// In-memory map from `threadId` to the backend session it currently owns.
///
/// This is the sole source of conversational continuity: if the entry is
/// gone (evicted, or process restarted), the next turn for that thread
/// starts a brand-new backend session.
pub struct ThreadSessionRegistry {
    sessions: DashMap<String, ThreadSession>,
}

impl ThreadSessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Look up a live session for `thread_id`, purging it first if expired.
    #[instrument(skip(self))]
    pub fn get(&self, thread_id: &str) -> Option<ThreadSession> {
        let expired = self
            .sessions
            .get(thread_id)
            .map(|s| now_secs().saturating_sub(s.created_at_secs) > SESSION_TTL_SECS)
            .unwrap_or(false);

        if expired {
            debug!(thread_id, "thread session expired, evicting");
            self.sessions.remove(thread_id);
            return None;
        }

        self.sessions.get(thread_id).map(|s| s.clone())
    }

    /// Insert or overwrite the session for `thread_id`.
    pub fn put(&self, session: ThreadSession) {
        self.sessions.insert(session.thread_id.clone(), session);
    }

    pub fn remove(&self, thread_id: &str) {
        self.sessions.remove(thread_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for ThreadSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(thread_id: &str, created_at_secs: u64) -> ThreadSession {
        ThreadSession {
            thread_id: thread_id.to_string(),
            backend_session_id: "backend-1".to_string(),
            share_url: None,
            created_at_secs,
        }
    }

    #[test]
    fn put_then_get_roundtrips() {
        let reg = ThreadSessionRegistry::new();
        reg.put(session("t1", now_secs()));
        let got = reg.get("t1").expect("should exist");
        assert_eq!(got.backend_session_id, "backend-1");
    }

    #[test]
    fn missing_thread_returns_none() {
        let reg = ThreadSessionRegistry::new();
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn expired_entry_is_evicted_on_access() {
        let reg = ThreadSessionRegistry::new();
        reg.put(session("t1", now_secs() - SESSION_TTL_SECS - 10));
        assert!(reg.get("t1").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn at_most_one_entry_per_thread() {
        let reg = ThreadSessionRegistry::new();
        reg.put(session("t1", now_secs()));
        reg.put(ThreadSession {
            backend_session_id: "backend-2".to_string(),
            ..session("t1", now_secs())
        });
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("t1").unwrap().backend_session_id, "backend-2");
    }
}
