//! One-shot waitable per id, shared by the session coordinator and the
//! subagent task manager to implement "block until done".
//!
//! `signal` stores the terminal value for [`DONE_TTL`] even if nobody is
//! waiting yet — the naive promise-map version of this (signal before any
//! `wait_for` registered loses the result) is the exact race this type
//! exists to close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{FernError, Result};

/// How long a terminal value is kept for a waiter that registers late.
const DONE_TTL: Duration = Duration::from_secs(60);

enum Slot<T> {
    Pending(Vec<(u64, oneshot::Sender<T>)>),
    Done { value: T, at: Instant },
}

/// Generic per-id completion signal. `T` is typically the terminal row
/// (task, job) or `()` when only the fact of completion matters.
pub struct CompletionCoordinator<T> {
    slots: Arc<DashMap<String, Slot<T>>>,
    next_token: AtomicU64,
}

impl<T> CompletionCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    /// Block until `id` is signalled or `timeout` elapses. If `id` was
    /// already signalled (and the result hasn't aged out), returns
    /// immediately.
    pub async fn wait_for(&self, id: &str, timeout: Duration) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        {
            let mut slot = self
                .slots
                .entry(id.to_string())
                .or_insert_with(|| Slot::Pending(Vec::new()));
            match &mut *slot {
                Slot::Pending(waiters) => waiters.push((token, tx)),
                Slot::Done { value, at } => {
                    if at.elapsed() < DONE_TTL {
                        let _ = tx.send(value.clone());
                    } else {
                        *slot = Slot::Pending(vec![(token, tx)]);
                    }
                }
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(FernError::Internal(format!(
                "completion sender for {id} dropped without signalling"
            ))),
            Err(_) => {
                self.remove_waiter(id, token);
                Err(FernError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Returns `true` immediately if `id` already has a live terminal value.
    pub fn is_done(&self, id: &str) -> bool {
        matches!(
            self.slots.get(id).map(|s| matches!(*s, Slot::Done { .. })),
            Some(true)
        )
    }

    /// Signal completion, waking every waiter registered so far and storing
    /// the value for any waiter that registers within `DONE_TTL`.
    pub fn signal(&self, id: &str, value: T) {
        let previous = self
            .slots
            .insert(id.to_string(), Slot::Done { value: value.clone(), at: Instant::now() });

        if let Some(Slot::Pending(waiters)) = previous {
            for (_, tx) in waiters {
                let _ = tx.send(value.clone());
            }
        }

        self.schedule_cleanup(id.to_string());
    }

    fn remove_waiter(&self, id: &str, token: u64) {
        if let Some(mut slot) = self.slots.get_mut(id) {
            if let Slot::Pending(waiters) = &mut *slot {
                waiters.retain(|(t, _)| *t != token);
            }
        }
    }

    fn schedule_cleanup(&self, id: String) {
        let slots = Arc::clone(&self.slots);
        tokio::spawn(async move {
            tokio::time::sleep(DONE_TTL).await;
            if let Some(entry) = slots.get(&id) {
                if matches!(*entry, Slot::Done { at, .. } if at.elapsed() >= DONE_TTL) {
                    drop(entry);
                    slots.remove(&id);
                }
            }
        });
    }
}

impl<T> Default for CompletionCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_then_signal_delivers_value() {
        let coord: CompletionCoordinator<String> = CompletionCoordinator::new();
        let coord = Arc::new(coord);
        let c2 = coord.clone();
        let handle = tokio::spawn(async move { c2.wait_for("a", Duration::from_secs(1)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        coord.signal("a", "done".to_string());
        assert_eq!(handle.await.unwrap().unwrap(), "done");
    }

    #[tokio::test]
    async fn signal_before_wait_is_not_lost() {
        let coord: CompletionCoordinator<String> = CompletionCoordinator::new();
        coord.signal("b", "early".to_string());
        let result = coord.wait_for("b", Duration::from_millis(50)).await;
        assert_eq!(result.unwrap(), "early");
    }

    #[tokio::test]
    async fn wait_for_times_out_and_clears_slot() {
        let coord: CompletionCoordinator<String> = CompletionCoordinator::new();
        let result = coord.wait_for("c", Duration::from_millis(20)).await;
        assert!(matches!(result, Err(FernError::Timeout { .. })));
    }

    #[tokio::test]
    async fn multiple_waiters_all_wake() {
        let coord = Arc::new(CompletionCoordinator::<String>::new());
        let mut handles = Vec::new();
        for _ in 0..3 {
            let c = coord.clone();
            handles.push(tokio::spawn(async move {
                c.wait_for("d", Duration::from_secs(1)).await
            }));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        coord.signal("d", "go".to_string());
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "go");
        }
    }
}
