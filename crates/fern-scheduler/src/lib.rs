//! `fern-scheduler` — dispatcher for time- and cron-scheduled agent turns.
//!
//! # Overview
//!
//! Jobs are persisted to a SQLite `jobs` table. [`engine::SchedulerEngine`]
//! polls the database on a configurable tick interval and, for every due job,
//! claims it with a conditional `UPDATE` and runs its prompt through
//! [`fern_backend::AgentCoordinator::run_turn`] exactly as if a user had sent
//! it on a synthetic `scheduler_{id}` thread.
//!
//! # Scheduling options
//!
//! | Variant    | Behaviour                                               |
//! |------------|----------------------------------------------------------|
//! | `At`       | One-shot fire at an absolute UTC instant                |
//! | `DelayMs`  | One-shot fire `delay_ms` milliseconds from creation     |
//! | `Cron`     | Recurring fire per a standard 5-field cron expression   |
//!
//! Stale `running` rows are reset to `pending` on startup — scheduled
//! prompts are idempotent and safe to retry, unlike subagent tasks.

pub mod db;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use types::{CreateJobInput, JobKind, JobStatus, ScheduleSpec, ScheduledJob};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use fern_backend::{AgentCoordinator, MockBackend, PromptBuilder};
    use fern_sessions::ThreadSessionRegistry;
    use rusqlite::Connection;
    use tokio::sync::watch;

    use super::*;

    fn handle() -> SchedulerHandle {
        let conn = Connection::open_in_memory().unwrap();
        SchedulerHandle::new(conn).unwrap()
    }

    fn coordinator(reply: &str) -> Arc<AgentCoordinator> {
        let backend = MockBackend::with_reply(reply.to_string());
        Arc::new(AgentCoordinator::new(
            backend,
            Arc::new(ThreadSessionRegistry::new()),
            PromptBuilder::load(None),
            "fern",
        ))
    }

    #[tokio::test]
    async fn create_delay_job_is_pending() {
        let h = handle();
        let job = h
            .create(CreateJobInput {
                prompt: "say hello".to_string(),
                schedule: ScheduleSpec::DelayMs(60_000),
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.job_type, JobKind::OneShot);
        assert!(job.scheduled_at > Utc::now());
    }

    #[tokio::test]
    async fn create_rejects_bad_cron_expression() {
        let h = handle();
        let err = h
            .create(CreateJobInput {
                prompt: "say hello".to_string(),
                schedule: ScheduleSpec::Cron("not a cron".to_string()),
                metadata: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
    }

    #[tokio::test]
    async fn cancel_pending_job_succeeds() {
        let h = handle();
        let job = h
            .create(CreateJobInput {
                prompt: "say hello".to_string(),
                schedule: ScheduleSpec::DelayMs(60_000),
                metadata: None,
            })
            .await
            .unwrap();
        let cancelled = h.cancel(job.id.as_str()).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_running_job_is_rejected() {
        let h = handle();
        let job = h
            .create(CreateJobInput {
                prompt: "say hello".to_string(),
                schedule: ScheduleSpec::At(Utc::now() - chrono::Duration::seconds(1)),
                metadata: None,
            })
            .await
            .unwrap();
        {
            let db = h.db();
            let conn = db.lock().await;
            conn.execute(
                "UPDATE jobs SET status='running' WHERE id=?1",
                rusqlite::params![job.id.as_str()],
            )
            .unwrap();
        }
        let err = h.cancel(job.id.as_str()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NotCancellable { .. }));
    }

    #[tokio::test]
    async fn due_job_fires_and_completes() {
        let h = handle();
        let job = h
            .create(CreateJobInput {
                prompt: "say hello".to_string(),
                schedule: ScheduleSpec::At(Utc::now() - chrono::Duration::seconds(1)),
                metadata: None,
            })
            .await
            .unwrap();

        let engine = Arc::new(SchedulerEngine::new(&h, coordinator("hi there"), 2, 1000));
        engine.tick().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let done = h.get(job.id.as_str()).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn recover_stale_resets_running_to_pending() {
        let h = handle();
        let job = h
            .create(CreateJobInput {
                prompt: "say hello".to_string(),
                schedule: ScheduleSpec::DelayMs(60_000),
                metadata: None,
            })
            .await
            .unwrap();
        {
            let db = h.db();
            let conn = db.lock().await;
            conn.execute(
                "UPDATE jobs SET status='running' WHERE id=?1",
                rusqlite::params![job.id.as_str()],
            )
            .unwrap();
        }

        let engine = SchedulerEngine::new(&h, coordinator("hi there"), 2, 1000);
        let n = engine.recover_stale().await.unwrap();
        assert_eq!(n, 1);
        let recovered = h.get(job.id.as_str()).await.unwrap();
        assert_eq!(recovered.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_run_loop() {
        let h = handle();
        let engine = SchedulerEngine::new(&h, coordinator("hi"), 1, 10);
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(engine.run(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .expect("run loop did not stop after shutdown signal")
            .unwrap();
    }
}
