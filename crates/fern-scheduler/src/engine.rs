use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fern_backend::{AgentCoordinator, RunTurnInput};
use fern_core::ids::JobId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{error, info, instrument, warn};

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    schedule::{next_fire, validate_cron},
    types::{CreateJobInput, JobKind, JobStatus, ScheduleSpec, ScheduledJob},
};

/// Shared handle for job CRUD (`create`/`list`/`get`/`cancel`), usable from
/// an HTTP handler concurrently with the dispatcher loop — both hold the
/// same connection behind an async mutex.
pub struct SchedulerHandle {
    db: Arc<Mutex<Connection>>,
}

impl SchedulerHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn db(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }

    /// Insert a new job. Exactly one scheduling option is expected in
    /// `input.schedule`; cron expressions are validated before the row is
    /// written.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateJobInput) -> Result<ScheduledJob> {
        if input.prompt.trim().is_empty() {
            return Err(SchedulerError::InvalidSchedule("prompt must not be empty".into()));
        }

        let now = Utc::now();
        let (job_type, scheduled_at, cron_expr) = match &input.schedule {
            ScheduleSpec::At(at) => (JobKind::OneShot, *at, None),
            ScheduleSpec::DelayMs(ms) => (JobKind::OneShot, now + chrono::Duration::milliseconds(*ms), None),
            ScheduleSpec::Cron(expr) => {
                validate_cron(expr)?;
                let first = next_fire(expr, now)?;
                (JobKind::Recurring, first, Some(expr.clone()))
            }
        };

        let id = JobId::new();
        let now_str = now.to_rfc3339();
        let metadata = input.metadata.unwrap_or_else(|| serde_json::json!({}));

        let conn = self.db.lock().await;
        conn.execute(
            "INSERT INTO jobs
             (id, job_type, status, prompt, scheduled_at, cron_expr, metadata, created_at, updated_at)
             VALUES (?1,?2,'pending',?3,?4,?5,?6,?7,?7)",
            params![
                id.as_str(),
                job_type.to_string(),
                input.prompt,
                scheduled_at.to_rfc3339(),
                cron_expr,
                serde_json::to_string(&metadata)?,
                now_str,
            ],
        )?;
        info!(job_id = %id, %job_type, "job created");
        drop(conn);

        self.get(id.as_str()).await
    }

    pub async fn list(&self, status: Option<JobStatus>, limit: Option<i64>) -> Result<Vec<ScheduledJob>> {
        let conn = self.db.lock().await;
        let limit = limit.unwrap_or(100);
        let jobs = match status {
            Some(s) => {
                let mut stmt = conn.prepare(
                    "SELECT id, job_type, status, prompt, scheduled_at, cron_expr, metadata,
                            created_at, updated_at, last_fired_at, last_error
                     FROM jobs WHERE status = ?1 ORDER BY scheduled_at LIMIT ?2",
                )?;
                stmt.query_map(params![s.to_string(), limit], row_to_job)?
                    .filter_map(|r| r.ok())
                    .collect()
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, job_type, status, prompt, scheduled_at, cron_expr, metadata,
                            created_at, updated_at, last_fired_at, last_error
                     FROM jobs ORDER BY scheduled_at LIMIT ?1",
                )?;
                stmt.query_map(params![limit], row_to_job)?
                    .filter_map(|r| r.ok())
                    .collect()
            }
        };
        Ok(jobs)
    }

    pub async fn get(&self, id: &str) -> Result<ScheduledJob> {
        let conn = self.db.lock().await;
        fetch_one_locked(&conn, id)
    }

    /// Cancel a job. Only `pending` jobs can be cancelled — a job already
    /// claimed by the dispatcher runs to completion.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> Result<ScheduledJob> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.lock().await;
        let updated = conn.execute(
            "UPDATE jobs SET status='cancelled', updated_at=?1
             WHERE id=?2 AND status='pending'",
            params![now, id],
        )?;

        if updated == 0 {
            let existing = fetch_one_locked(&conn, id)?;
            return Err(SchedulerError::NotCancellable {
                id: id.to_string(),
                status: existing.status.to_string(),
            });
        }

        fetch_one_locked(&conn, id)
    }
}

/// Dispatcher: polls for due jobs and runs them through the same turn
/// coordinator the main session path uses.
pub struct SchedulerEngine {
    db: Arc<Mutex<Connection>>,
    coordinator: Arc<AgentCoordinator>,
    semaphore: Arc<Semaphore>,
    tick_interval: Duration,
}

impl SchedulerEngine {
    pub fn new(
        handle: &SchedulerHandle,
        coordinator: Arc<AgentCoordinator>,
        max_concurrent: usize,
        tick_interval_ms: u64,
    ) -> Self {
        Self {
            db: handle.db(),
            coordinator,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tick_interval: Duration::from_millis(tick_interval_ms.max(1)),
        }
    }

    /// On startup, any row stuck in `running` belongs to a dispatch that died
    /// mid-turn. Unlike subagent tasks, scheduled jobs are idempotent prompts
    /// that are safe to retry, so these are reset to `pending` rather than
    /// force-failed.
    #[instrument(skip(self))]
    pub async fn recover_stale(&self) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.lock().await;
        let n = conn.execute(
            "UPDATE jobs SET status='pending', updated_at=?1 WHERE status='running'",
            [&now],
        )?;
        if n > 0 {
            warn!(count = n, "reset stale running jobs to pending on startup");
        }
        Ok(n)
    }

    /// Main dispatch loop. Polls every `tick_interval` until `shutdown`
    /// broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        let mut interval = tokio::time::interval(self.tick_interval);
        let this = Arc::new(self);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = this.tick().await {
                        error!("scheduler tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Claim and dispatch every job whose `scheduled_at` has arrived.
    pub(crate) async fn tick(self: &Arc<Self>) -> Result<()> {
        let now_str = Utc::now().to_rfc3339();
        let due: Vec<String> = {
            let conn = self.db.lock().await;
            let mut stmt = conn.prepare_cached(
                "SELECT id FROM jobs WHERE status = 'pending' AND scheduled_at <= ?1",
            )?;
            stmt.query_map([&now_str], |row| row.get::<_, String>(0))?
                .filter_map(|r| r.ok())
                .collect()
        };

        for id in due {
            self.dispatch(id).await;
        }
        Ok(())
    }

    /// Atomically claim one due job and, if the claim succeeds, spawn its
    /// worker. A no-op if another tick (or a concurrent cancel) already
    /// moved the row out of `pending`.
    pub(crate) async fn dispatch(self: &Arc<Self>, id: String) {
        let claimed = {
            let conn = self.db.lock().await;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE jobs SET status='running', updated_at=?1 WHERE id=?2 AND status='pending'",
                params![now, id],
            )
        };

        match claimed {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                error!(job_id = %id, error = %e, "failed to claim scheduled job");
                return;
            }
        }

        let db = Arc::clone(&self.db);
        let coordinator = Arc::clone(&self.coordinator);
        let semaphore = Arc::clone(&self.semaphore);

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            run_claimed_job(db, coordinator, id).await;
        });
    }
}

/// Runs the claimed job's turn and re-arms or completes the row.
///
/// `run_turn` never throws — any error surfaces as response text, not a
/// `Result::Err` — so every fired job is treated as a success for status
/// purposes. `Failed` is reserved for the one place something here really
/// can error out after a successful turn: computing the next cron fire time
/// for a `Recurring` job.
async fn run_claimed_job(db: Arc<Mutex<Connection>>, coordinator: Arc<AgentCoordinator>, id: String) {
    let job = {
        let conn = db.lock().await;
        match fetch_one_locked(&conn, &id) {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = %id, error = %e, "claimed job vanished before run");
                return;
            }
        }
    };

    let output = coordinator
        .run_turn(RunTurnInput {
            thread_id: format!("scheduler_{id}"),
            message: job.prompt,
            channel: Some("scheduler".to_string()),
            channel_user_id: None,
            attachments: Vec::new(),
            agent_type: None,
        })
        .await;
    let _ = output.response;

    let now = Utc::now().to_rfc3339();
    let result = match job.job_type {
        JobKind::OneShot => {
            let conn = db.lock().await;
            conn.execute(
                "UPDATE jobs SET status='completed', last_fired_at=?1, updated_at=?1
                 WHERE id=?2 AND status='running'",
                params![now, id],
            )
        }
        JobKind::Recurring => {
            let expr = job.cron_expr.as_deref().unwrap_or_default();
            match next_fire(expr, Utc::now()) {
                Ok(next) => {
                    let conn = db.lock().await;
                    conn.execute(
                        "UPDATE jobs SET status='pending', scheduled_at=?1, last_fired_at=?2,
                         updated_at=?2 WHERE id=?3 AND status='running'",
                        params![next.to_rfc3339(), now, id],
                    )
                }
                Err(e) => {
                    error!(job_id = %id, error = %e, "failed to compute next cron fire time");
                    let conn = db.lock().await;
                    conn.execute(
                        "UPDATE jobs SET status='failed', last_error=?1, last_fired_at=?2,
                         updated_at=?2 WHERE id=?3 AND status='running'",
                        params![e.to_string(), now, id],
                    )
                }
            }
        }
    };

    if let Err(e) = result {
        error!(job_id = %id, error = %e, "failed to write back scheduled job result");
    }
}

fn fetch_one_locked(conn: &Connection, id: &str) -> Result<ScheduledJob> {
    conn.query_row(
        "SELECT id, job_type, status, prompt, scheduled_at, cron_expr, metadata,
                created_at, updated_at, last_fired_at, last_error
         FROM jobs WHERE id = ?1",
        [id],
        row_to_job,
    )
    .optional()?
    .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })
}

fn row_to_job(row: &Row) -> rusqlite::Result<ScheduledJob> {
    let job_type: String = row.get(1)?;
    let status: String = row.get(2)?;
    let metadata: String = row.get(6)?;
    Ok(ScheduledJob {
        id: JobId::from(row.get::<_, String>(0)?),
        job_type: job_type.parse().unwrap_or(JobKind::OneShot),
        status: status.parse().unwrap_or(JobStatus::Failed),
        prompt: row.get(3)?,
        scheduled_at: row.get::<_, String>(4)?.parse().unwrap_or_else(|_| Utc::now()),
        cron_expr: row.get(5)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        last_fired_at: row.get(9)?,
        last_error: row.get(10)?,
    })
}
