use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fern_backend::{AgentCoordinator, RunTurnInput};
use fern_core::coordinator::CompletionCoordinator;
use fern_core::ids::TaskId;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, instrument, warn};

use crate::error::{Result, SubagentError};
use crate::types::{SpawnTaskInput, SubagentStatus, SubagentTask, SubagentType};

/// Default budget for a blocking `getTask(wait=true)` call when the caller
/// doesn't specify one.
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Spawns and tracks background, read-only subagent runs. Every task is a
/// fresh, context-free turn through the same [`AgentCoordinator`] the main
/// session path uses — a subagent is just a turn whose thread id happens to
/// be synthetic (`subagent_{id}`) and whose prompt is self-contained.
pub struct SubagentManager {
    db: Arc<Mutex<Connection>>,
    coordinator: Arc<AgentCoordinator>,
    completion: Arc<CompletionCoordinator<SubagentTask>>,
    semaphore: Arc<Semaphore>,
}

impl SubagentManager {
    pub fn new(conn: Connection, coordinator: Arc<AgentCoordinator>, max_concurrent: usize) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            coordinator,
            completion: Arc::new(CompletionCoordinator::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    /// Write a `pending` row and hand it to the worker pool. Returns
    /// immediately with the row as written, before any work has run.
    #[instrument(skip(self, input), fields(task_type = input.task_type.as_str()))]
    pub async fn spawn_task(&self, input: SpawnTaskInput) -> Result<SubagentTask> {
        if input.prompt.trim().is_empty() {
            return Err(SubagentError::Validation("prompt must not be empty".into()));
        }
        if input.description.trim().is_empty() {
            return Err(SubagentError::Validation(
                "description must not be empty".into(),
            ));
        }

        let id = TaskId::new();
        let now = Utc::now().to_rfc3339();
        let metadata = input.metadata.unwrap_or_else(|| serde_json::json!({}));

        let task = SubagentTask {
            id: id.clone(),
            task_type: input.task_type,
            status: SubagentStatus::Pending,
            prompt: input.prompt,
            description: input.description,
            parent_session_id: input.parent_session_id,
            metadata,
            result: None,
            error: None,
            created_at: now.clone(),
            updated_at: now.clone(),
            completed_at: None,
        };

        {
            let conn = self.db.lock().await;
            conn.execute(
                "INSERT INTO subagent_tasks
                 (id, task_type, status, prompt, description, parent_session_id,
                  metadata, created_at, updated_at)
                 VALUES (?1,?2,'pending',?3,?4,?5,?6,?7,?7)",
                params![
                    task.id.as_str(),
                    task.task_type.as_str(),
                    task.prompt,
                    task.description,
                    task.parent_session_id,
                    serde_json::to_string(&task.metadata)?,
                    now,
                ],
            )?;
        }

        self.enqueue(id).await;
        Ok(task)
    }

    /// Atomically claim the `pending` row and, if successful, spawn the
    /// worker closure. A no-op if the row is no longer `pending` (already
    /// claimed, or cancelled before the claim ran).
    async fn enqueue(&self, id: TaskId) {
        let claimed = {
            let conn = self.db.lock().await;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE subagent_tasks SET status='running', updated_at=?1
                 WHERE id=?2 AND status='pending'",
                params![now, id.as_str()],
            )
        };

        match claimed {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                error!(task_id = %id, error = %e, "failed to claim subagent task");
                return;
            }
        }

        let db = Arc::clone(&self.db);
        let coordinator = Arc::clone(&self.coordinator);
        let completion = Arc::clone(&self.completion);
        let semaphore = Arc::clone(&self.semaphore);

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            run_claimed_task(db, coordinator, completion, id).await;
        });
    }

    /// Read one task by id.
    #[instrument(skip(self))]
    pub async fn get_task(
        &self,
        id: &str,
        wait: bool,
        timeout: Option<Duration>,
    ) -> Result<SubagentTask> {
        let current = self.fetch_one(id).await?;
        if current.status.is_terminal() || !wait {
            return Ok(current);
        }

        let timeout = timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT);
        if let Err(e) = self.completion.wait_for(id, timeout).await {
            warn!(task_id = id, error = %e, "getTask wait ended without a signal");
        }

        self.fetch_one(id).await
    }

    /// Mark a task cancelled if it's currently `pending` or `running`.
    #[instrument(skip(self))]
    pub async fn cancel_task(&self, id: &str) -> Result<SubagentTask> {
        let now = Utc::now().to_rfc3339();
        let updated = {
            let conn = self.db.lock().await;
            conn.execute(
                "UPDATE subagent_tasks SET status='cancelled', updated_at=?1, completed_at=?1
                 WHERE id=?2 AND status IN ('pending','running')",
                params![now, id],
            )?
        };

        if updated == 0 {
            let existing = self.fetch_one(id).await?;
            return Err(SubagentError::NotCancellable {
                id: id.to_string(),
                status: existing.status.to_string(),
            });
        }

        let task = self.fetch_one(id).await?;
        self.completion.signal(id, task.clone());
        Ok(task)
    }

    /// On startup, any row still `running` belongs to a process that died
    /// mid-turn. Subagent tasks are conversation-scoped and not retryable,
    /// so these are force-failed rather than requeued.
    #[instrument(skip(self))]
    pub async fn recover_stale(&self) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.lock().await;
        let n = conn.execute(
            "UPDATE subagent_tasks SET status='failed', error='stale task',
             updated_at=?1, completed_at=?1 WHERE status='running'",
            params![now],
        )?;
        if n > 0 {
            warn!(count = n, "force-failed stale subagent tasks on startup");
        }
        Ok(n)
    }

    async fn fetch_one(&self, id: &str) -> Result<SubagentTask> {
        let conn = self.db.lock().await;
        fetch_one_locked(&conn, id)
    }
}

fn fetch_one_locked(conn: &Connection, id: &str) -> Result<SubagentTask> {
    conn.query_row(
        "SELECT id, task_type, status, prompt, description, parent_session_id,
                metadata, result, error, created_at, updated_at, completed_at
         FROM subagent_tasks WHERE id = ?1",
        [id],
        row_to_task,
    )
    .optional()?
    .ok_or_else(|| SubagentError::NotFound { id: id.to_string() })
}

/// Runs the claimed task to completion and writes back the terminal row.
/// `run_turn` never throws (spec contract), so a response is always
/// produced; the only way this task ends up `failed` instead of
/// `completed` is if writing the result back to the store itself errors.
async fn run_claimed_task(
    db: Arc<Mutex<Connection>>,
    coordinator: Arc<AgentCoordinator>,
    completion: Arc<CompletionCoordinator<SubagentTask>>,
    id: TaskId,
) {
    let task_type = {
        let conn = db.lock().await;
        match fetch_one_locked(&conn, id.as_str()) {
            Ok(task) => task.task_type,
            Err(e) => {
                error!(task_id = %id, error = %e, "claimed task vanished before run");
                return;
            }
        }
    };

    let prompt = {
        let conn = db.lock().await;
        match fetch_one_locked(&conn, id.as_str()) {
            Ok(task) => task.prompt,
            Err(_) => return,
        }
    };

    let message = format!("{prompt}\n\n{}", task_type.directive());

    let output = coordinator
        .run_turn(RunTurnInput {
            thread_id: format!("subagent_{id}"),
            message,
            channel: Some("subagent".to_string()),
            channel_user_id: None,
            attachments: Vec::new(),
            agent_type: Some(task_type.as_str().to_string()),
        })
        .await;

    let now = Utc::now().to_rfc3339();
    let write_result = {
        let conn = db.lock().await;
        conn.execute(
            "UPDATE subagent_tasks SET status='completed', result=?1, updated_at=?2, completed_at=?2
             WHERE id=?3 AND status='running'",
            params![output.response, now, id.as_str()],
        )
    };

    match write_result {
        Ok(0) => {
            // Row was cancelled out from under us mid-run; the cancellation
            // already signalled any waiter, so there's nothing left to do.
        }
        Ok(_) => {
            let conn = db.lock().await;
            if let Ok(task) = fetch_one_locked(&conn, id.as_str()) {
                drop(conn);
                completion.signal(id.as_str(), task);
            }
        }
        Err(e) => {
            error!(task_id = %id, error = %e, "failed to write back subagent task result");
        }
    }
}

fn row_to_task(row: &Row) -> rusqlite::Result<SubagentTask> {
    let task_type: String = row.get(1)?;
    let status: String = row.get(2)?;
    let metadata: String = row.get(6)?;
    Ok(SubagentTask {
        id: TaskId::from(row.get::<_, String>(0)?),
        task_type: task_type.parse().unwrap_or(SubagentType::Explore),
        status: status.parse().unwrap_or(SubagentStatus::Failed),
        prompt: row.get(3)?,
        description: row.get(4)?,
        parent_session_id: row.get(5)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        result: row.get(7)?,
        error: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}
