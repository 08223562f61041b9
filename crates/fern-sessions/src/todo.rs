use std::sync::Mutex;

use fern_core::ids::TodoId;
use rusqlite::{params, Connection};
use tracing::instrument;

use crate::error::{Result, SessionError};
use crate::types::{TodoStatus, TodoTask};

/// How long a `done`/`cancelled` task survives before the maintenance pass
/// purges it.
const RETENTION_DAYS: i64 = 7;

/// Thread-scoped checklist the agent can read and mutate mid-conversation.
pub struct TodoManager {
    db: Mutex<Connection>,
}

impl TodoManager {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    #[instrument(skip(self))]
    pub fn create(
        &self,
        thread_id: &str,
        title: &str,
        description: Option<&str>,
        sort_order: Option<i64>,
    ) -> Result<TodoTask> {
        if title.trim().is_empty() {
            return Err(SessionError::Validation("title must not be empty".into()));
        }

        let id = TodoId::new();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();

        let sort_order = match sort_order {
            Some(n) => n,
            None => {
                let max: Option<i64> = db
                    .query_row(
                        "SELECT MAX(sort_order) FROM tasks WHERE thread_id = ?1",
                        params![thread_id],
                        |r| r.get(0),
                    )
                    .unwrap_or(None);
                max.unwrap_or(-1) + 1
            }
        };

        db.execute(
            "INSERT INTO tasks (id, thread_id, title, description, status, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id.as_str(),
                thread_id,
                title,
                description,
                TodoStatus::Pending.to_string(),
                sort_order,
                now,
            ],
        )?;

        Ok(TodoTask {
            id,
            thread_id: thread_id.to_string(),
            title: title.to_string(),
            description: description.map(String::from),
            status: TodoStatus::Pending,
            sort_order,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// List tasks for a thread: `in_progress` first, then `pending` by
    /// `sort_order`, then `done`, then `cancelled`.
    #[instrument(skip(self))]
    pub fn list(&self, thread_id: &str) -> Result<Vec<TodoTask>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, thread_id, title, description, status, sort_order, created_at, updated_at
             FROM tasks
             WHERE thread_id = ?1
             ORDER BY
                CASE status
                    WHEN 'in_progress' THEN 0
                    WHEN 'pending'     THEN 1
                    WHEN 'done'        THEN 2
                    WHEN 'cancelled'   THEN 3
                    ELSE 4
                END,
                sort_order ASC",
        )?;
        let rows = stmt.query_map(params![thread_id], row_to_task)?;
        rows.map(|r| r.map_err(SessionError::from)).collect()
    }

    /// The single most actionable task for a thread, per the same ordering
    /// contract as `list`, or `None` if nothing pending/in-progress remains.
    #[instrument(skip(self))]
    pub fn next(&self, thread_id: &str) -> Result<Option<TodoTask>> {
        let tasks = self.list(thread_id)?;
        Ok(tasks
            .into_iter()
            .find(|t| matches!(t.status, TodoStatus::Pending | TodoStatus::InProgress)))
    }

    #[instrument(skip(self))]
    pub fn update(
        &self,
        id: &TodoId,
        status: Option<TodoStatus>,
        title: Option<&str>,
        description: Option<&str>,
        sort_order: Option<i64>,
    ) -> Result<TodoTask> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();

        let existing = fetch_one(&db, id.as_str())?;

        let new_status = status.unwrap_or(existing.status);
        let new_title = title.map(String::from).unwrap_or(existing.title);
        let new_description = description.map(String::from).or(existing.description);
        let new_sort_order = sort_order.unwrap_or(existing.sort_order);

        let rows_changed = db.execute(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, sort_order = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                new_title,
                new_description,
                new_status.to_string(),
                new_sort_order,
                now,
                id.as_str(),
            ],
        )?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound {
                id: id.as_str().to_string(),
            });
        }

        fetch_one(&db, id.as_str())
    }

    /// Maintenance pass: delete `done`/`cancelled` rows older than the
    /// retention window. Returns the number of rows removed.
    #[instrument(skip(self))]
    pub fn purge_old(&self) -> Result<usize> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(RETENTION_DAYS)).to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM tasks WHERE status IN ('done', 'cancelled') AND updated_at < ?1",
            params![cutoff],
        )?;
        Ok(n)
    }
}

fn fetch_one(db: &Connection, id: &str) -> Result<TodoTask> {
    db.query_row(
        "SELECT id, thread_id, title, description, status, sort_order, created_at, updated_at
         FROM tasks WHERE id = ?1",
        params![id],
        row_to_task,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => SessionError::NotFound { id: id.to_string() },
        other => SessionError::Database(other),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoTask> {
    let status_str: String = row.get(4)?;
    let status = status_str.parse().unwrap_or(TodoStatus::Pending);
    Ok(TodoTask {
        id: TodoId::from(row.get::<_, String>(0)?),
        thread_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status,
        sort_order: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TodoManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        TodoManager::new(conn)
    }

    #[test]
    fn create_then_list_returns_pending_first() {
        let mgr = manager();
        mgr.create("t1", "first", None, None).unwrap();
        mgr.create("t1", "second", None, None).unwrap();
        let tasks = mgr.list("t1").unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "first");
        assert_eq!(tasks[1].title, "second");
    }

    #[test]
    fn ordering_puts_in_progress_before_pending_and_done_last() {
        let mgr = manager();
        let a = mgr.create("t1", "a", None, None).unwrap();
        let b = mgr.create("t1", "b", None, None).unwrap();
        let c = mgr.create("t1", "c", None, None).unwrap();

        mgr.update(&b.id, Some(TodoStatus::InProgress), None, None, None)
            .unwrap();
        mgr.update(&c.id, Some(TodoStatus::Done), None, None, None)
            .unwrap();

        let tasks = mgr.list("t1").unwrap();
        assert_eq!(tasks[0].id, b.id);
        assert_eq!(tasks[1].id, a.id);
        assert_eq!(tasks[2].id, c.id);
    }

    #[test]
    fn next_skips_done_and_cancelled() {
        let mgr = manager();
        let a = mgr.create("t1", "a", None, None).unwrap();
        mgr.update(&a.id, Some(TodoStatus::Done), None, None, None)
            .unwrap();
        assert!(mgr.next("t1").unwrap().is_none());

        let b = mgr.create("t1", "b", None, None).unwrap();
        let next = mgr.next("t1").unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[test]
    fn update_missing_task_errors_not_found() {
        let mgr = manager();
        let result = mgr.update(&TodoId::new(), Some(TodoStatus::Done), None, None, None);
        assert!(matches!(result, Err(SessionError::NotFound { .. })));
    }

    #[test]
    fn create_rejects_empty_title() {
        let mgr = manager();
        assert!(matches!(
            mgr.create("t1", "  ", None, None),
            Err(SessionError::Validation(_))
        ));
    }
}
