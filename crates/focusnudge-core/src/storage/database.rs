//! SQLite-backed store.
//!
//! Provides persistent storage for:
//! - Projects and their tasks
//! - Per-session completion records
//! - Key-value store for the active-session slot and settings
//!
//! The connection sits behind a mutex so one `Database` can be shared
//! between the controller and the service. Slot writes additionally take
//! a `BEGIN IMMEDIATE` transaction, which serialises them across processes
//! sharing the same file.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{data_dir, slot_matches, ProjectSource, SessionStore, SettingsStore, TaskRepository};
use crate::error::{CoreError, StoreError, ValidationError};
use crate::project::{Project, ProjectStatus};
use crate::settings::{NudgeMode, Settings};
use crate::task::{CompletionRecord, Task, TaskStatus};
use crate::timer::Session;

const KEY_ACTIVE_SESSION: &str = "active_session";
const KEY_NUDGE_MODE: &str = "nudge_mode";
const KEY_TASKS_COMPLETED: &str = "total_tasks_completed";
const KEY_NTFY_URL: &str = "ntfy_url";

/// SQLite database implementing every collaborator trait.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/focusnudge/focusnudge.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("focusnudge.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        Ok(self.conn.lock()?)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS projects (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                owner       TEXT NOT NULL DEFAULT '',
                category    TEXT NOT NULL DEFAULT '',
                priority    INTEGER NOT NULL CHECK (priority BETWEEN 1 AND 10),
                status      TEXT NOT NULL DEFAULT 'active',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id           TEXT PRIMARY KEY,
                project_id   TEXT NOT NULL REFERENCES projects(id),
                title        TEXT NOT NULL,
                is_complete  INTEGER NOT NULL DEFAULT 0,
                status       TEXT NOT NULL DEFAULT 'idle',
                created_at   TEXT NOT NULL,
                completed_at TEXT,
                due_date     TEXT,
                tags         TEXT NOT NULL DEFAULT '[]',
                notes        TEXT
            );

            CREATE TABLE IF NOT EXISTS completions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id          TEXT NOT NULL REFERENCES tasks(id),
                duration_seconds INTEGER NOT NULL,
                notes            TEXT,
                recorded_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks(project_id);
            CREATE INDEX IF NOT EXISTS idx_completions_task_id ON completions(task_id);",
        )?;
        Ok(())
    }

    // ── Projects ─────────────────────────────────────────────────────

    pub fn add_project(&self, project: &Project) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO projects (id, name, owner, category, priority, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                project.id,
                project.name,
                project.owner,
                project.category,
                project.priority,
                project.status.to_string(),
                project.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Result<Project, StoreError> {
        self.conn()?
            .query_row(
                "SELECT id, name, owner, category, priority, status, created_at
                 FROM projects WHERE id = ?1",
                params![id],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::project_not_found(id))
    }

    /// Move a project to `status`. Archived projects may only be reactivated.
    pub fn set_project_status(&self, id: &str, status: ProjectStatus) -> Result<Project, CoreError> {
        let mut project = self.get_project(id)?;
        if !project.can_transition_to(status) {
            return Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("cannot move project '{id}' from {} to {status}", project.status),
            }
            .into());
        }
        self.conn()?.execute(
            "UPDATE projects SET status = ?1 WHERE id = ?2",
            params![status.to_string(), id],
        )
        .map_err(StoreError::from)?;
        project.status = status;
        Ok(project)
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn add_task(&self, task: &Task) -> Result<(), StoreError> {
        // Surface a missing project as NotFound rather than a constraint error.
        self.get_project(&task.project_id)?;
        let tags = serde_json::to_string(&task.tags).map_err(|e| StoreError::Corrupt {
            key: format!("tasks.{}.tags", task.id),
            message: e.to_string(),
        })?;
        self.conn()?.execute(
            "INSERT INTO tasks (id, project_id, title, is_complete, status, created_at,
                                completed_at, due_date, tags, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.project_id,
                task.title,
                task.is_complete,
                task.status.as_str(),
                task.created_at.to_rfc3339(),
                task.completed_at.map(|t| t.to_rfc3339()),
                task.due_date.map(|t| t.to_rfc3339()),
                tags,
                task.notes,
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Task, StoreError> {
        self.conn()?
            .query_row(
                &format!("{TASK_COLUMNS} WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    pub fn completions_for(&self, task_id: &str) -> Result<Vec<CompletionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT task_id, duration_seconds, notes, recorded_at
             FROM completions WHERE task_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![task_id], |row| {
            Ok(CompletionRecord {
                task_id: row.get(0)?,
                duration_seconds: row.get(1)?,
                notes: row.get(2)?,
                recorded_at: parse_ts(3, &row.get::<_, String>(3)?)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Store (or with `None`, clear) the ntfy URL setting.
    pub fn write_ntfy_url(&self, url: Option<&str>) -> Result<(), StoreError> {
        match url.filter(|u| !u.is_empty()) {
            Some(url) => self.kv_set(KEY_NTFY_URL, url),
            None => self.kv_delete(KEY_NTFY_URL),
        }
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        kv_get(&*self.conn()?, key)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        kv_set(&*self.conn()?, key, value)
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

const TASK_COLUMNS: &str = "SELECT id, project_id, title, is_complete, status, created_at,
                                   completed_at, due_date, tags, notes
                            FROM tasks";

fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?)
}

fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn decode_slot(raw: Option<String>) -> Result<Option<Session>, StoreError> {
    raw.map(|json| {
        serde_json::from_str::<Session>(&json).map_err(|e| StoreError::Corrupt {
            key: KEY_ACTIVE_SESSION.into(),
            message: e.to_string(),
        })
    })
    .transpose()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let status: String = row.get(5)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        owner: row.get(2)?,
        category: row.get(3)?,
        priority: row.get(4)?,
        status: status
            .parse::<ProjectStatus>()
            .map_err(|e| conversion_failure(5, e))?,
        created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(4)?;
    let tags: String = row.get(8)?;
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        is_complete: row.get(3)?,
        status: TaskStatus::parse(&status).unwrap_or_default(),
        created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
        completed_at: parse_opt_ts(6, row.get(6)?)?,
        due_date: parse_opt_ts(7, row.get(7)?)?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_failure(8, e))?,
        notes: row.get(9)?,
    })
}

impl SessionStore for Database {
    fn get_active_session(&self) -> Result<Option<Session>, StoreError> {
        let raw = kv_get(&*self.conn()?, KEY_ACTIVE_SESSION)?;
        Ok(decode_slot(raw)?.filter(|s| s.active))
    }

    fn try_set_active_session(
        &self,
        next: &Session,
        expected_previous: Option<&Session>,
    ) -> Result<bool, StoreError> {
        let encoded = serde_json::to_string(next).map_err(|e| StoreError::Corrupt {
            key: KEY_ACTIVE_SESSION.into(),
            message: e.to_string(),
        })?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = decode_slot(kv_get(&tx, KEY_ACTIVE_SESSION)?)?;
        if !slot_matches(current.as_ref(), expected_previous) {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }
        kv_set(&tx, KEY_ACTIVE_SESSION, &encoded)?;
        tx.commit()?;
        Ok(true)
    }

    fn clear_active_session(&self) -> Result<(), StoreError> {
        self.kv_delete(KEY_ACTIVE_SESSION)
    }
}

impl TaskRepository for Database {
    fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE tasks SET status = ?1 WHERE id = ?2",
            params![status.as_str(), task_id],
        )?;
        if changed == 0 {
            return Err(StoreError::task_not_found(task_id));
        }
        Ok(())
    }

    fn record_completion(&self, record: &CompletionRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
            params![record.task_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::task_not_found(&record.task_id));
        }
        conn.execute(
            "INSERT INTO completions (task_id, duration_seconds, notes, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.task_id,
                record.duration_seconds,
                record.notes,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn mark_complete(
        &self,
        task_id: &str,
        completed_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE tasks
             SET is_complete = 1, completed_at = ?1, status = 'idle', notes = COALESCE(?2, notes)
             WHERE id = ?3 AND is_complete = 0",
            params![completed_at.to_rfc3339(), notes, task_id],
        )?;
        if changed == 1 {
            return Ok(true);
        }
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
            params![task_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(false)
        } else {
            Err(StoreError::task_not_found(task_id))
        }
    }
}

impl SettingsStore for Database {
    fn increment_completed_counter(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = match kv_get(&tx, KEY_TASKS_COMPLETED)? {
            Some(raw) => raw.parse::<u64>().map_err(|e| StoreError::Corrupt {
                key: KEY_TASKS_COMPLETED.into(),
                message: e.to_string(),
            })?,
            None => 0,
        };
        let next = current + 1;
        kv_set(&tx, KEY_TASKS_COMPLETED, &next.to_string())?;
        tx.commit()?;
        Ok(next)
    }

    fn read_nudge_mode(&self) -> Result<NudgeMode, StoreError> {
        match self.kv_get(KEY_NUDGE_MODE)? {
            Some(raw) => raw.parse().map_err(|e: ValidationError| StoreError::Corrupt {
                key: KEY_NUDGE_MODE.into(),
                message: e.to_string(),
            }),
            None => Ok(NudgeMode::default()),
        }
    }

    fn read_settings(&self) -> Result<Settings, StoreError> {
        let total_tasks_completed = match self.kv_get(KEY_TASKS_COMPLETED)? {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| StoreError::Corrupt {
                key: KEY_TASKS_COMPLETED.into(),
                message: e.to_string(),
            })?,
            None => 0,
        };
        Ok(Settings {
            nudge_mode: self.read_nudge_mode()?,
            total_tasks_completed,
            ntfy_url: self.kv_get(KEY_NTFY_URL)?,
        })
    }

    fn write_nudge_mode(&self, mode: NudgeMode) -> Result<(), StoreError> {
        self.kv_set(KEY_NUDGE_MODE, mode.as_str())
    }
}

impl ProjectSource for Database {
    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, owner, category, priority, status, created_at
             FROM projects ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], project_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{TASK_COLUMNS} ORDER BY created_at, id"))?;
        let rows = stmt.query_map([], task_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}
