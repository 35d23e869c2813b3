//! In-process store implementing every collaborator trait.
//!
//! Hosts that embed the core without a database (and the test suite) use
//! this. Slot changes are published on a `watch` channel.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::watch;

use super::{
    slot_matches, ProjectSource, SessionStore, SessionWatch, SettingsStore, TaskRepository,
};
use crate::error::StoreError;
use crate::project::Project;
use crate::settings::{NudgeMode, Settings};
use crate::task::{CompletionRecord, Task, TaskStatus};
use crate::timer::Session;

#[derive(Debug, Default)]
struct Inner {
    slot: Option<Session>,
    projects: BTreeMap<String, Project>,
    tasks: BTreeMap<String, Task>,
    completions: Vec<CompletionRecord>,
    settings: Settings,
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    slot_tx: watch::Sender<Option<Session>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (slot_tx, _) = watch::channel(None);
        Self {
            inner: Mutex::new(Inner::default()),
            slot_tx,
        }
    }

    pub fn with_settings(settings: Settings) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            inner.settings = settings;
        }
        store
    }

    pub fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        let mut inner = self.inner.lock()?;
        inner.projects.insert(project.id.clone(), project);
        Ok(())
    }

    pub fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        let mut inner = self.inner.lock()?;
        inner.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.inner.lock()?.tasks.get(task_id).cloned())
    }

    pub fn completions(&self) -> Result<Vec<CompletionRecord>, StoreError> {
        Ok(self.inner.lock()?.completions.clone())
    }

    /// The raw slot, including an inactive last session.
    pub fn slot(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.lock()?.slot.clone())
    }
}

impl SessionStore for MemoryStore {
    fn get_active_session(&self) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.lock()?;
        Ok(inner.slot.clone().filter(|s| s.active))
    }

    fn try_set_active_session(
        &self,
        next: &Session,
        expected_previous: Option<&Session>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock()?;
        if !slot_matches(inner.slot.as_ref(), expected_previous) {
            return Ok(false);
        }
        inner.slot = Some(next.clone());
        let published = inner.slot.clone().filter(|s| s.active);
        drop(inner);
        self.slot_tx.send_replace(published);
        Ok(true)
    }

    fn clear_active_session(&self) -> Result<(), StoreError> {
        self.inner.lock()?.slot = None;
        self.slot_tx.send_replace(None);
        Ok(())
    }
}

impl SessionWatch for MemoryStore {
    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.slot_tx.subscribe()
    }
}

impl TaskRepository for MemoryStore {
    fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock()?;
        let task = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::task_not_found(task_id))?;
        task.status = status;
        Ok(())
    }

    fn record_completion(&self, record: &CompletionRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock()?;
        if !inner.tasks.contains_key(&record.task_id) {
            return Err(StoreError::task_not_found(&record.task_id));
        }
        inner.completions.push(record.clone());
        Ok(())
    }

    fn mark_complete(
        &self,
        task_id: &str,
        completed_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock()?;
        let task = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::task_not_found(task_id))?;
        Ok(task.mark_complete(completed_at, notes.map(str::to_string)))
    }
}

impl SettingsStore for MemoryStore {
    fn increment_completed_counter(&self) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock()?;
        inner.settings.total_tasks_completed += 1;
        Ok(inner.settings.total_tasks_completed)
    }

    fn read_nudge_mode(&self) -> Result<NudgeMode, StoreError> {
        Ok(self.inner.lock()?.settings.nudge_mode)
    }

    fn read_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.inner.lock()?.settings.clone())
    }

    fn write_nudge_mode(&self, mode: NudgeMode) -> Result<(), StoreError> {
        self.inner.lock()?.settings.nudge_mode = mode;
        Ok(())
    }
}

impl ProjectSource for MemoryStore {
    fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.inner.lock()?.projects.values().cloned().collect())
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.inner.lock()?.tasks.values().cloned().collect())
    }
}
