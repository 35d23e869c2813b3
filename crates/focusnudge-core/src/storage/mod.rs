//! Collaborator interfaces and the stores that implement them.
//!
//! The core never owns persistence. It talks to four narrow traits:
//!
//! - [`SessionStore`]: the single active-session slot, written conditionally
//! - [`TaskRepository`]: task status and completion records
//! - [`SettingsStore`]: nudge mode and the completed-task counter
//! - [`ProjectSource`]: read-only project/task listing for the nudge engine
//!
//! [`MemoryStore`] and the SQLite-backed [`Database`] implement all four.

mod config;
pub mod database;
pub mod memory;

pub use config::{Config, NotificationsConfig, NudgeConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::watch;

use crate::error::{ConfigError, StoreError};
use crate::project::Project;
use crate::settings::{NudgeMode, Settings};
use crate::task::{CompletionRecord, Task, TaskStatus};
use crate::timer::Session;

/// The shared active-session slot.
///
/// Every write that depends on the current slot content goes through
/// [`try_set_active_session`](SessionStore::try_set_active_session), so two
/// clients racing on the same slot cannot both succeed.
pub trait SessionStore: Send + Sync {
    /// The session currently holding the slot, if it is active.
    fn get_active_session(&self) -> Result<Option<Session>, StoreError>;

    /// Replace the slot with `next` iff the active session equals
    /// `expected_previous` (`None` meaning "no active session").
    ///
    /// Returns `false` without writing when the expectation does not hold.
    fn try_set_active_session(
        &self,
        next: &Session,
        expected_previous: Option<&Session>,
    ) -> Result<bool, StoreError>;

    /// Unconditionally empty the slot.
    fn clear_active_session(&self) -> Result<(), StoreError>;
}

/// Change notification for stores that can push slot updates.
pub trait SessionWatch {
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

pub trait TaskRepository: Send + Sync {
    fn update_task_status(&self, task_id: &str, status: TaskStatus) -> Result<(), StoreError>;

    fn record_completion(&self, record: &CompletionRecord) -> Result<(), StoreError>;

    /// Mark a task complete. Returns `true` only if this call performed the
    /// incomplete -> complete transition.
    fn mark_complete(
        &self,
        task_id: &str,
        completed_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<bool, StoreError>;
}

pub trait SettingsStore: Send + Sync {
    /// Bump the completed-task counter, returning the new total.
    fn increment_completed_counter(&self) -> Result<u64, StoreError>;

    fn read_nudge_mode(&self) -> Result<NudgeMode, StoreError>;

    fn read_settings(&self) -> Result<Settings, StoreError>;

    fn write_nudge_mode(&self, mode: NudgeMode) -> Result<(), StoreError>;
}

pub trait ProjectSource: Send + Sync {
    fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
}

/// Slot comparison used by both stores: an inactive stored session counts
/// as an empty slot.
pub(crate) fn slot_matches(current: Option<&Session>, expected: Option<&Session>) -> bool {
    let current = current.filter(|s| s.active);
    match (current, expected) {
        (None, None) => true,
        (Some(cur), Some(exp)) => cur == exp,
        _ => false,
    }
}

/// Returns `~/.config/focusnudge[-dev]/`.
///
/// `FOCUSNUDGE_DATA_DIR` overrides the location outright; otherwise
/// `FOCUSNUDGE_ENV=dev` selects the development directory.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSNUDGE_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSNUDGE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusnudge-dev")
            } else {
                base_dir.join("focusnudge")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
