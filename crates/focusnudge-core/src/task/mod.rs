//! Tasks and the completion records produced when work sessions end.
//!
//! Task status follows the active session:
//!
//! ```text
//!   IDLE ──start──> IN_PROGRESS ──finish / stop / complete──> IDLE
//! ```
//!
//! A task is `InProgress` exactly while a work session references it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    InProgress,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Idle
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::InProgress => "in_progress",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(TaskStatus::Idle),
            "in_progress" => Some(TaskStatus::InProgress),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Notes captured when the task was marked complete.
    #[serde(default)]
    pub notes: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            is_complete: false,
            status: TaskStatus::Idle,
            created_at,
            completed_at: None,
            due_date: None,
            tags: BTreeSet::new(),
            notes: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Apply the incomplete -> complete transition.
    ///
    /// Returns `false` (and changes nothing) if the task was already complete.
    pub fn mark_complete(&mut self, at: DateTime<Utc>, notes: Option<String>) -> bool {
        if self.is_complete {
            return false;
        }
        self.is_complete = true;
        self.completed_at = Some(at);
        self.status = TaskStatus::Idle;
        if notes.is_some() {
            self.notes = notes;
        }
        true
    }
}

/// Time spent on a task during one work session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub task_id: String,
    pub duration_seconds: u64,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_complete_transitions_once() {
        let now = Utc::now();
        let mut task = Task::new("t1", "p1", "Write report", now);
        task.status = TaskStatus::InProgress;

        assert!(task.mark_complete(now, Some("done".into())));
        assert!(task.is_complete);
        assert_eq!(task.status, TaskStatus::Idle);
        assert_eq!(task.completed_at, Some(now));

        assert!(!task.mark_complete(now, None));
        assert_eq!(task.notes.as_deref(), Some("done"));
    }

    #[test]
    fn status_string_round_trip() {
        for status in [TaskStatus::Idle, TaskStatus::InProgress] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("running"), None);
    }

    #[test]
    fn task_serializes_camel_case() {
        let task = Task::new("t1", "p1", "x", Utc::now()).with_tags(["deep", "writing"]);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["projectId"], "p1");
        assert_eq!(json["isComplete"], false);
        assert_eq!(json["tags"].as_array().unwrap().len(), 2);
    }
}
