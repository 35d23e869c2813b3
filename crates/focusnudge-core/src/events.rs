use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nudge::NudgeLevel;
use crate::timer::SessionType;

/// Every state change in the core produces an Event.
/// Hosts forward them to their UI or log them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        session_id: String,
        task_id: String,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    SessionDoubled {
        session_id: String,
        duration_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The session ran to completion (or was explicitly finished).
    SessionFinished {
        session_id: String,
        session_type: SessionType,
        task_id: Option<String>,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// A break was spawned after a work session.
    BreakStarted {
        session_id: String,
        duration_secs: u64,
        is_long: bool,
        at: DateTime<Utc>,
    },
    SessionStopped {
        session_id: String,
        session_type: SessionType,
        task_id: Option<String>,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// The slot was cleared without a normal ending.
    SessionCleared {
        session_id: Option<String>,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        total_completed: u64,
        at: DateTime<Utc>,
    },
    NudgeSent {
        level: NudgeLevel,
        message: String,
        at: DateTime<Utc>,
    },
}
