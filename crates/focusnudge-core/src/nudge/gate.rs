//! Reminder cadence.
//!
//! The gate fires when the predicted completed-task total (`n + 1`, where
//! `n` is the counter before the just-completed task) is a multiple of the
//! level's cadence. It does no I/O and cannot fail.

use serde::{Deserialize, Serialize};

use super::NudgeLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDecision {
    pub fire: bool,
    pub level: NudgeLevel,
    pub message: String,
}

pub struct NotificationGate;

impl NotificationGate {
    /// Completed tasks between reminders at `level`; `None` never fires.
    pub fn cadence(level: NudgeLevel) -> Option<u64> {
        match level {
            NudgeLevel::None => None,
            NudgeLevel::Remember => Some(10),
            NudgeLevel::StayOnTarget => Some(5),
            NudgeLevel::Lazy => Some(2),
        }
    }

    pub fn message(level: NudgeLevel) -> &'static str {
        match level {
            NudgeLevel::None => "All caught up. Nothing is waiting on you.",
            NudgeLevel::Remember => {
                "Nice progress. Remember there are older projects waiting for some attention."
            }
            NudgeLevel::StayOnTarget => {
                "Stay on target: a few projects have been open for a while. Pick one back up."
            }
            NudgeLevel::Lazy => {
                "Your backlog is getting stale. Time to return to the neglected projects."
            }
        }
    }

    /// `completed_before` is the counter value before this completion.
    pub fn should_notify(level: NudgeLevel, completed_before: u64) -> NotificationDecision {
        let predicted = completed_before.saturating_add(1);
        let fire = Self::cadence(level).is_some_and(|every| predicted % every == 0);
        NotificationDecision {
            fire,
            level,
            message: Self::message(level).to_string(),
        }
    }
}
