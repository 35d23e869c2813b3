//! Nudge engine: staleness scoring, level derivation and reminder gating.

mod gate;
mod level;
mod scorer;

pub use gate::{NotificationDecision, NotificationGate};
pub use level::{NudgeInputs, NudgeLevelEngine, NudgeThresholds};
pub use scorer::{Recommendation, StalenessScorer};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete reminder urgency. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeLevel {
    None = 0,
    Remember = 1,
    StayOnTarget = 2,
    Lazy = 3,
}

impl NudgeLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Notification title for this level.
    pub fn title(self) -> &'static str {
        match self {
            NudgeLevel::None => "All clear",
            NudgeLevel::Remember => "Friendly reminder",
            NudgeLevel::StayOnTarget => "Stay on target",
            NudgeLevel::Lazy => "Time to get back to it",
        }
    }
}

impl fmt::Display for NudgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NudgeLevel::None => "none",
            NudgeLevel::Remember => "remember",
            NudgeLevel::StayOnTarget => "stay_on_target",
            NudgeLevel::Lazy => "lazy",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(NudgeLevel::Lazy > NudgeLevel::StayOnTarget);
        assert!(NudgeLevel::StayOnTarget > NudgeLevel::Remember);
        assert!(NudgeLevel::Remember > NudgeLevel::None);
        assert_eq!(NudgeLevel::Lazy.as_u8(), 3);
    }
}
