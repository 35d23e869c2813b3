//! Nudge level derivation.
//!
//! In automatic mode the level comes from two aggregates over active
//! projects that still have open tasks: the age of the oldest one and how
//! many there are. Checks run most severe first with strict `>`, so a value
//! sitting exactly on a threshold falls to the tier below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::NudgeLevel;
use crate::project::Project;
use crate::settings::NudgeMode;
use crate::task::Task;

/// Tier boundaries for automatic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeThresholds {
    pub remember_age_days: i64,
    pub stay_on_target_age_days: i64,
    pub lazy_age_days: i64,
    pub stay_on_target_open_count: usize,
    pub lazy_open_count: usize,
}

impl Default for NudgeThresholds {
    fn default() -> Self {
        Self {
            remember_age_days: 15,
            stay_on_target_age_days: 30,
            lazy_age_days: 90,
            stay_on_target_open_count: 5,
            lazy_open_count: 10,
        }
    }
}

/// Aggregate project state fed to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeInputs {
    /// Age of the oldest active project with open tasks, 0 if none.
    pub oldest_age_days: i64,
    /// Number of active projects with open tasks.
    pub open_count: usize,
}

impl NudgeInputs {
    pub fn new(oldest_age_days: i64, open_count: usize) -> Self {
        Self {
            oldest_age_days,
            open_count,
        }
    }

    pub fn from_projects(projects: &[Project], tasks: &[Task], now: DateTime<Utc>) -> Self {
        let open: HashSet<&str> = tasks
            .iter()
            .filter(|t| !t.is_complete)
            .map(|t| t.project_id.as_str())
            .collect();

        let qualifying = projects
            .iter()
            .filter(|p| p.is_active() && open.contains(p.id.as_str()));

        let (oldest_age_days, open_count) = qualifying.fold((0i64, 0usize), |(oldest, count), p| {
            (oldest.max(p.age_days(now)), count + 1)
        });

        Self {
            oldest_age_days,
            open_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NudgeLevelEngine {
    thresholds: NudgeThresholds,
}

impl NudgeLevelEngine {
    pub fn new(thresholds: NudgeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &NudgeThresholds {
        &self.thresholds
    }

    pub fn level(&self, mode: NudgeMode, inputs: NudgeInputs) -> NudgeLevel {
        match mode {
            NudgeMode::Remember => NudgeLevel::Remember,
            NudgeMode::StayOnTarget => NudgeLevel::StayOnTarget,
            NudgeMode::Lazy => NudgeLevel::Lazy,
            NudgeMode::Automatic => self.automatic(inputs),
        }
    }

    fn automatic(&self, inputs: NudgeInputs) -> NudgeLevel {
        let t = &self.thresholds;
        let NudgeInputs {
            oldest_age_days: age,
            open_count: open,
        } = inputs;

        if age > t.lazy_age_days || open > t.lazy_open_count {
            NudgeLevel::Lazy
        } else if age > t.stay_on_target_age_days || open > t.stay_on_target_open_count {
            NudgeLevel::StayOnTarget
        } else if age > t.remember_age_days {
            NudgeLevel::Remember
        } else {
            NudgeLevel::None
        }
    }
}
