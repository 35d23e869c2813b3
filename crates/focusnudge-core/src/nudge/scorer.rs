//! Staleness scoring and next-task recommendation.
//!
//! `score = priority × 2 + age_in_days`. Old, important projects float up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::project::Project;
use crate::task::Task;

/// The project/task pair to work on next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub project: Project,
    pub task: Task,
    pub score: i64,
}

pub struct StalenessScorer;

impl StalenessScorer {
    pub fn score(project: &Project, now: DateTime<Utc>) -> i64 {
        i64::from(project.priority) * 2 + project.age_days(now)
    }

    /// Pick the highest-scoring project that still has open work, then its
    /// oldest incomplete task.
    ///
    /// Project ties go to the older project (then lower id); task ties go to
    /// the lower task id. Returns `None` when nothing is open.
    pub fn recommend(projects: &[Project], tasks: &[Task], now: DateTime<Utc>) -> Option<Recommendation> {
        let open: HashSet<&str> = tasks
            .iter()
            .filter(|t| !t.is_complete)
            .map(|t| t.project_id.as_str())
            .collect();

        let project = projects
            .iter()
            .filter(|p| open.contains(p.id.as_str()))
            .max_by(|a, b| {
                Self::score(a, now)
                    .cmp(&Self::score(b, now))
                    // max_by keeps the greater, so older/lower-id must compare greater
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.id.cmp(&a.id))
            })?;

        let task = tasks
            .iter()
            .filter(|t| !t.is_complete && t.project_id == project.id)
            .min_by(|a, b| earliest_first(a, b))?;

        Some(Recommendation {
            score: Self::score(project, now),
            project: project.clone(),
            task: task.clone(),
        })
    }
}

fn earliest_first(a: &Task, b: &Task) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}
