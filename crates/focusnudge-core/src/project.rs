//! Projects group tasks and carry the priority used for staleness scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Inactive,
    Archived,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Active
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Inactive => "inactive",
            ProjectStatus::Archived => "archived",
        };
        f.write_str(s)
    }
}

impl FromStr for ProjectStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "inactive" => Ok(ProjectStatus::Inactive),
            "archived" => Ok(ProjectStatus::Archived),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown project status '{other}'"),
            }),
        }
    }
}

/// A project owned by the storage collaborator. The core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub category: String,
    /// 1 (lowest) to 10 (highest).
    pub priority: u8,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub const MIN_PRIORITY: u8 = 1;
    pub const MAX_PRIORITY: u8 = 10;

    /// Build an active project, rejecting priorities outside 1-10.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        priority: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let priority = Self::check_priority(priority)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            owner: String::new(),
            category: String::new(),
            priority,
            status: ProjectStatus::Active,
            created_at,
        })
    }

    pub fn check_priority(priority: i64) -> Result<u8, ValidationError> {
        if (Self::MIN_PRIORITY as i64..=Self::MAX_PRIORITY as i64).contains(&priority) {
            Ok(priority as u8)
        } else {
            Err(ValidationError::PriorityOutOfRange(priority))
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    /// Whole days elapsed since creation, never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }

    /// Archived projects only move back to Active; everything else is free.
    pub fn can_transition_to(&self, to: ProjectStatus) -> bool {
        match self.status {
            ProjectStatus::Archived => matches!(to, ProjectStatus::Active | ProjectStatus::Archived),
            _ => true,
        }
    }
}
