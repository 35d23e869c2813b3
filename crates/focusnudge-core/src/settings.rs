//! User settings consulted by the nudge engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// How the nudge level is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeMode {
    /// Derive the level from project ages and counts.
    Automatic,
    Remember,
    StayOnTarget,
    Lazy,
}

impl Default for NudgeMode {
    fn default() -> Self {
        NudgeMode::Automatic
    }
}

impl NudgeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NudgeMode::Automatic => "automatic",
            NudgeMode::Remember => "remember",
            NudgeMode::StayOnTarget => "stay_on_target",
            NudgeMode::Lazy => "lazy",
        }
    }
}

impl fmt::Display for NudgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NudgeMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "automatic" | "auto" => Ok(NudgeMode::Automatic),
            "remember" => Ok(NudgeMode::Remember),
            "stay_on_target" | "stayontarget" => Ok(NudgeMode::StayOnTarget),
            "lazy" => Ok(NudgeMode::Lazy),
            other => Err(ValidationError::InvalidValue {
                field: "nudge_mode".into(),
                message: format!("unknown nudge mode '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub nudge_mode: NudgeMode,
    /// Monotonic; bumped once per incomplete -> complete task transition.
    #[serde(default)]
    pub total_tasks_completed: u64,
    #[serde(default)]
    pub ntfy_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nudge_mode_parses_aliases() {
        assert_eq!("auto".parse::<NudgeMode>().unwrap(), NudgeMode::Automatic);
        assert_eq!("stay-on-target".parse::<NudgeMode>().unwrap(), NudgeMode::StayOnTarget);
        assert_eq!("LAZY".parse::<NudgeMode>().unwrap(), NudgeMode::Lazy);
        assert!("sometimes".parse::<NudgeMode>().is_err());
    }

    #[test]
    fn settings_default_to_automatic() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.nudge_mode, NudgeMode::Automatic);
        assert_eq!(s.total_tasks_completed, 0);
    }
}
