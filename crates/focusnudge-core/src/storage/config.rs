//! TOML-based application configuration.
//!
//! Stores:
//! - Session lengths and ticker cadence
//! - Nudge thresholds for automatic mode
//! - Notification sinks (ntfy, desktop, speech)
//!
//! Configuration is stored at `~/.config/focusnudge/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::nudge::NudgeThresholds;
use crate::timer::{SessionDurations, BASE_WORK_SECS, LONG_BREAK_SECS, SHORT_BREAK_SECS};

/// Session timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_base_work_secs")]
    pub base_work_secs: u64,
    #[serde(default = "default_short_break_secs")]
    pub short_break_secs: u64,
    #[serde(default = "default_long_break_secs")]
    pub long_break_secs: u64,
    /// How often `session watch` re-reads the slot.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Schedule a break when a work session runs out on its own.
    #[serde(default = "default_true")]
    pub auto_break: bool,
}

/// Automatic-mode thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default = "default_remember_age_days")]
    pub remember_age_days: i64,
    #[serde(default = "default_stay_on_target_age_days")]
    pub stay_on_target_age_days: i64,
    #[serde(default = "default_lazy_age_days")]
    pub lazy_age_days: i64,
    #[serde(default = "default_stay_on_target_open_count")]
    pub stay_on_target_open_count: usize,
    #[serde(default = "default_lazy_open_count")]
    pub lazy_open_count: usize,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// ntfy topic URL. The stored setting wins over this when both are set.
    #[serde(default)]
    pub ntfy_url: Option<String>,
    #[serde(default)]
    pub desktop: bool,
    #[serde(default)]
    pub speech: bool,
    /// Replaces the platform default, e.g. `notify-send -u low {title} {body}`.
    #[serde(default)]
    pub desktop_command: Option<String>,
    #[serde(default)]
    pub speech_command: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusnudge/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub nudge: NudgeConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_base_work_secs() -> u64 {
    BASE_WORK_SECS
}
fn default_short_break_secs() -> u64 {
    SHORT_BREAK_SECS
}
fn default_long_break_secs() -> u64 {
    LONG_BREAK_SECS
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_remember_age_days() -> i64 {
    NudgeThresholds::default().remember_age_days
}
fn default_stay_on_target_age_days() -> i64 {
    NudgeThresholds::default().stay_on_target_age_days
}
fn default_lazy_age_days() -> i64 {
    NudgeThresholds::default().lazy_age_days
}
fn default_stay_on_target_open_count() -> usize {
    NudgeThresholds::default().stay_on_target_open_count
}
fn default_lazy_open_count() -> usize {
    NudgeThresholds::default().lazy_open_count
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            base_work_secs: default_base_work_secs(),
            short_break_secs: default_short_break_secs(),
            long_break_secs: default_long_break_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            auto_break: true,
        }
    }
}

impl TimerConfig {
    pub fn durations(&self) -> SessionDurations {
        SessionDurations {
            base_work_secs: self.base_work_secs,
            short_break_secs: self.short_break_secs,
            long_break_secs: self.long_break_secs,
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            remember_age_days: default_remember_age_days(),
            stay_on_target_age_days: default_stay_on_target_age_days(),
            lazy_age_days: default_lazy_age_days(),
            stay_on_target_open_count: default_stay_on_target_open_count(),
            lazy_open_count: default_lazy_open_count(),
        }
    }
}

impl NudgeConfig {
    pub fn thresholds(&self) -> NudgeThresholds {
        NudgeThresholds {
            remember_age_days: self.remember_age_days,
            stay_on_target_age_days: self.stay_on_target_age_days,
            lazy_age_days: self.lazy_age_days,
            stay_on_target_open_count: self.stay_on_target_open_count,
            lazy_open_count: self.lazy_open_count,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ntfy_url: None,
            desktop: false,
            speech: false,
            desktop_command: None,
            speech_command: None,
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(key, format!("'{value}': {e}")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(key, format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid(key, "not a leaf value"));
                    }
                    // Null is an unset optional string.
                    _ if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `config.toml` inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The caller persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, or the value cannot be parsed
    /// or leaves the config invalid. `self` is untouched on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(key, e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values that would make the timer or the nudge tiers meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timer;
        if t.base_work_secs == 0 {
            return Err(invalid("timer.base_work_secs", "must be positive"));
        }
        if t.short_break_secs == 0 || t.long_break_secs == 0 {
            return Err(invalid("timer.short_break_secs", "break lengths must be positive"));
        }
        if t.tick_interval_ms == 0 {
            return Err(invalid("timer.tick_interval_ms", "must be positive"));
        }

        let n = &self.nudge;
        if n.remember_age_days < 0
            || n.remember_age_days > n.stay_on_target_age_days
            || n.stay_on_target_age_days > n.lazy_age_days
        {
            return Err(invalid(
                "nudge.remember_age_days",
                "age thresholds must be non-negative and ascending",
            ));
        }
        if n.stay_on_target_open_count > n.lazy_open_count {
            return Err(invalid(
                "nudge.stay_on_target_open_count",
                "must not exceed nudge.lazy_open_count",
            ));
        }

        if let Some(url) = self.notifications.ntfy_url.as_deref().filter(|u| !u.is_empty()) {
            crate::notify::validate_ntfy_url(url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.timer.base_work_secs, 1500);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nbase_work_secs = 60\n").unwrap();
        assert_eq!(parsed.timer.base_work_secs, 60);
        assert_eq!(parsed.timer.short_break_secs, 300);
        assert_eq!(parsed.nudge.lazy_age_days, 90);
        assert!(parsed.notifications.enabled);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.auto_break").as_deref(), Some("true"));
        assert_eq!(cfg.get("nudge.remember_age_days").as_deref(), Some("15"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("timer").is_none());
    }

    #[test]
    fn set_json_value_by_path_updates_nested_bool() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        Config::set_json_value_by_path(&mut json, "notifications.desktop", "true").unwrap();
        assert_eq!(
            Config::get_json_value_by_path(&json, "notifications.desktop").unwrap(),
            &serde_json::Value::Bool(true)
        );
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "timer.nonexistent_key", "1");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_json_value_by_path_rejects_invalid_type() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "timer.auto_break", "not_a_bool");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn set_optional_string_and_clear_it() {
        let mut cfg = Config::default();
        cfg.set("notifications.ntfy_url", "https://ntfy.sh/focus").unwrap();
        assert_eq!(cfg.notifications.ntfy_url.as_deref(), Some("https://ntfy.sh/focus"));
        cfg.set("notifications.ntfy_url", "").unwrap();
        assert!(cfg.notifications.ntfy_url.is_none());
    }

    #[test]
    fn set_rejects_invalid_config_and_keeps_old_value() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.base_work_secs", "0").is_err());
        assert!(cfg.set("nudge.remember_age_days", "45").is_err());
        assert!(cfg.set("notifications.ntfy_url", "not a url").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn thresholds_and_durations_follow_config() {
        let mut cfg = Config::default();
        cfg.set("nudge.remember_age_days", "7").unwrap();
        cfg.set("timer.long_break_secs", "900").unwrap();
        assert_eq!(cfg.nudge.thresholds().remember_age_days, 7);
        assert_eq!(cfg.timer.durations().break_secs(true), 900);
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("timer.base_work_secs", "600").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().timer.base_work_secs, 600);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timer = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
