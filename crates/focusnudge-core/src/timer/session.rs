use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default work session length.
pub const BASE_WORK_SECS: u64 = 25 * 60;
/// Break after a regular work session.
pub const SHORT_BREAK_SECS: u64 = 5 * 60;
/// Break after a doubled work session.
pub const LONG_BREAK_SECS: u64 = 10 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Work,
    Break,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Work => f.write_str("work"),
            SessionType::Break => f.write_str("break"),
        }
    }
}

/// Session lengths in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDurations {
    pub base_work_secs: u64,
    pub short_break_secs: u64,
    pub long_break_secs: u64,
}

impl Default for SessionDurations {
    fn default() -> Self {
        Self {
            base_work_secs: BASE_WORK_SECS,
            short_break_secs: SHORT_BREAK_SECS,
            long_break_secs: LONG_BREAK_SECS,
        }
    }
}

impl SessionDurations {
    pub fn doubled_work_secs(&self) -> u64 {
        self.base_work_secs.saturating_mul(2)
    }

    pub fn break_secs(&self, after_double: bool) -> u64 {
        if after_double {
            self.long_break_secs
        } else {
            self.short_break_secs
        }
    }
}

/// One work or break timer instance.
///
/// Remaining time is always recomputed from the absolute `start_time`, so a
/// session read back after a restart reports the same remaining time as one
/// that was never interrupted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Required for work sessions, `None` for breaks.
    pub task_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub is_double: bool,
    pub active: bool,
    #[serde(rename = "type")]
    pub session_type: SessionType,
}

impl Session {
    pub fn work(task_id: impl Into<String>, start: DateTime<Utc>, durations: &SessionDurations) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: Some(task_id.into()),
            start_time: start,
            duration_seconds: durations.base_work_secs,
            is_double: false,
            active: true,
            session_type: SessionType::Work,
        }
    }

    /// The break that follows `work`. Carries the work session's `is_double`
    /// so a break after a doubled session is the long one.
    pub fn break_after(work: &Session, start: DateTime<Utc>, durations: &SessionDurations) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: None,
            start_time: start,
            duration_seconds: durations.break_secs(work.is_double),
            is_double: work.is_double,
            active: true,
            session_type: SessionType::Break,
        }
    }

    pub fn is_work(&self) -> bool {
        self.session_type == SessionType::Work
    }

    /// The task this session holds `InProgress`, if any.
    pub fn work_task_id(&self) -> Option<&str> {
        if self.is_work() {
            self.task_id.as_deref()
        } else {
            None
        }
    }

    /// Seconds since `start_time`, zero if `now` is before the start.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.start_time).num_seconds().max(0) as u64
    }

    /// `max(0, duration - elapsed)`.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.duration_seconds.saturating_sub(self.elapsed_secs(now))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) == 0
    }

    /// Seconds of actual work, capped at the planned duration.
    pub fn worked_secs(&self, now: DateTime<Utc>) -> u64 {
        self.elapsed_secs(now).min(self.duration_seconds)
    }

    pub(crate) fn doubled(&self, durations: &SessionDurations) -> Self {
        Self {
            duration_seconds: durations.doubled_work_secs(),
            is_double: true,
            ..self.clone()
        }
    }

    pub(crate) fn deactivated(&self) -> Self {
        Self {
            active: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn work_at(start: DateTime<Utc>) -> Session {
        Session::work("task-1", start, &SessionDurations::default())
    }

    #[test]
    fn remaining_counts_down_from_absolute_start() {
        let t0 = Utc::now();
        let s = work_at(t0);
        assert_eq!(s.remaining_secs(t0), 1500);
        assert_eq!(s.remaining_secs(t0 + Duration::seconds(1490)), 10);
        assert_eq!(s.remaining_secs(t0 + Duration::seconds(1500)), 0);
        assert_eq!(s.remaining_secs(t0 + Duration::seconds(9000)), 0);
    }

    #[test]
    fn remaining_ignores_clock_before_start() {
        let t0 = Utc::now();
        let s = work_at(t0);
        assert_eq!(s.remaining_secs(t0 - Duration::seconds(30)), 1500);
    }

    #[test]
    fn reloaded_session_reports_same_remaining() {
        let t0 = Utc::now();
        let s = work_at(t0);
        let json = serde_json::to_string(&s).unwrap();
        let reloaded: Session = serde_json::from_str(&json).unwrap();
        let at = t0 + Duration::seconds(731);
        assert_eq!(reloaded.remaining_secs(at), s.remaining_secs(at));
    }

    #[test]
    fn break_length_follows_double() {
        let t0 = Utc::now();
        let d = SessionDurations::default();
        let plain = work_at(t0);
        assert_eq!(Session::break_after(&plain, t0, &d).duration_seconds, 300);

        let doubled = plain.doubled(&d);
        assert_eq!(doubled.duration_seconds, 3000);
        let brk = Session::break_after(&doubled, t0, &d);
        assert_eq!(brk.duration_seconds, 600);
        assert_eq!(brk.task_id, None);
        assert_eq!(brk.session_type, SessionType::Break);
    }

    #[test]
    fn serialized_type_field_is_named_type() {
        let json = serde_json::to_value(work_at(Utc::now())).unwrap();
        assert_eq!(json["type"], "work");
        assert_eq!(json["durationSeconds"], 1500);
    }

    proptest! {
        #[test]
        fn remaining_is_non_increasing(a in 0i64..10_000, b in 0i64..10_000) {
            let t0 = Utc::now();
            let s = work_at(t0);
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                s.remaining_secs(t0 + Duration::seconds(late))
                    <= s.remaining_secs(t0 + Duration::seconds(early))
            );
        }
    }
}
