//! Session controller.
//!
//! Owns the single active-session slot (injected as a [`SessionStore`]).
//! There is no internal thread: state lives in the store and remaining time
//! is recomputed from the session's absolute start on every read. Hosts call
//! [`SessionController::tick`] periodically (see [`SessionTicker`]) to get the
//! automatic finish.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> WorkActive --finish--> BreakActive --finish--> Idle
//!                 WorkActive --double--> WorkActive(is_double)
//!                 WorkActive --stop----> Idle
//!                 BreakActive --stop---> Idle
//! ```
//!
//! [`SessionTicker`]: super::SessionTicker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::session::{Session, SessionDurations, SessionType};
use crate::error::{CoreError, Result, StoreError, ValidationError};
use crate::events::Event;
use crate::storage::{SessionStore, TaskRepository};
use crate::task::{CompletionRecord, TaskStatus};

/// Conditional writes retried before giving up with a conflict.
const MAX_CAS_ATTEMPTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    WorkActive { is_double: bool },
    BreakActive { is_double: bool },
}

impl ControllerState {
    fn of(session: Option<&Session>) -> Self {
        match session {
            None => ControllerState::Idle,
            Some(s) => match s.session_type {
                SessionType::Work => ControllerState::WorkActive {
                    is_double: s.is_double,
                },
                SessionType::Break => ControllerState::BreakActive {
                    is_double: s.is_double,
                },
            },
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::WorkActive { is_double: false } => "working",
            ControllerState::WorkActive { is_double: true } => "working (doubled)",
            ControllerState::BreakActive { .. } => "on break",
        }
    }
}

/// Options for [`SessionController::finish`].
#[derive(Debug, Clone)]
pub struct FinishOptions {
    /// Spawn the follow-up break when a work session ends.
    pub schedule_break: bool,
    pub notes: Option<String>,
}

impl Default for FinishOptions {
    fn default() -> Self {
        Self {
            schedule_break: true,
            notes: None,
        }
    }
}

impl FinishOptions {
    pub fn without_break() -> Self {
        Self {
            schedule_break: false,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    /// Natural or explicit finish; may spawn a break.
    Finish { schedule_break: bool },
    /// Finish triggered by the ticker; only valid while the session is expired.
    Expired { schedule_break: bool },
    Stop,
}

impl Ending {
    fn schedule_break(self) -> bool {
        match self {
            Ending::Finish { schedule_break } | Ending::Expired { schedule_break } => schedule_break,
            Ending::Stop => false,
        }
    }
}

pub struct SessionController {
    sessions: Arc<dyn SessionStore>,
    tasks: Arc<dyn TaskRepository>,
    durations: SessionDurations,
    auto_break: bool,
}

impl SessionController {
    pub fn new(sessions: Arc<dyn SessionStore>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            sessions,
            tasks,
            durations: SessionDurations::default(),
            auto_break: true,
        }
    }

    pub fn with_durations(mut self, durations: SessionDurations) -> Self {
        self.durations = durations;
        self
    }

    /// Whether the automatic finish from [`tick`](Self::tick) spawns a break.
    pub fn with_auto_break(mut self, auto_break: bool) -> Self {
        self.auto_break = auto_break;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn durations(&self) -> &SessionDurations {
        &self.durations
    }

    pub fn active_session(&self) -> Result<Option<Session>> {
        Ok(self.sessions.get_active_session()?)
    }

    pub fn state(&self) -> Result<ControllerState> {
        Ok(ControllerState::of(self.active_session()?.as_ref()))
    }

    /// Seconds left in the active session, `None` when idle.
    pub fn remaining(&self, now: DateTime<Utc>) -> Result<Option<u64>> {
        Ok(self.active_session()?.map(|s| s.remaining_secs(now)))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a work session for `task_id`.
    ///
    /// # Errors
    /// `SessionConflict` if any session is active, including when another
    /// client wins a simultaneous start.
    pub fn start(&self, task_id: &str, now: DateTime<Utc>) -> Result<Event> {
        if task_id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "task_id".into(),
                message: "a work session needs a task".into(),
            }
            .into());
        }

        if let Some(active) = self.sessions.get_active_session()? {
            warn!(
                session_id = %active.id,
                requested_task = task_id,
                "start rejected: session already active"
            );
            return Err(CoreError::conflict_with(active.session_type, &active.id));
        }

        let session = Session::work(task_id, now, &self.durations);
        if !self.sessions.try_set_active_session(&session, None)? {
            warn!(requested_task = task_id, "start lost race for the session slot");
            return Err(CoreError::SessionConflict(
                "another client started a session first".into(),
            ));
        }

        // The session runs even if the task record is gone.
        if let Err(e) = self.tasks.update_task_status(task_id, TaskStatus::InProgress) {
            warn!(task_id, error = %e, "no task context for started session");
        }

        info!(session_id = %session.id, task_id, duration_secs = session.duration_seconds, "work session started");
        Ok(Event::SessionStarted {
            session_id: session.id,
            task_id: task_id.to_string(),
            duration_secs: session.duration_seconds,
            at: now,
        })
    }

    /// Extend the active work session to twice the base length.
    ///
    /// # Errors
    /// `InvalidTransition` when idle, on break, already doubled, or when the
    /// session has run out and is waiting for [`tick`](Self::tick).
    pub fn double(&self, now: DateTime<Utc>) -> Result<Event> {
        let current = self.require_active("double")?;
        if !current.is_work() {
            return Err(CoreError::invalid("double", "on break"));
        }
        if current.is_double {
            return Err(CoreError::invalid("double", "already doubled"));
        }
        if current.is_expired(now) {
            return Err(CoreError::invalid("double", "the session has expired"));
        }

        let doubled = current.doubled(&self.durations);
        if !self.sessions.try_set_active_session(&doubled, Some(&current))? {
            return Err(CoreError::SessionConflict(
                "session changed while doubling".into(),
            ));
        }

        info!(session_id = %doubled.id, duration_secs = doubled.duration_seconds, "work session doubled");
        Ok(Event::SessionDoubled {
            remaining_secs: doubled.remaining_secs(now),
            duration_secs: doubled.duration_seconds,
            session_id: doubled.id,
            at: now,
        })
    }

    /// End the active session normally.
    ///
    /// A work session releases its task, records the time spent and (unless
    /// declined) hands the slot to a break. A break simply ends.
    ///
    /// # Errors
    /// `InvalidTransition` when idle.
    pub fn finish(&self, now: DateTime<Utc>, options: FinishOptions) -> Result<Vec<Event>> {
        let current = self.require_active("finish")?;
        self.end_session(
            current,
            now,
            Ending::Finish {
                schedule_break: options.schedule_break,
            },
            options.notes,
        )
    }

    /// Force-end the active session. Never spawns a break.
    ///
    /// # Errors
    /// `InvalidTransition` when idle.
    pub fn stop(&self, now: DateTime<Utc>, notes: Option<String>) -> Result<Vec<Event>> {
        let current = self.require_active("stop")?;
        self.end_session(current, now, Ending::Stop, notes)
    }

    /// Periodic poll. Finishes the active session the first time it is seen
    /// expired; every other call (idle, time left, already finished by
    /// someone else) is a no-op returning no events.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let Some(current) = self.sessions.get_active_session()? else {
            return Ok(Vec::new());
        };
        if !current.is_expired(now) {
            return Ok(Vec::new());
        }
        debug!(session_id = %current.id, "session expired, finishing");
        self.end_session(
            current,
            now,
            Ending::Expired {
                schedule_break: self.auto_break,
            },
            None,
        )
    }

    /// Empty the slot regardless of its content, releasing any held task.
    pub fn clear(&self, now: DateTime<Utc>) -> Result<Event> {
        let current = self.sessions.get_active_session()?;
        if let Some(task_id) = current.as_ref().and_then(Session::work_task_id) {
            self.release_task(task_id)?;
        }
        self.sessions.clear_active_session()?;
        info!(session_id = ?current.as_ref().map(|s| &s.id), "session slot cleared");
        Ok(Event::SessionCleared {
            session_id: current.map(|s| s.id),
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn require_active(&self, action: &'static str) -> Result<Session> {
        self.sessions
            .get_active_session()?
            .ok_or_else(|| CoreError::invalid(action, ControllerState::Idle.describe()))
    }

    /// Task cleanup happens before the slot write, so nobody observes an
    /// ended session whose task is still in progress.
    fn end_session(
        &self,
        mut current: Session,
        now: DateTime<Utc>,
        ending: Ending,
        notes: Option<String>,
    ) -> Result<Vec<Event>> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            if let Some(task_id) = current.work_task_id() {
                self.release_task(task_id)?;
            }

            let follow_up = (ending.schedule_break() && current.is_work())
                .then(|| Session::break_after(&current, now, &self.durations));
            let next = follow_up.clone().unwrap_or_else(|| current.deactivated());

            if self.sessions.try_set_active_session(&next, Some(&current))? {
                return Ok(self.ended(&current, follow_up, now, ending, notes));
            }

            // Lost the write: find out what happened to the slot.
            match self.sessions.get_active_session()? {
                Some(fresh) if fresh.id == current.id => {
                    if matches!(ending, Ending::Expired { .. }) && !fresh.is_expired(now) {
                        // Doubled elsewhere in the meantime; it keeps running.
                        self.reclaim_task(&fresh);
                        return Ok(Vec::new());
                    }
                    current = fresh;
                }
                other => {
                    if let Some(fresh) = other.as_ref() {
                        if fresh.work_task_id() == current.work_task_id() {
                            self.reclaim_task(fresh);
                        }
                    }
                    debug!(session_id = %current.id, "session already ended by another client");
                    return Ok(Vec::new());
                }
            }
        }

        Err(CoreError::SessionConflict(format!(
            "session {} kept changing while ending it",
            current.id
        )))
    }

    fn ended(
        &self,
        ended: &Session,
        follow_up: Option<Session>,
        now: DateTime<Utc>,
        ending: Ending,
        notes: Option<String>,
    ) -> Vec<Event> {
        let worked = ended.worked_secs(now);
        if let Some(task_id) = ended.work_task_id() {
            let record = CompletionRecord {
                task_id: task_id.to_string(),
                duration_seconds: worked,
                notes,
                recorded_at: now,
            };
            if let Err(e) = self.tasks.record_completion(&record) {
                warn!(task_id, error = %e, "completion not recorded");
            }
        }

        let mut events = Vec::with_capacity(2);
        match ending {
            Ending::Stop => {
                info!(session_id = %ended.id, session_type = %ended.session_type, elapsed_secs = worked, "session stopped");
                events.push(Event::SessionStopped {
                    session_id: ended.id.clone(),
                    session_type: ended.session_type,
                    task_id: ended.task_id.clone(),
                    elapsed_secs: worked,
                    at: now,
                });
            }
            Ending::Finish { .. } | Ending::Expired { .. } => {
                info!(session_id = %ended.id, session_type = %ended.session_type, elapsed_secs = worked, "session finished");
                events.push(Event::SessionFinished {
                    session_id: ended.id.clone(),
                    session_type: ended.session_type,
                    task_id: ended.task_id.clone(),
                    elapsed_secs: worked,
                    at: now,
                });
            }
        }

        if let Some(brk) = follow_up {
            info!(session_id = %brk.id, duration_secs = brk.duration_seconds, "break started");
            events.push(Event::BreakStarted {
                is_long: brk.is_double,
                duration_secs: brk.duration_seconds,
                session_id: brk.id,
                at: now,
            });
        }
        events
    }

    fn release_task(&self, task_id: &str) -> Result<()> {
        match self.tasks.update_task_status(task_id, TaskStatus::Idle) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                warn!(task_id, "task vanished; skipping status cleanup");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn reclaim_task(&self, session: &Session) {
        if let Some(task_id) = session.work_task_id() {
            if let Err(e) = self.tasks.update_task_status(task_id, TaskStatus::InProgress) {
                warn!(task_id, error = %e, "could not restore task status");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::task::Task;
    use chrono::Duration;

    fn setup() -> (Arc<MemoryStore>, SessionController, DateTime<Utc>) {
        let store = Arc::new(MemoryStore::new());
        let t0 = Utc::now();
        store.insert_task(Task::new("t1", "p1", "Draft", t0)).unwrap();
        store.insert_task(Task::new("t2", "p1", "Review", t0)).unwrap();
        let controller = SessionController::new(store.clone(), store.clone());
        (store, controller, t0)
    }

    fn status(store: &MemoryStore, id: &str) -> TaskStatus {
        store.task(id).unwrap().unwrap().status
    }

    #[test]
    fn start_marks_task_in_progress() {
        let (store, ctl, t0) = setup();
        let ev = ctl.start("t1", t0).unwrap();
        assert!(matches!(ev, Event::SessionStarted { duration_secs: 1500, .. }));
        assert_eq!(status(&store, "t1"), TaskStatus::InProgress);
        assert_eq!(ctl.state().unwrap(), ControllerState::WorkActive { is_double: false });
    }

    #[test]
    fn start_while_active_conflicts_for_any_task() {
        let (store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        for task in ["t1", "t2", "unknown"] {
            let err = ctl.start(task, t0).unwrap_err();
            assert!(matches!(err, CoreError::SessionConflict(_)));
        }
        assert_eq!(status(&store, "t2"), TaskStatus::Idle);
    }

    #[test]
    fn empty_task_id_is_rejected() {
        let (_store, ctl, t0) = setup();
        assert!(matches!(ctl.start("  ", t0), Err(CoreError::Validation(_))));
    }

    #[test]
    fn double_only_once() {
        let (_store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        let ev = ctl.double(t0 + Duration::seconds(100)).unwrap();
        assert!(matches!(ev, Event::SessionDoubled { duration_secs: 3000, remaining_secs: 2900, .. }));

        let before = ctl.active_session().unwrap();
        let err = ctl.double(t0 + Duration::seconds(200)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(ctl.active_session().unwrap(), before);
    }

    #[test]
    fn double_on_break_or_idle_fails() {
        let (_store, ctl, t0) = setup();
        assert!(matches!(ctl.double(t0), Err(CoreError::InvalidTransition { .. })));

        ctl.start("t1", t0).unwrap();
        ctl.finish(t0 + Duration::seconds(1500), FinishOptions::default()).unwrap();
        assert!(matches!(ctl.double(t0), Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn finish_work_spawns_short_break_and_records_completion() {
        let (store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        let events = ctl
            .finish(t0 + Duration::seconds(1200), FinishOptions::default().with_notes("outline done"))
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::BreakStarted { duration_secs: 300, is_long: false, .. }));
        assert_eq!(status(&store, "t1"), TaskStatus::Idle);
        assert_eq!(ctl.state().unwrap(), ControllerState::BreakActive { is_double: false });

        let completions = store.completions().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].duration_seconds, 1200);
        assert_eq!(completions[0].notes.as_deref(), Some("outline done"));
    }

    #[test]
    fn finish_doubled_work_spawns_long_break() {
        let (_store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        ctl.double(t0).unwrap();
        let events = ctl.finish(t0 + Duration::seconds(3000), FinishOptions::default()).unwrap();
        assert!(matches!(events[1], Event::BreakStarted { duration_secs: 600, is_long: true, .. }));
    }

    #[test]
    fn finish_can_decline_break() {
        let (_store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        let events = ctl.finish(t0, FinishOptions::without_break()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(ctl.state().unwrap(), ControllerState::Idle);
    }

    #[test]
    fn finishing_a_break_returns_to_idle() {
        let (_store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        ctl.finish(t0 + Duration::seconds(1500), FinishOptions::default()).unwrap();
        let events = ctl.finish(t0 + Duration::seconds(1800), FinishOptions::default()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::SessionFinished { session_type: SessionType::Break, .. }));
        assert_eq!(ctl.state().unwrap(), ControllerState::Idle);
    }

    #[test]
    fn stop_never_spawns_break() {
        let (store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        let events = ctl.stop(t0 + Duration::seconds(60), None).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::SessionStopped { elapsed_secs: 60, .. }));
        assert_eq!(ctl.state().unwrap(), ControllerState::Idle);
        assert_eq!(status(&store, "t1"), TaskStatus::Idle);
    }

    #[test]
    fn finish_or_stop_while_idle_is_rejected() {
        let (_store, ctl, t0) = setup();
        assert!(matches!(ctl.finish(t0, FinishOptions::default()), Err(CoreError::InvalidTransition { .. })));
        assert!(matches!(ctl.stop(t0, None), Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn tick_finishes_exactly_once() {
        let (store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();

        assert!(ctl.tick(t0 + Duration::seconds(1490)).unwrap().is_empty());
        assert_eq!(ctl.remaining(t0 + Duration::seconds(1490)).unwrap(), Some(10));

        let at = t0 + Duration::seconds(1500);
        let events = ctl.tick(at).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::BreakStarted { duration_secs: 300, .. }));
        assert_eq!(status(&store, "t1"), TaskStatus::Idle);

        // Same instant again: the break has its full length left.
        assert!(ctl.tick(at).unwrap().is_empty());
    }

    #[test]
    fn tick_on_doubled_session_spawns_long_break() {
        let (store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        ctl.double(t0 + Duration::seconds(600)).unwrap();

        assert!(ctl.tick(t0 + Duration::seconds(2999)).unwrap().is_empty());
        assert_eq!(status(&store, "t1"), TaskStatus::InProgress);

        let events = ctl.tick(t0 + Duration::seconds(3000)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::SessionFinished { elapsed_secs: 3000, .. }));
        assert!(matches!(events[1], Event::BreakStarted { duration_secs: 600, is_long: true, .. }));
        assert_eq!(status(&store, "t1"), TaskStatus::Idle);
        assert_eq!(ctl.state().unwrap(), ControllerState::BreakActive { is_double: true });
    }

    #[test]
    fn expired_session_cannot_be_doubled() {
        let (store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        let late = t0 + Duration::seconds(1600);
        assert_eq!(ctl.remaining(late).unwrap(), Some(0));

        let before = ctl.active_session().unwrap();
        let err = ctl.double(late).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        assert_eq!(ctl.active_session().unwrap(), before);

        // The pending expiry still finishes once, with the short break.
        let events = ctl.tick(late).unwrap();
        assert!(matches!(events[1], Event::BreakStarted { duration_secs: 300, is_long: false, .. }));
        assert_eq!(status(&store, "t1"), TaskStatus::Idle);
        assert!(ctl.tick(late).unwrap().is_empty());
    }

    #[test]
    fn tick_while_idle_is_noop() {
        let (_store, ctl, t0) = setup();
        assert!(ctl.tick(t0).unwrap().is_empty());
    }

    #[test]
    fn missing_task_degrades_gracefully() {
        let (store, ctl, t0) = setup();
        ctl.start("ghost", t0).unwrap();
        let events = ctl.finish(t0 + Duration::seconds(1500), FinishOptions::default()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(store.completions().unwrap().is_empty());
    }

    #[test]
    fn clear_releases_task() {
        let (store, ctl, t0) = setup();
        ctl.start("t1", t0).unwrap();
        ctl.clear(t0).unwrap();
        assert_eq!(ctl.state().unwrap(), ControllerState::Idle);
        assert_eq!(status(&store, "t1"), TaskStatus::Idle);
    }

    #[test]
    fn custom_durations_apply() {
        let store = Arc::new(MemoryStore::new());
        let ctl = SessionController::new(store.clone(), store.clone()).with_durations(SessionDurations {
            base_work_secs: 60,
            short_break_secs: 10,
            long_break_secs: 20,
        });
        let t0 = Utc::now();
        ctl.start("t", t0).unwrap();
        assert_eq!(ctl.remaining(t0).unwrap(), Some(60));
        let events = ctl.tick(t0 + Duration::seconds(60)).unwrap();
        assert!(matches!(events[1], Event::BreakStarted { duration_secs: 10, .. }));
    }

    #[test]
    fn auto_break_can_be_disabled() {
        let (_store, ctl, t0) = setup();
        let ctl = ctl.with_auto_break(false);
        ctl.start("t1", t0).unwrap();
        let events = ctl.tick(t0 + Duration::seconds(1500)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(ctl.state().unwrap(), ControllerState::Idle);
    }
}
