//! Task-completion orchestration.
//!
//! [`FocusService`] ties the session controller to the nudge engine: it
//! completes a task, ends the work session that was on it, and decides
//! whether this completion earns a reminder.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::Event;
use crate::notify::{DispatchHandle, Notification, NotificationDispatcher};
use crate::nudge::{
    NotificationDecision, NotificationGate, NudgeInputs, NudgeLevel, NudgeLevelEngine,
    Recommendation, StalenessScorer,
};
use crate::project::Project;
use crate::storage::{ProjectSource, SettingsStore, TaskRepository};
use crate::timer::{FinishOptions, SessionController};

/// Everything that happened because a task was completed.
#[derive(Debug, Default)]
pub struct CompletionOutcome {
    pub events: Vec<Event>,
    /// Counter after this completion; unchanged if the task was already done.
    pub total_completed: u64,
    /// `None` when the task was already complete and nothing was evaluated.
    pub decision: Option<NotificationDecision>,
    pub recommendation: Option<Recommendation>,
    /// Pending sink deliveries, empty unless the gate fired.
    pub dispatch: DispatchHandle,
}

impl CompletionOutcome {
    /// Whether this call performed the incomplete -> complete transition.
    pub fn transitioned(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, Event::TaskCompleted { .. }))
    }

    pub fn notified(&self) -> bool {
        self.decision.as_ref().is_some_and(|d| d.fire)
    }
}

pub struct FocusService {
    controller: Arc<SessionController>,
    tasks: Arc<dyn TaskRepository>,
    settings: Arc<dyn SettingsStore>,
    projects: Arc<dyn ProjectSource>,
    engine: NudgeLevelEngine,
    dispatcher: NotificationDispatcher,
}

impl FocusService {
    pub fn new(
        controller: Arc<SessionController>,
        tasks: Arc<dyn TaskRepository>,
        settings: Arc<dyn SettingsStore>,
        projects: Arc<dyn ProjectSource>,
    ) -> Self {
        Self {
            controller,
            tasks,
            settings,
            projects,
            engine: NudgeLevelEngine::default(),
            dispatcher: NotificationDispatcher::new(),
        }
    }

    pub fn with_engine(mut self, engine: NudgeLevelEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Level for the stored mode and current project state.
    pub fn current_level(&self, now: DateTime<Utc>) -> Result<NudgeLevel> {
        let mode = self.settings.read_nudge_mode()?;
        let projects = self.projects.list_projects()?;
        let tasks = self.projects.list_tasks()?;
        let inputs = NudgeInputs::from_projects(&projects, &tasks, now);
        Ok(self.engine.level(mode, inputs))
    }

    /// Next project/task to pick up, considering active projects only.
    pub fn recommend(&self, now: DateTime<Utc>) -> Result<Option<Recommendation>> {
        let projects: Vec<Project> = self
            .projects
            .list_projects()?
            .into_iter()
            .filter(Project::is_active)
            .collect();
        let tasks = self.projects.list_tasks()?;
        Ok(StalenessScorer::recommend(&projects, &tasks, now))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Complete `task_id` and run the reminder pipeline.
    ///
    /// Completing an already-complete task is a no-op: the counter is not
    /// touched and no reminder is considered.
    pub fn complete_task(
        &self,
        task_id: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        if !self.tasks.mark_complete(task_id, now, notes)? {
            debug!(task_id, "task already complete");
            let total_completed = self.settings.read_settings()?.total_tasks_completed;
            return Ok(CompletionOutcome {
                total_completed,
                ..CompletionOutcome::default()
            });
        }

        let total_completed = self.settings.increment_completed_counter()?;
        let completed_before = total_completed.saturating_sub(1);
        let mut events = vec![Event::TaskCompleted {
            task_id: task_id.to_string(),
            total_completed,
            at: now,
        }];

        let working_on_it = self
            .controller
            .active_session()?
            .is_some_and(|s| s.work_task_id() == Some(task_id));
        if working_on_it {
            let mut options = FinishOptions::without_break();
            if let Some(notes) = notes {
                options = options.with_notes(notes);
            }
            // The completion is already counted; a session that cannot be
            // ended here is left for the ticker or an explicit stop.
            match self.controller.finish(now, options) {
                Ok(ended) => events.extend(ended),
                Err(e) => warn!(task_id, error = %e, "running session not ended"),
            }
        }

        let level = self.current_level(now)?;
        let decision = NotificationGate::should_notify(level, completed_before);
        let recommendation = self.recommend(now)?;
        info!(
            task_id,
            total_completed,
            %level,
            fire = decision.fire,
            "task completed"
        );

        let mut dispatch = DispatchHandle::default();
        if decision.fire {
            let body = compose_body(&decision.message, recommendation.as_ref());
            dispatch = self
                .dispatcher
                .dispatch(&Notification::new(level.title(), body.clone()));
            events.push(Event::NudgeSent {
                level,
                message: body,
                at: now,
            });
        }

        Ok(CompletionOutcome {
            events,
            total_completed,
            decision: Some(decision),
            recommendation,
            dispatch,
        })
    }
}

fn compose_body(message: &str, recommendation: Option<&Recommendation>) -> String {
    match recommendation {
        Some(rec) => format!(
            "{message} Next up: {} ({}).",
            rec.task.title, rec.project.name
        ),
        None => message.to_string(),
    }
}
