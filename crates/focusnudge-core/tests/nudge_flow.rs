//! Task completion driving the reminder pipeline.

use chrono::{DateTime, Duration, TimeZone, Utc};
use focusnudge_core::{
    CompletionOutcome, Database, Event, FocusService, MemoryStore, NotificationDispatcher,
    NudgeLevel, NudgeLevelEngine, NudgeMode, NudgeThresholds, Project, ProjectStatus,
    SessionController, Settings, SettingsStore, Task,
};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap()
}

fn service_over(store: Arc<MemoryStore>) -> FocusService {
    let controller = Arc::new(SessionController::new(store.clone(), store.clone()));
    FocusService::new(controller, store.clone(), store.clone(), store)
}

fn project(id: &str, priority: i64, age_days: i64) -> Project {
    Project::new(id, id.to_uppercase(), priority, t0() - Duration::days(age_days)).unwrap()
}

fn levels(outcomes: &[CompletionOutcome]) -> Vec<bool> {
    outcomes.iter().map(CompletionOutcome::notified).collect()
}

#[test]
fn stay_on_target_fires_every_fifth_completion() {
    let store = Arc::new(MemoryStore::with_settings(Settings {
        nudge_mode: NudgeMode::StayOnTarget,
        ..Settings::default()
    }));
    store.insert_project(project("p1", 5, 2)).unwrap();
    for i in 0..12 {
        store
            .insert_task(Task::new(format!("t{i:02}"), "p1", format!("Task {i}"), t0()))
            .unwrap();
    }
    let svc = service_over(store.clone());

    let outcomes: Vec<_> = (0..10)
        .map(|i| svc.complete_task(&format!("t{i:02}"), None, t0()).unwrap())
        .collect();

    let fired: Vec<usize> = levels(&outcomes)
        .iter()
        .enumerate()
        .filter(|(_, f)| **f)
        .map(|(i, _)| i + 1)
        .collect();
    assert_eq!(fired, vec![5, 10]);
    assert_eq!(store.read_settings().unwrap().total_tasks_completed, 10);
}

#[test]
fn recommendation_skips_inactive_projects() {
    let store = Arc::new(MemoryStore::new());
    let mut shelved = project("old", 10, 300);
    shelved.status = ProjectStatus::Inactive;
    store.insert_project(shelved).unwrap();
    store.insert_project(project("fresh", 2, 1)).unwrap();
    store
        .insert_task(Task::new("a", "old", "Dusty", t0()))
        .unwrap();
    store
        .insert_task(Task::new("b", "fresh", "Shiny", t0()))
        .unwrap();

    let svc = service_over(store);
    let rec = svc.recommend(t0()).unwrap().unwrap();
    assert_eq!(rec.project.id, "fresh");
    assert_eq!(rec.task.id, "b");
    // The inactive project does not count toward the automatic level either.
    assert_eq!(svc.current_level(t0()).unwrap(), NudgeLevel::None);
}

#[test]
fn custom_thresholds_change_automatic_level() {
    let store = Arc::new(MemoryStore::new());
    store.insert_project(project("p1", 4, 10)).unwrap();
    store
        .insert_task(Task::new("t1", "p1", "Something", t0()))
        .unwrap();

    let svc = service_over(store.clone());
    assert_eq!(svc.current_level(t0()).unwrap(), NudgeLevel::None);

    let strict = NudgeLevelEngine::new(NudgeThresholds {
        remember_age_days: 7,
        ..NudgeThresholds::default()
    });
    let svc = service_over(store).with_engine(strict);
    assert_eq!(svc.current_level(t0()).unwrap(), NudgeLevel::Remember);
}

#[tokio::test]
async fn full_pipeline_on_sqlite() {
    let db = Arc::new(Database::open_memory().unwrap());
    db.add_project(&project("p1", 8, 120)).unwrap();
    db.add_task(&Task::new("t1", "p1", "Draft", t0())).unwrap();
    db.add_task(&Task::new("t2", "p1", "Review", t0())).unwrap();
    db.add_task(&Task::new("t3", "p1", "Polish", t0())).unwrap();

    let controller = Arc::new(SessionController::new(db.clone(), db.clone()));
    let svc = FocusService::new(controller, db.clone(), db.clone(), db.clone())
        .with_dispatcher(NotificationDispatcher::new());

    svc.controller().start("t1", t0()).unwrap();
    // Counter goes 0 -> 1; lazy (project is 120 days old) fires on even totals.
    let first = svc
        .complete_task("t1", Some("drafted"), t0() + Duration::minutes(12))
        .unwrap();
    assert!(first.transitioned());
    assert!(!first.notified());
    assert!(svc.controller().active_session().unwrap().is_none());

    let second = svc.complete_task("t2", None, t0() + Duration::minutes(13)).unwrap();
    assert!(second.notified());
    let nudge = second
        .events
        .iter()
        .find_map(|e| match e {
            Event::NudgeSent { level, message, .. } => Some((*level, message.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(nudge.0, NudgeLevel::Lazy);
    assert!(nudge.1.ends_with("Next up: Polish (P1)."));
    assert!(second.dispatch.wait().await.is_empty());
}
