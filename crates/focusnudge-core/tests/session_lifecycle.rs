//! End-to-end session tests against the SQLite store.
//!
//! Two `Database` handles on the same file stand in for two clients
//! (e.g. the CLI and a long-running `session watch`).

use chrono::{DateTime, Duration, TimeZone, Utc};
use focusnudge_core::{
    ControllerState, CoreError, Database, Event, FinishOptions, Project, SessionController,
    SessionStore, SessionType, Task, TaskStatus,
};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0).unwrap()
}

fn seed(path: &Path) {
    let db = Database::open_at(path).unwrap();
    db.add_project(&Project::new("p1", "Thesis", 6, t0() - Duration::days(3)).unwrap())
        .unwrap();
    db.add_task(&Task::new("t1", "p1", "Write intro", t0())).unwrap();
    db.add_task(&Task::new("t2", "p1", "Fix figures", t0())).unwrap();
}

fn client(path: &Path) -> (Arc<Database>, SessionController) {
    let db = Arc::new(Database::open_at(path).unwrap());
    let controller = SessionController::new(db.clone(), db.clone());
    (db, controller)
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn work_double_break_idle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusnudge.db");
    seed(&path);
    let (db, ctl) = client(&path);

    ctl.start("t1", t0()).unwrap();
    assert_eq!(db.get_task("t1").unwrap().status, TaskStatus::InProgress);

    let doubled = ctl.double(t0() + Duration::minutes(20)).unwrap();
    assert!(matches!(
        doubled,
        Event::SessionDoubled {
            duration_secs: 3000,
            remaining_secs: 1800,
            ..
        }
    ));

    let events = ctl
        .finish(t0() + Duration::minutes(50), FinishOptions::default())
        .unwrap();
    assert!(matches!(
        events.last(),
        Some(Event::BreakStarted {
            is_long: true,
            duration_secs: 600,
            ..
        })
    ));
    assert_eq!(ctl.state().unwrap(), ControllerState::BreakActive { is_double: true });
    assert_eq!(db.get_task("t1").unwrap().status, TaskStatus::Idle);
    assert_eq!(db.completions_for("t1").unwrap()[0].duration_seconds, 3000);

    ctl.finish(t0() + Duration::minutes(60), FinishOptions::default())
        .unwrap();
    assert_eq!(ctl.state().unwrap(), ControllerState::Idle);
}

#[test]
fn second_client_sees_same_remaining_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusnudge.db");
    seed(&path);
    let (_a_db, a) = client(&path);
    let (_b_db, b) = client(&path);

    a.start("t1", t0()).unwrap();
    let later = t0() + Duration::seconds(437);
    assert_eq!(a.remaining(later).unwrap(), Some(1063));
    assert_eq!(b.remaining(later).unwrap(), Some(1063));

    // A restarted client reads the same slot.
    drop(b);
    let (_c_db, c) = client(&path);
    assert_eq!(c.remaining(later).unwrap(), Some(1063));
}

#[test]
fn start_on_another_client_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusnudge.db");
    seed(&path);
    let (_a_db, a) = client(&path);
    let (_b_db, b) = client(&path);

    a.start("t1", t0()).unwrap();
    let err = b.start("t2", t0() + Duration::seconds(5)).unwrap_err();
    assert!(matches!(err, CoreError::SessionConflict(_)));
}

#[test]
fn concurrent_starts_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusnudge.db");
    seed(&path);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let path = path.clone();
            std::thread::spawn(move || {
                let (_db, ctl) = client(&path);
                let task = if i % 2 == 0 { "t1" } else { "t2" };
                ctl.start(task, t0()).is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn expiry_is_finished_once_across_clients() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusnudge.db");
    seed(&path);
    let (db, a) = client(&path);
    let (_b_db, b) = client(&path);

    a.start("t1", t0()).unwrap();
    let expired = t0() + Duration::minutes(26);

    let first = a.tick(expired).unwrap();
    let second = b.tick(expired).unwrap();
    assert_eq!(first.len(), 2);
    assert!(second.is_empty());

    let active = db.get_active_session().unwrap().unwrap();
    assert_eq!(active.session_type, SessionType::Break);
    assert_eq!(db.completions_for("t1").unwrap().len(), 1);
}

#[test]
fn stop_ends_without_break_and_keeps_elapsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusnudge.db");
    seed(&path);
    let (db, ctl) = client(&path);

    ctl.start("t2", t0()).unwrap();
    let events = ctl
        .stop(t0() + Duration::minutes(7), Some("interrupted".into()))
        .unwrap();
    assert!(matches!(
        events.as_slice(),
        [Event::SessionStopped {
            elapsed_secs: 420,
            ..
        }]
    ));
    assert_eq!(ctl.state().unwrap(), ControllerState::Idle);

    let records = db.completions_for("t2").unwrap();
    assert_eq!(records[0].notes.as_deref(), Some("interrupted"));
}
